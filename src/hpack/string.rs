//! String literal representation (RFC 7541 Section 5.2)
//!
//! ```text
//!   0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! | H |    String Length (7+)     |
//! +---+---------------------------+
//! |  String Data (Length octets)  |
//! +-------------------------------+
//! ```

use super::error::{HpackError, Result};
use super::{huffman, integer};
use bytes::{BufMut, Bytes, BytesMut};

/// Huffman flag in the length prefix byte
const HUFFMAN_FLAG: u8 = 0x80;

/// When the encoder Huffman-codes string literals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Huffman {
    /// Always send raw octets
    Never,
    /// Always Huffman code
    Always,
    /// Huffman code unless that makes the literal longer
    #[default]
    Shortest,
}

impl Huffman {
    /// Decide for a given raw string.
    pub fn use_for(self, raw: &[u8]) -> bool {
        match self {
            Huffman::Never => false,
            Huffman::Always => true,
            Huffman::Shortest => huffman::encoded_len(raw) <= raw.len(),
        }
    }
}

/// Encode `raw` as a string literal, Huffman coded if `use_huffman`.
pub fn encode(dst: &mut BytesMut, raw: &[u8], use_huffman: bool) {
    if use_huffman {
        integer::put_integer(dst, huffman::encoded_len(raw) as u64, 7, HUFFMAN_FLAG);
        huffman::encode(raw, dst);
    } else {
        integer::put_integer(dst, raw.len() as u64, 7, 0);
        dst.put_slice(raw);
    }
}

/// Decode a string literal from the start of `src`.
///
/// Returns the raw octets and the number of bytes consumed.
pub fn decode(src: &[u8]) -> Result<(Bytes, usize)> {
    let first = *src.first().ok_or(HpackError::TruncatedInput)?;
    let (length, prefix_len) = integer::decode_usize(src, 7)?;

    let end = prefix_len
        .checked_add(length)
        .ok_or(HpackError::IntegerOverflow)?;
    let data = src.get(prefix_len..end).ok_or(HpackError::TruncatedInput)?;

    let raw = if first & HUFFMAN_FLAG != 0 {
        Bytes::from(huffman::decode(data)?)
    } else {
        Bytes::copy_from_slice(data)
    };

    Ok((raw, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain() {
        let mut dst = BytesMut::new();
        encode(&mut dst, b"custom-key", false);
        assert_eq!(dst[0], 0x0a);
        assert_eq!(&dst[1..], b"custom-key");
    }

    #[test]
    fn test_encode_huffman_sets_flag() {
        let mut dst = BytesMut::new();
        encode(&mut dst, b"no-cache", true);
        assert_eq!(&dst[..], &[0x86, 0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf]);
    }

    #[test]
    fn test_decode_both_forms() {
        let (raw, used) = decode(&[0x86, 0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf, 0x00]).unwrap();
        assert_eq!(&raw[..], b"no-cache");
        assert_eq!(used, 7);

        let (raw, used) = decode(b"\x03abcdef").unwrap();
        assert_eq!(&raw[..], b"abc");
        assert_eq!(used, 4);
    }

    #[test]
    fn test_decode_empty_string() {
        let (raw, used) = decode(&[0x00]).unwrap();
        assert!(raw.is_empty());
        assert_eq!(used, 1);
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(decode(&[]), Err(HpackError::TruncatedInput));
        assert_eq!(decode(b"\x05abc"), Err(HpackError::TruncatedInput));
        assert_eq!(decode(&[0x7f, 0x80]), Err(HpackError::TruncatedInput));
    }

    #[test]
    fn test_huffman_policy() {
        assert!(!Huffman::Never.use_for(b"www.example.com"));
        assert!(Huffman::Always.use_for(b"\x00\x01"));
        assert!(Huffman::Shortest.use_for(b"www.example.com"));
        // control bytes have 13..30 bit codes
        assert!(!Huffman::Shortest.use_for(b"\x00\x01\x02"));
    }
}
