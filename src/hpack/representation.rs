//! Header field representations (RFC 7541 Section 6)
//!
//! The leading bits of the first byte select the representation:
//!
//! ```text
//! 1xxxxxxx  Indexed Header Field                      (7-bit index)
//! 01xxxxxx  Literal with Incremental Indexing         (6-bit name index)
//! 001xxxxx  Dynamic Table Size Update                 (5-bit size)
//! 0001xxxx  Literal Never Indexed                     (4-bit name index)
//! 0000xxxx  Literal without Indexing                  (4-bit name index)
//! ```
//!
//! A name index of zero means the name follows as a string literal.

use super::error::{HpackError, Result};
use super::integer::{decode_usize, put_integer};
use super::string::{self, Huffman};
use super::Indexing;
use bytes::{Bytes, BytesMut};

const INDEXED: u8 = 0x80;
const LITERAL_INCREMENTAL: u8 = 0x40;
const SIZE_UPDATE: u8 = 0x20;
const LITERAL_NEVER_INDEXED: u8 = 0x10;
const LITERAL_WITHOUT_INDEXING: u8 = 0x00;

/// Name of a literal field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRef {
    /// Name taken from the entry at this combined index
    Indexed(usize),
    /// Name sent as a string literal
    Literal(Bytes),
}

/// Wire form of one header block instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    /// Whole field taken from the table
    Indexed(usize),
    /// Field with a literal value
    Literal {
        /// Name, by index or literal
        name: NameRef,
        /// Value octets
        value: Bytes,
        /// Which literal form
        indexing: Indexing,
    },
    /// New dynamic table maximum size
    SizeUpdate(usize),
}

impl Representation {
    /// Serialize into `dst`, Huffman coding literals per `huffman`.
    pub fn encode(&self, dst: &mut BytesMut, huffman: Huffman) {
        match self {
            Representation::Indexed(index) => put_integer(dst, *index as u64, 7, INDEXED),
            Representation::SizeUpdate(size) => put_integer(dst, *size as u64, 5, SIZE_UPDATE),
            Representation::Literal {
                name,
                value,
                indexing,
            } => {
                let (prefix_bits, flags) = literal_prefix(*indexing);
                match name {
                    NameRef::Indexed(index) => put_integer(dst, *index as u64, prefix_bits, flags),
                    NameRef::Literal(raw) => {
                        put_integer(dst, 0, prefix_bits, flags);
                        string::encode(dst, raw, huffman.use_for(raw));
                    }
                }
                string::encode(dst, value, huffman.use_for(value));
            }
        }
    }

    /// Parse one representation from the start of `src`.
    ///
    /// Returns it with the number of bytes consumed. Indices are not resolved
    /// here; an indexed field with index 0 is rejected.
    pub fn decode(src: &[u8]) -> Result<(Representation, usize)> {
        let first = *src.first().ok_or(HpackError::TruncatedInput)?;

        if first & INDEXED != 0 {
            let (index, used) = decode_usize(src, 7)?;
            if index == 0 {
                return Err(HpackError::IndexOutOfRange(0));
            }
            return Ok((Representation::Indexed(index), used));
        }

        if first & SIZE_UPDATE != 0 && first & LITERAL_INCREMENTAL == 0 {
            let (size, used) = decode_usize(src, 5)?;
            return Ok((Representation::SizeUpdate(size), used));
        }

        let indexing = if first & LITERAL_INCREMENTAL != 0 {
            Indexing::Incremental
        } else if first & LITERAL_NEVER_INDEXED != 0 {
            Indexing::NeverIndexed
        } else {
            Indexing::WithoutIndexing
        };
        let (prefix_bits, _) = literal_prefix(indexing);

        let (index, mut pos) = decode_usize(src, prefix_bits)?;
        let name = if index == 0 {
            let (raw, used) = string::decode(&src[pos..])?;
            pos += used;
            NameRef::Literal(raw)
        } else {
            NameRef::Indexed(index)
        };

        let (value, used) = string::decode(&src[pos..])?;
        pos += used;

        Ok((
            Representation::Literal {
                name,
                value,
                indexing,
            },
            pos,
        ))
    }
}

fn literal_prefix(indexing: Indexing) -> (u8, u8) {
    match indexing {
        Indexing::Incremental => (6, LITERAL_INCREMENTAL),
        Indexing::WithoutIndexing => (4, LITERAL_WITHOUT_INDEXING),
        Indexing::NeverIndexed => (4, LITERAL_NEVER_INDEXED),
    }
}
