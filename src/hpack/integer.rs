//! Integer representation (RFC 7541 Section 5.1)
//!
//! An integer is stored in the low `N` bits of a prefix byte whose high bits
//! belong to the enclosing representation. Values that do not fit are
//! continued as little-endian base-128 groups, the high bit of each group
//! marking that another group follows.

use super::error::{HpackError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Largest integer accepted by the encoder and the decoder (2^53 - 1)
pub const MAX_INTEGER: u64 = (1 << 53) - 1;

/// Encode `value` with an `prefix_bits`-bit prefix into a fresh buffer.
///
/// Negative values and prefix widths outside `1..=8` are rejected.
pub fn encode(value: i64, prefix_bits: u8) -> Result<Bytes> {
    if value < 0 {
        return Err(HpackError::InvalidArgument(format!(
            "integer must not be negative: {}",
            value
        )));
    }
    let mut dst = BytesMut::with_capacity(4);
    encode_into(&mut dst, value as u64, prefix_bits, 0)?;
    Ok(dst.freeze())
}

/// Encode `value` into `dst`, OR-ing `flags` into the prefix byte.
///
/// `flags` must only use bits above the prefix. Values above [`MAX_INTEGER`]
/// are rejected and `dst` is left untouched.
pub fn encode_into(dst: &mut BytesMut, value: u64, prefix_bits: u8, flags: u8) -> Result<()> {
    check_prefix(prefix_bits)?;
    if value > MAX_INTEGER {
        return Err(HpackError::InvalidArgument(format!(
            "integer {} exceeds ceiling {}",
            value, MAX_INTEGER
        )));
    }
    let max_prefix = prefix_max(prefix_bits);
    if u64::from(flags) & max_prefix != 0 {
        return Err(HpackError::InvalidArgument(format!(
            "flags 0x{:02x} overlap a {}-bit prefix",
            flags, prefix_bits
        )));
    }
    put_integer(dst, value, prefix_bits, flags);
    Ok(())
}

/// Infallible form used by the encoder, whose prefix widths are constants.
pub(crate) fn put_integer(dst: &mut BytesMut, value: u64, prefix_bits: u8, flags: u8) {
    let max_prefix = prefix_max(prefix_bits);

    if value < max_prefix {
        dst.put_u8(flags | value as u8);
        return;
    }

    dst.put_u8(flags | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        dst.put_u8((remaining & 0x7f) as u8 | 0x80);
        remaining >>= 7;
    }
    dst.put_u8(remaining as u8);
}

/// Decode an integer with a `prefix_bits`-bit prefix from the start of `src`.
///
/// Returns the value and the number of bytes consumed. Bits above the prefix
/// in the first byte are ignored.
pub fn decode(src: &[u8], prefix_bits: u8) -> Result<(u64, usize)> {
    check_prefix(prefix_bits)?;
    let first = *src.first().ok_or(HpackError::TruncatedInput)?;

    let max_prefix = prefix_max(prefix_bits);
    let mut value = u64::from(first) & max_prefix;
    if value < max_prefix {
        return Ok((value, 1));
    }

    let mut shift = 0u32;
    for (i, &byte) in src.iter().enumerate().skip(1) {
        // 8 groups of 7 bits already exceed the ceiling
        if shift > 49 {
            return Err(HpackError::IntegerOverflow);
        }
        value += u64::from(byte & 0x7f) << shift;
        if value > MAX_INTEGER {
            return Err(HpackError::IntegerOverflow);
        }
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(HpackError::TruncatedInput)
}

/// Decode an integer that addresses memory (an index or a length).
pub(crate) fn decode_usize(src: &[u8], prefix_bits: u8) -> Result<(usize, usize)> {
    let (value, consumed) = decode(src, prefix_bits)?;
    let value = usize::try_from(value).map_err(|_| HpackError::IntegerOverflow)?;
    Ok((value, consumed))
}

fn prefix_max(prefix_bits: u8) -> u64 {
    (1u64 << prefix_bits) - 1
}

fn check_prefix(prefix_bits: u8) -> Result<()> {
    if (1..=8).contains(&prefix_bits) {
        Ok(())
    } else {
        Err(HpackError::InvalidArgument(format!(
            "prefix width must be 1..=8, got {}",
            prefix_bits
        )))
    }
}
