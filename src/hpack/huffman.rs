//! Huffman coding of string literals (RFC 7541 Appendix B)
//!
//! The code is a fixed canonical Huffman code over the 256 byte values plus
//! an end-of-string symbol. Encoded strings are padded to a byte boundary with
//! the most significant bits of EOS, which are all ones.

use super::error::{HpackError, Result};
use crate::util::to_bin;
use bytes::{BufMut, BytesMut};
use std::sync::OnceLock;

/// EOS symbol, never emitted inside a string
const EOS: u16 = 256;

/// `(bit length, code)` for every symbol, indexed by byte value, EOS last.
#[rustfmt::skip]
static ENCODE_TABLE: [(u8, u32); 257] = [
    (13, 0x1ff8), (23, 0x7fffd8), (28, 0xfffffe2), (28, 0xfffffe3), // 0
    (28, 0xfffffe4), (28, 0xfffffe5), (28, 0xfffffe6), (28, 0xfffffe7), // 4
    (28, 0xfffffe8), (24, 0xffffea), (30, 0x3ffffffc), (28, 0xfffffe9), // 8
    (28, 0xfffffea), (30, 0x3ffffffd), (28, 0xfffffeb), (28, 0xfffffec), // 12
    (28, 0xfffffed), (28, 0xfffffee), (28, 0xfffffef), (28, 0xffffff0), // 16
    (28, 0xffffff1), (28, 0xffffff2), (30, 0x3ffffffe), (28, 0xffffff3), // 20
    (28, 0xffffff4), (28, 0xffffff5), (28, 0xffffff6), (28, 0xffffff7), // 24
    (28, 0xffffff8), (28, 0xffffff9), (28, 0xffffffa), (28, 0xffffffb), // 28
    (6, 0x14), (10, 0x3f8), (10, 0x3f9), (12, 0xffa), // 32
    (13, 0x1ff9), (6, 0x15), (8, 0xf8), (11, 0x7fa), // 36
    (10, 0x3fa), (10, 0x3fb), (8, 0xf9), (11, 0x7fb), // 40
    (8, 0xfa), (6, 0x16), (6, 0x17), (6, 0x18), // 44
    (5, 0x0), (5, 0x1), (5, 0x2), (6, 0x19), // 48
    (6, 0x1a), (6, 0x1b), (6, 0x1c), (6, 0x1d), // 52
    (6, 0x1e), (6, 0x1f), (7, 0x5c), (8, 0xfb), // 56
    (15, 0x7ffc), (6, 0x20), (12, 0xffb), (10, 0x3fc), // 60
    (13, 0x1ffa), (6, 0x21), (7, 0x5d), (7, 0x5e), // 64
    (7, 0x5f), (7, 0x60), (7, 0x61), (7, 0x62), // 68
    (7, 0x63), (7, 0x64), (7, 0x65), (7, 0x66), // 72
    (7, 0x67), (7, 0x68), (7, 0x69), (7, 0x6a), // 76
    (7, 0x6b), (7, 0x6c), (7, 0x6d), (7, 0x6e), // 80
    (7, 0x6f), (7, 0x70), (7, 0x71), (7, 0x72), // 84
    (8, 0xfc), (7, 0x73), (8, 0xfd), (13, 0x1ffb), // 88
    (19, 0x7fff0), (13, 0x1ffc), (14, 0x3ffc), (6, 0x22), // 92
    (15, 0x7ffd), (5, 0x3), (6, 0x23), (5, 0x4), // 96
    (6, 0x24), (5, 0x5), (6, 0x25), (6, 0x26), // 100
    (6, 0x27), (5, 0x6), (7, 0x74), (7, 0x75), // 104
    (6, 0x28), (6, 0x29), (6, 0x2a), (5, 0x7), // 108
    (6, 0x2b), (7, 0x76), (6, 0x2c), (5, 0x8), // 112
    (5, 0x9), (6, 0x2d), (7, 0x77), (7, 0x78), // 116
    (7, 0x79), (7, 0x7a), (7, 0x7b), (15, 0x7ffe), // 120
    (11, 0x7fc), (14, 0x3ffd), (13, 0x1ffd), (28, 0xffffffc), // 124
    (20, 0xfffe6), (22, 0x3fffd2), (20, 0xfffe7), (20, 0xfffe8), // 128
    (22, 0x3fffd3), (22, 0x3fffd4), (22, 0x3fffd5), (23, 0x7fffd9), // 132
    (22, 0x3fffd6), (23, 0x7fffda), (23, 0x7fffdb), (23, 0x7fffdc), // 136
    (23, 0x7fffdd), (23, 0x7fffde), (24, 0xffffeb), (23, 0x7fffdf), // 140
    (24, 0xffffec), (24, 0xffffed), (22, 0x3fffd7), (23, 0x7fffe0), // 144
    (24, 0xffffee), (23, 0x7fffe1), (23, 0x7fffe2), (23, 0x7fffe3), // 148
    (23, 0x7fffe4), (21, 0x1fffdc), (22, 0x3fffd8), (23, 0x7fffe5), // 152
    (22, 0x3fffd9), (23, 0x7fffe6), (23, 0x7fffe7), (24, 0xffffef), // 156
    (22, 0x3fffda), (21, 0x1fffdd), (20, 0xfffe9), (22, 0x3fffdb), // 160
    (22, 0x3fffdc), (23, 0x7fffe8), (23, 0x7fffe9), (21, 0x1fffde), // 164
    (23, 0x7fffea), (22, 0x3fffdd), (22, 0x3fffde), (24, 0xfffff0), // 168
    (21, 0x1fffdf), (22, 0x3fffdf), (23, 0x7fffeb), (23, 0x7fffec), // 172
    (21, 0x1fffe0), (21, 0x1fffe1), (22, 0x3fffe0), (21, 0x1fffe2), // 176
    (23, 0x7fffed), (22, 0x3fffe1), (23, 0x7fffee), (23, 0x7fffef), // 180
    (20, 0xfffea), (22, 0x3fffe2), (22, 0x3fffe3), (22, 0x3fffe4), // 184
    (23, 0x7ffff0), (22, 0x3fffe5), (22, 0x3fffe6), (23, 0x7ffff1), // 188
    (26, 0x3ffffe0), (26, 0x3ffffe1), (20, 0xfffeb), (19, 0x7fff1), // 192
    (22, 0x3fffe7), (23, 0x7ffff2), (22, 0x3fffe8), (25, 0x1ffffec), // 196
    (26, 0x3ffffe2), (26, 0x3ffffe3), (26, 0x3ffffe4), (27, 0x7ffffde), // 200
    (27, 0x7ffffdf), (26, 0x3ffffe5), (24, 0xfffff1), (25, 0x1ffffed), // 204
    (19, 0x7fff2), (21, 0x1fffe3), (26, 0x3ffffe6), (27, 0x7ffffe0), // 208
    (27, 0x7ffffe1), (26, 0x3ffffe7), (27, 0x7ffffe2), (24, 0xfffff2), // 212
    (21, 0x1fffe4), (21, 0x1fffe5), (26, 0x3ffffe8), (26, 0x3ffffe9), // 216
    (28, 0xffffffd), (27, 0x7ffffe3), (27, 0x7ffffe4), (27, 0x7ffffe5), // 220
    (20, 0xfffec), (24, 0xfffff3), (20, 0xfffed), (21, 0x1fffe6), // 224
    (22, 0x3fffe9), (21, 0x1fffe7), (21, 0x1fffe8), (23, 0x7ffff3), // 228
    (22, 0x3fffea), (22, 0x3fffeb), (25, 0x1ffffee), (25, 0x1ffffef), // 232
    (24, 0xfffff4), (24, 0xfffff5), (26, 0x3ffffea), (23, 0x7ffff4), // 236
    (26, 0x3ffffeb), (27, 0x7ffffe6), (26, 0x3ffffec), (26, 0x3ffffed), // 240
    (27, 0x7ffffe7), (27, 0x7ffffe8), (27, 0x7ffffe9), (27, 0x7ffffea), // 244
    (27, 0x7ffffeb), (28, 0xffffffe), (27, 0x7ffffec), (27, 0x7ffffed), // 248
    (27, 0x7ffffee), (27, 0x7ffffef), (27, 0x7fffff0), (26, 0x3ffffee), // 252
    (30, 0x3fffffff), // 256
];

/// Marks a child slot of the decode tree as holding a symbol
const LEAF: u16 = 0x8000;

/// Binary decode tree; node 0 is the root, a zero child means "no edge".
struct DecodeTree {
    nodes: Vec<[u16; 2]>,
}

impl DecodeTree {
    fn build() -> Self {
        let mut nodes = vec![[0u16; 2]];

        for (symbol, &(bits, code)) in ENCODE_TABLE.iter().enumerate() {
            let mut node = 0usize;
            for i in (0..bits).rev() {
                let bit = ((code >> i) & 1) as usize;
                if i == 0 {
                    nodes[node][bit] = LEAF | symbol as u16;
                } else {
                    if nodes[node][bit] == 0 {
                        nodes.push([0, 0]);
                        nodes[node][bit] = (nodes.len() - 1) as u16;
                    }
                    node = nodes[node][bit] as usize;
                }
            }
        }

        DecodeTree { nodes }
    }
}

fn decode_tree() -> &'static DecodeTree {
    static TREE: OnceLock<DecodeTree> = OnceLock::new();
    TREE.get_or_init(DecodeTree::build)
}

/// Number of bytes `src` occupies once Huffman encoded.
pub fn encoded_len(src: &[u8]) -> usize {
    let bits: usize = src
        .iter()
        .map(|&b| ENCODE_TABLE[b as usize].0 as usize)
        .sum();
    (bits + 7) / 8
}

/// Huffman encode `src`, appending to `dst`.
pub fn encode(src: &[u8], dst: &mut BytesMut) {
    let mut acc: u64 = 0;
    let mut pending: u32 = 0;

    dst.reserve(encoded_len(src));
    for &byte in src {
        let (bits, code) = ENCODE_TABLE[byte as usize];
        acc = (acc << bits) | u64::from(code);
        pending += u32::from(bits);

        while pending >= 8 {
            pending -= 8;
            dst.put_u8((acc >> pending) as u8);
        }
        acc &= (1u64 << pending) - 1;
    }

    if pending > 0 {
        let pad = 8 - pending;
        dst.put_u8(((acc << pad) | ((1u64 << pad) - 1)) as u8);
    }
}

/// Decode a Huffman-encoded string.
///
/// Fails on a code that reaches EOS, on padding longer than 7 bits and on
/// padding that is not a prefix of EOS.
pub fn decode(src: &[u8]) -> Result<Vec<u8>> {
    let tree = decode_tree();
    let mut out = Vec::with_capacity(src.len() * 8 / 5);

    let mut node = 0usize;
    // bits consumed since the last complete symbol
    let mut depth = 0u32;
    let mut all_ones = true;

    for &byte in src {
        for i in (0..8).rev() {
            let bit = ((byte >> i) & 1) as usize;
            let next = tree.nodes[node][bit];
            depth += 1;
            all_ones &= bit == 1;

            if next & LEAF != 0 {
                let symbol = next & !LEAF;
                if symbol == EOS {
                    return Err(HpackError::HuffmanDecodeError);
                }
                out.push(symbol as u8);
                node = 0;
                depth = 0;
                all_ones = true;
            } else if next == 0 {
                return Err(HpackError::HuffmanDecodeError);
            } else {
                node = next as usize;
            }
        }
    }

    if depth > 7 || !all_ones {
        if let Some(&last) = src.last() {
            tracing::trace!(padding_bits = depth, last = %to_bin(last), "invalid huffman padding");
        }
        return Err(HpackError::HuffmanDecodeError);
    }

    Ok(out)
}
