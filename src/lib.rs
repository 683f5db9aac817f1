//! h2pack - HPACK header compression with HTTP/2 framing
//!
//! This crate implements HPACK (RFC 7541) and the slice of the HTTP/2 frame
//! layer (RFC 7540) that carries header blocks: frame encoding and decoding,
//! SETTINGS, and CONTINUATION fragmentation.
//!
//! - [`hpack`]: integer, Huffman and string literal codecs, static and
//!   dynamic tables, header block encoder and decoder
//! - [`h2`]: frames, frame codec, header block reassembly and a
//!   per-connection codec tying SETTINGS to the HPACK tables
//! - [`util`]: hex dumps for wire-level logging

pub mod h2;
pub mod hpack;
pub mod util;
