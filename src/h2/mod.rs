//! HTTP/2 framing around HPACK
//!
//! This module carries header blocks over the HTTP/2 frame layer (RFC 7540):
//! the frame envelope and per-kind payloads, SETTINGS parameters,
//! CONTINUATION fragmentation, and a per-connection codec that wires SETTINGS
//! into the HPACK encoder and decoder.
//!
//! Stream state, flow control and priority scheduling are left to the
//! caller; frames go in and out as values.
//!
//! # Examples
//!
//! ```
//! use h2pack::h2::{ConnectionCodecBuilder, FrameCodec};
//! use h2pack::hpack::HeaderField;
//!
//! let mut client = ConnectionCodecBuilder::new().build().unwrap();
//! let mut server = ConnectionCodecBuilder::new().build().unwrap();
//!
//! let request = vec![
//!     HeaderField::new(":method", "GET"),
//!     HeaderField::new(":path", "/"),
//! ];
//!
//! let mut wire = FrameCodec::new();
//! for frame in client.encode_headers(1, &request, true).unwrap() {
//!     wire.feed(&FrameCodec::encode_frame(&frame));
//! }
//!
//! while let Some(frame) = wire.next_frame().unwrap() {
//!     if let Some(headers) = server.receive_frame(&frame).unwrap() {
//!         assert_eq!(headers.stream_id, 1);
//!         assert_eq!(headers.fields, request);
//!     }
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod frames;
pub mod header_block;
pub mod settings;

pub use codec::{FrameCodec, FrameHeader};
pub use connection::{ConnectionCodec, ConnectionCodecBuilder, DecodedHeaders};
pub use error::{Error, ErrorCode, Result};
pub use frames::{
    ContinuationFrame, DataFrame, Frame, FrameFlags, FrameType, HeadersFrame, PushPromiseFrame, SettingsFrame,
};
pub use header_block::{
    fragment_header_block, fragment_push_promise, HeaderBlock, HeaderBlockAssembler, HeaderBlockKind,
    DEFAULT_MAX_HEADER_BLOCK_SIZE,
};
pub use settings::{Settings, SettingsBuilder, SettingsParameter};

/// HTTP/2 connection preface that must be sent by clients
///
/// From RFC 7540 Section 3.5:
/// "PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default initial window size (65535 bytes)
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;

/// Default maximum frame size (16384 bytes)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;

/// Default header table size (4096 bytes)
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;

/// Maximum stream ID value (2^31 - 1)
pub const MAX_STREAM_ID: u32 = 0x7FFFFFFF;

/// Stream ID 0 (connection-level)
pub const CONNECTION_STREAM_ID: u32 = 0;
