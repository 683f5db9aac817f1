//! HTTP/2 frame types
//!
//! This module defines the frame types specified in RFC 7540 Section 6.
//! Every frame kind is one variant of [`Frame`]; the byte layout lives in
//! [`codec`](super::codec).

use super::error::ErrorCode;
use super::settings::Settings;
use bytes::Bytes;
use std::fmt;

/// HTTP/2 frame types (RFC 7540 Section 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// DATA frame (0x0) - Conveys arbitrary, variable-length sequences of octets
    Data = 0x0,
    /// HEADERS frame (0x1) - Opens a stream and carries header block fragment
    Headers = 0x1,
    /// PRIORITY frame (0x2) - Specifies sender-advised priority of a stream
    Priority = 0x2,
    /// RST_STREAM frame (0x3) - Allows immediate termination of a stream
    RstStream = 0x3,
    /// SETTINGS frame (0x4) - Conveys configuration parameters
    Settings = 0x4,
    /// PUSH_PROMISE frame (0x5) - Used to notify peer of intent to initiate stream
    PushPromise = 0x5,
    /// PING frame (0x6) - Mechanism for measuring round-trip time
    Ping = 0x6,
    /// GOAWAY frame (0x7) - Initiates shutdown of connection
    Goaway = 0x7,
    /// WINDOW_UPDATE frame (0x8) - Implements flow control
    WindowUpdate = 0x8,
    /// CONTINUATION frame (0x9) - Continues sequence of header block fragments
    Continuation = 0x9,
}

impl FrameType {
    /// Convert frame type to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create frame type from u8
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(FrameType::Data),
            0x1 => Some(FrameType::Headers),
            0x2 => Some(FrameType::Priority),
            0x3 => Some(FrameType::RstStream),
            0x4 => Some(FrameType::Settings),
            0x5 => Some(FrameType::PushPromise),
            0x6 => Some(FrameType::Ping),
            0x7 => Some(FrameType::Goaway),
            0x8 => Some(FrameType::WindowUpdate),
            0x9 => Some(FrameType::Continuation),
            _ => None,
        }
    }

    /// Get frame type name
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Data => "DATA",
            FrameType::Headers => "HEADERS",
            FrameType::Priority => "PRIORITY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::PushPromise => "PUSH_PROMISE",
            FrameType::Ping => "PING",
            FrameType::Goaway => "GOAWAY",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Continuation => "CONTINUATION",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u8())
    }
}

/// HTTP/2 frame flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Create empty flags
    pub fn empty() -> Self {
        FrameFlags(0)
    }

    /// Create from u8
    pub fn from_u8(flags: u8) -> Self {
        FrameFlags(flags)
    }

    /// Get raw u8 value
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Set a flag
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Set a flag when `on` is true
    pub fn set_if(&mut self, flag: u8, on: bool) {
        if on {
            self.set(flag);
        }
    }

    /// Check if a flag is set
    pub fn is_set(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// END_STREAM flag (0x1)
    pub const END_STREAM: u8 = 0x1;

    /// ACK flag (0x1) - used for SETTINGS and PING
    pub const ACK: u8 = 0x1;

    /// END_HEADERS flag (0x4)
    pub const END_HEADERS: u8 = 0x4;

    /// PADDED flag (0x8)
    pub const PADDED: u8 = 0x8;

    /// PRIORITY flag (0x20)
    pub const PRIORITY: u8 = 0x20;

    /// Check if END_STREAM is set
    pub fn is_end_stream(&self) -> bool {
        self.is_set(Self::END_STREAM)
    }

    /// Check if ACK is set
    pub fn is_ack(&self) -> bool {
        self.is_set(Self::ACK)
    }

    /// Check if END_HEADERS is set
    pub fn is_end_headers(&self) -> bool {
        self.is_set(Self::END_HEADERS)
    }

    /// Check if PADDED is set
    pub fn is_padded(&self) -> bool {
        self.is_set(Self::PADDED)
    }

    /// Check if PRIORITY is set
    pub fn is_priority(&self) -> bool {
        self.is_set(Self::PRIORITY)
    }
}

/// One HTTP/2 frame, decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// DATA
    Data(DataFrame),
    /// HEADERS
    Headers(HeadersFrame),
    /// PRIORITY
    Priority(PriorityFrame),
    /// RST_STREAM
    RstStream(RstStreamFrame),
    /// SETTINGS
    Settings(SettingsFrame),
    /// PUSH_PROMISE
    PushPromise(PushPromiseFrame),
    /// PING
    Ping(PingFrame),
    /// GOAWAY
    Goaway(GoawayFrame),
    /// WINDOW_UPDATE
    WindowUpdate(WindowUpdateFrame),
    /// CONTINUATION
    Continuation(ContinuationFrame),
    /// Frame of a type this codec does not know; receivers ignore it
    Unknown(UnknownFrame),
}

impl Frame {
    /// Frame type, `None` for unknown types
    pub fn frame_type(&self) -> Option<FrameType> {
        let kind = match self {
            Frame::Data(_) => FrameType::Data,
            Frame::Headers(_) => FrameType::Headers,
            Frame::Priority(_) => FrameType::Priority,
            Frame::RstStream(_) => FrameType::RstStream,
            Frame::Settings(_) => FrameType::Settings,
            Frame::PushPromise(_) => FrameType::PushPromise,
            Frame::Ping(_) => FrameType::Ping,
            Frame::Goaway(_) => FrameType::Goaway,
            Frame::WindowUpdate(_) => FrameType::WindowUpdate,
            Frame::Continuation(_) => FrameType::Continuation,
            Frame::Unknown(_) => return None,
        };
        Some(kind)
    }

    /// Type octet as sent on the wire
    pub fn type_byte(&self) -> u8 {
        match self {
            Frame::Unknown(frame) => frame.frame_type,
            other => other.frame_type().map_or(0, FrameType::as_u8),
        }
    }

    /// Stream the frame belongs to (0 for connection-level frames)
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data(f) => f.stream_id,
            Frame::Headers(f) => f.stream_id,
            Frame::Priority(f) => f.stream_id,
            Frame::RstStream(f) => f.stream_id,
            Frame::PushPromise(f) => f.stream_id,
            Frame::WindowUpdate(f) => f.stream_id,
            Frame::Continuation(f) => f.stream_id,
            Frame::Unknown(f) => f.stream_id,
            Frame::Settings(_) | Frame::Ping(_) | Frame::Goaway(_) => 0,
        }
    }

    /// Flags as they appear in the frame header
    pub fn flags(&self) -> FrameFlags {
        let mut flags = FrameFlags::empty();
        match self {
            Frame::Data(f) => {
                flags.set_if(FrameFlags::END_STREAM, f.end_stream);
                flags.set_if(FrameFlags::PADDED, f.padding.is_some());
            }
            Frame::Headers(f) => {
                flags.set_if(FrameFlags::END_STREAM, f.end_stream);
                flags.set_if(FrameFlags::END_HEADERS, f.end_headers);
                flags.set_if(FrameFlags::PADDED, f.padding.is_some());
                flags.set_if(FrameFlags::PRIORITY, f.priority.is_some());
            }
            Frame::PushPromise(f) => {
                flags.set_if(FrameFlags::END_HEADERS, f.end_headers);
                flags.set_if(FrameFlags::PADDED, f.padding.is_some());
            }
            Frame::Continuation(f) => flags.set_if(FrameFlags::END_HEADERS, f.end_headers),
            Frame::Settings(f) => flags.set_if(FrameFlags::ACK, f.ack),
            Frame::Ping(f) => flags.set_if(FrameFlags::ACK, f.ack),
            Frame::Unknown(f) => flags = f.flags,
            Frame::Priority(_) | Frame::RstStream(_) | Frame::Goaway(_) | Frame::WindowUpdate(_) => {}
        }
        flags
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_type() {
            Some(kind) => write!(f, "{}", kind.name())?,
            None => write!(f, "UNKNOWN(0x{:x})", self.type_byte())?,
        }
        write!(f, " stream={} flags=0x{:x}", self.stream_id(), self.flags().as_u8())
    }
}

macro_rules! impl_from_frame {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Frame {
                fn from(frame: $ty) -> Self {
                    Frame::$variant(frame)
                }
            }
        )*
    };
}

impl_from_frame!(
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    Goaway(GoawayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    Unknown(UnknownFrame),
);

/// DATA frame (RFC 7540 Section 6.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Stream ID
    pub stream_id: u32,
    /// Data payload
    pub data: Bytes,
    /// END_STREAM flag
    pub end_stream: bool,
    /// Padding length (if PADDED flag is set)
    pub padding: Option<u8>,
}

impl DataFrame {
    /// Create a new DATA frame
    pub fn new(stream_id: u32, data: Bytes, end_stream: bool) -> Self {
        DataFrame {
            stream_id,
            data,
            end_stream,
            padding: None,
        }
    }

    /// Set padding
    pub fn with_padding(mut self, padding: u8) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Get total frame size including padding
    pub fn frame_size(&self) -> usize {
        self.data.len() + padded_overhead(self.padding)
    }
}

/// HEADERS frame (RFC 7540 Section 6.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    /// Stream ID
    pub stream_id: u32,
    /// Header block fragment
    pub header_block: Bytes,
    /// END_STREAM flag
    pub end_stream: bool,
    /// END_HEADERS flag
    pub end_headers: bool,
    /// Priority information (if PRIORITY flag is set)
    pub priority: Option<PrioritySpec>,
    /// Padding length (if PADDED flag is set)
    pub padding: Option<u8>,
}

impl HeadersFrame {
    /// Create a new HEADERS frame
    pub fn new(stream_id: u32, header_block: Bytes, end_stream: bool, end_headers: bool) -> Self {
        HeadersFrame {
            stream_id,
            header_block,
            end_stream,
            end_headers,
            priority: None,
            padding: None,
        }
    }

    /// Set priority
    pub fn with_priority(mut self, priority: PrioritySpec) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set padding
    pub fn with_padding(mut self, padding: u8) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Payload bytes spent on anything but the header block
    pub fn overhead(&self) -> usize {
        padded_overhead(self.padding) + if self.priority.is_some() { 5 } else { 0 }
    }
}

/// Priority specification (RFC 7540 Section 6.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioritySpec {
    /// Stream dependency
    pub stream_dependency: u32,
    /// Exclusive flag
    pub exclusive: bool,
    /// Weight as sent on the wire (effective weight minus one)
    pub weight: u8,
}

impl PrioritySpec {
    /// Create a new priority specification
    pub fn new(stream_dependency: u32, exclusive: bool, weight: u8) -> Self {
        PrioritySpec {
            stream_dependency,
            exclusive,
            weight,
        }
    }
}

/// PRIORITY frame (RFC 7540 Section 6.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFrame {
    /// Stream ID
    pub stream_id: u32,
    /// Priority specification
    pub priority: PrioritySpec,
}

/// RST_STREAM frame (RFC 7540 Section 6.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStreamFrame {
    /// Stream ID
    pub stream_id: u32,
    /// Error code
    pub error_code: ErrorCode,
}

/// SETTINGS frame (RFC 7540 Section 6.5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    /// ACK flag
    pub ack: bool,
    /// Settings parameters
    pub settings: Settings,
}

impl SettingsFrame {
    /// Create a new SETTINGS frame
    pub fn new(settings: Settings) -> Self {
        SettingsFrame {
            ack: false,
            settings,
        }
    }

    /// Create a SETTINGS ACK frame
    pub fn ack() -> Self {
        SettingsFrame {
            ack: true,
            settings: Settings::default(),
        }
    }
}

/// PUSH_PROMISE frame (RFC 7540 Section 6.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPromiseFrame {
    /// Stream ID
    pub stream_id: u32,
    /// Promised stream ID
    pub promised_stream_id: u32,
    /// Header block fragment
    pub header_block: Bytes,
    /// END_HEADERS flag
    pub end_headers: bool,
    /// Padding length (if PADDED flag is set)
    pub padding: Option<u8>,
}

impl PushPromiseFrame {
    /// Create a new PUSH_PROMISE frame
    pub fn new(stream_id: u32, promised_stream_id: u32, header_block: Bytes, end_headers: bool) -> Self {
        PushPromiseFrame {
            stream_id,
            promised_stream_id,
            header_block,
            end_headers,
            padding: None,
        }
    }

    /// Set padding
    pub fn with_padding(mut self, padding: u8) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Payload bytes spent on anything but the header block
    pub fn overhead(&self) -> usize {
        padded_overhead(self.padding) + 4
    }
}

/// PING frame (RFC 7540 Section 6.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame {
    /// ACK flag
    pub ack: bool,
    /// Opaque data (8 bytes)
    pub data: [u8; 8],
}

impl PingFrame {
    /// Create a new PING frame
    pub fn new(data: [u8; 8]) -> Self {
        PingFrame { ack: false, data }
    }

    /// Create a PING ACK frame
    pub fn ack(data: [u8; 8]) -> Self {
        PingFrame { ack: true, data }
    }
}

/// GOAWAY frame (RFC 7540 Section 6.8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoawayFrame {
    /// Last stream ID
    pub last_stream_id: u32,
    /// Error code
    pub error_code: ErrorCode,
    /// Debug data
    pub debug_data: Bytes,
}

impl GoawayFrame {
    /// Create a new GOAWAY frame
    pub fn new(last_stream_id: u32, error_code: ErrorCode, debug_data: Bytes) -> Self {
        GoawayFrame {
            last_stream_id,
            error_code,
            debug_data,
        }
    }
}

/// WINDOW_UPDATE frame (RFC 7540 Section 6.9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    /// Stream ID (0 for connection-level)
    pub stream_id: u32,
    /// Window size increment
    pub size_increment: u32,
}

impl WindowUpdateFrame {
    /// Create a new WINDOW_UPDATE frame
    pub fn new(stream_id: u32, size_increment: u32) -> Self {
        WindowUpdateFrame {
            stream_id,
            size_increment,
        }
    }
}

/// CONTINUATION frame (RFC 7540 Section 6.10)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationFrame {
    /// Stream ID
    pub stream_id: u32,
    /// Header block fragment
    pub header_block: Bytes,
    /// END_HEADERS flag
    pub end_headers: bool,
}

impl ContinuationFrame {
    /// Create a new CONTINUATION frame
    pub fn new(stream_id: u32, header_block: Bytes, end_headers: bool) -> Self {
        ContinuationFrame {
            stream_id,
            header_block,
            end_headers,
        }
    }
}

/// Frame with an unrecognised type octet, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrame {
    /// Type octet
    pub frame_type: u8,
    /// Raw flags
    pub flags: FrameFlags,
    /// Stream ID
    pub stream_id: u32,
    /// Undecoded payload
    pub payload: Bytes,
}

fn padded_overhead(padding: Option<u8>) -> usize {
    // pad length octet plus the padding itself
    padding.map_or(0, |pad_len| 1 + pad_len as usize)
}
