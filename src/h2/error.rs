//! HTTP/2 error types
//!
//! This module defines error types for the frame layer, mapping to
//! the error codes defined in RFC 7540 Section 7.

use crate::hpack::HpackError;
use std::fmt;

/// HTTP/2 errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error detected (RFC 7540 Section 7 - Error code 0x1)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Flow control error (RFC 7540 Section 7 - Error code 0x3)
    #[error("Flow control error: {0}")]
    FlowControl(String),

    /// Frame size error (RFC 7540 Section 7 - Error code 0x6)
    #[error("Frame size error: {0}")]
    FrameSize(String),

    /// Header block could not be (de)compressed (Error code 0x9)
    #[error("Compression error: {0}")]
    Compression(#[from] HpackError),

    /// Stream ID not valid for this frame type
    #[error("Invalid stream ID {stream_id} for {frame_type} frame")]
    InvalidStreamId {
        /// Offending stream ID
        stream_id: u32,
        /// Frame type name
        frame_type: &'static str,
    },

    /// Invalid settings value
    #[error("Invalid settings value: {0}")]
    InvalidSettings(String),

    /// Header block fragments outgrew what this endpoint buffers
    #[error("Header block of {size} bytes exceeds limit {limit}")]
    HeaderBlockTooLarge {
        /// Bytes the block would occupy with the offending fragment
        size: usize,
        /// Reassembly limit
        limit: usize,
    },
}

impl Error {
    /// RFC 7540 error code to report in RST_STREAM or GOAWAY
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Io(_) => ErrorCode::InternalError,
            Error::Protocol(_) | Error::InvalidStreamId { .. } | Error::InvalidSettings(_) => {
                ErrorCode::ProtocolError
            }
            Error::FlowControl(_) => ErrorCode::FlowControlError,
            Error::FrameSize(_) => ErrorCode::FrameSizeError,
            Error::Compression(_) => ErrorCode::CompressionError,
            Error::HeaderBlockTooLarge { .. } => ErrorCode::EnhanceYourCalm,
        }
    }
}

/// HTTP/2 error codes as defined in RFC 7540 Section 7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown
    NoError = 0x0,
    /// Protocol error detected
    ProtocolError = 0x1,
    /// Implementation fault
    InternalError = 0x2,
    /// Flow-control limits exceeded
    FlowControlError = 0x3,
    /// Settings not acknowledged
    SettingsTimeout = 0x4,
    /// Frame received for closed stream
    StreamClosed = 0x5,
    /// Frame size incorrect
    FrameSizeError = 0x6,
    /// Stream not processed
    RefusedStream = 0x7,
    /// Stream cancelled
    Cancel = 0x8,
    /// Compression state not updated
    CompressionError = 0x9,
    /// TCP connection error for CONNECT method
    ConnectError = 0xa,
    /// Processing capacity exceeded
    EnhanceYourCalm = 0xb,
    /// Negotiated TLS parameters not acceptable
    InadequateSecurity = 0xc,
    /// Use HTTP/1.1 for the request
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Convert error code to u32
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Create error code from u32
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0x0 => Some(ErrorCode::NoError),
            0x1 => Some(ErrorCode::ProtocolError),
            0x2 => Some(ErrorCode::InternalError),
            0x3 => Some(ErrorCode::FlowControlError),
            0x4 => Some(ErrorCode::SettingsTimeout),
            0x5 => Some(ErrorCode::StreamClosed),
            0x6 => Some(ErrorCode::FrameSizeError),
            0x7 => Some(ErrorCode::RefusedStream),
            0x8 => Some(ErrorCode::Cancel),
            0x9 => Some(ErrorCode::CompressionError),
            0xa => Some(ErrorCode::ConnectError),
            0xb => Some(ErrorCode::EnhanceYourCalm),
            0xc => Some(ErrorCode::InadequateSecurity),
            0xd => Some(ErrorCode::Http11Required),
            _ => None,
        }
    }

    /// Get error name
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

/// Result type for HTTP/2 operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::NoError.as_u32(), 0x0);
        assert_eq!(ErrorCode::CompressionError.as_u32(), 0x9);

        assert_eq!(ErrorCode::from_u32(0x9), Some(ErrorCode::CompressionError));
        assert_eq!(ErrorCode::from_u32(0xff), None);
    }

    #[test]
    fn test_compression_error_maps_to_code() {
        let err = Error::from(HpackError::TruncatedInput);
        assert_eq!(err.code(), ErrorCode::CompressionError);
        assert_eq!(err.to_string(), "Compression error: Truncated input");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidStreamId {
            stream_id: 3,
            frame_type: "SETTINGS",
        };
        assert_eq!(err.to_string(), "Invalid stream ID 3 for SETTINGS frame");
        assert_eq!(err.code(), ErrorCode::ProtocolError);
        assert_eq!(ErrorCode::FrameSizeError.to_string(), "FRAME_SIZE_ERROR (0x6)");
    }

    #[test]
    fn test_header_block_too_large_code() {
        let err = Error::HeaderBlockTooLarge { size: 70000, limit: 65536 };
        assert_eq!(err.code(), ErrorCode::EnhanceYourCalm);
        assert_eq!(err.to_string(), "Header block of 70000 bytes exceeds limit 65536");
    }
}
