//! HTTP/2 frame encoding and decoding
//!
//! Every frame is written through one envelope routine: the payload is
//! produced per frame kind, then prefixed with the 9-byte header. Decoding
//! validates the per-kind layout rules of RFC 7540 Section 6 and returns a
//! [`Frame`].

use super::error::{Error, ErrorCode, Result};
use super::frames::*;
use super::settings::Settings;
use super::{CONNECTION_PREFACE, CONNECTION_STREAM_ID, DEFAULT_MAX_FRAME_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{Read, Write};

/// HTTP/2 frame header size (9 bytes)
pub const FRAME_HEADER_SIZE: usize = 9;

/// Maximum frame payload size (16MB - 1)
pub const MAX_FRAME_SIZE: usize = 0x00FFFFFF;

const STREAM_ID_MASK: u32 = 0x7FFFFFFF;
const EXCLUSIVE_BIT: u32 = 0x80000000;

/// Decoded 9-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length (24 bits)
    pub length: usize,
    /// Type octet, possibly unknown
    pub frame_type: u8,
    /// Flags
    pub flags: FrameFlags,
    /// Stream ID with the reserved bit cleared
    pub stream_id: u32,
}

impl FrameHeader {
    /// Known frame type, if any
    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type)
    }
}

/// Frame codec for encoding/decoding HTTP/2 frames
///
/// Holds a read buffer for incremental decoding: bytes go in with
/// [`feed`](FrameCodec::feed), whole frames come out of
/// [`next_frame`](FrameCodec::next_frame).
#[derive(Debug)]
pub struct FrameCodec {
    /// Buffer for reading
    read_buffer: BytesMut,
    /// Our SETTINGS_MAX_FRAME_SIZE
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new frame codec accepting payloads up to 16384 bytes
    pub fn new() -> Self {
        FrameCodec::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE as usize)
    }

    /// Create a frame codec with a specific receive limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        FrameCodec {
            read_buffer: BytesMut::with_capacity(4096),
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
        }
    }

    /// Largest payload accepted by [`next_frame`](FrameCodec::next_frame)
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Change the receive limit, e.g. once our SETTINGS are acknowledged
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size.min(MAX_FRAME_SIZE);
    }

    /// Append bytes received from the transport
    pub fn feed(&mut self, data: &[u8]) {
        self.read_buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet consumed as frames
    pub fn buffered(&self) -> usize {
        self.read_buffer.len()
    }

    /// Consume the client connection preface from the read buffer.
    ///
    /// Servers call this before the first [`next_frame`](FrameCodec::next_frame).
    /// Returns `Ok(false)` until all 24 bytes have been fed; bytes that
    /// diverge from the preface are a PROTOCOL_ERROR as soon as they arrive.
    pub fn read_preface(&mut self) -> Result<bool> {
        let available = self.read_buffer.len().min(CONNECTION_PREFACE.len());
        if self.read_buffer[..available] != CONNECTION_PREFACE[..available] {
            return Err(Error::Protocol("invalid connection preface".to_string()));
        }
        if available < CONNECTION_PREFACE.len() {
            return Ok(false);
        }

        self.read_buffer.advance(CONNECTION_PREFACE.len());
        Ok(true)
    }

    /// Take the next complete frame from the read buffer.
    ///
    /// Returns `Ok(None)` until a whole frame has been fed. A header
    /// announcing a payload above the receive limit fails immediately.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.read_buffer.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&self.read_buffer[..FRAME_HEADER_SIZE]);
        let header = Self::decode_header(&raw);
        check_length(&header, self.max_frame_size)?;

        if self.read_buffer.len() < FRAME_HEADER_SIZE + header.length {
            return Ok(None);
        }

        self.read_buffer.advance(FRAME_HEADER_SIZE);
        let payload = self.read_buffer.split_to(header.length).freeze();
        Self::decode_frame(&header, payload).map(Some)
    }

    /// Encode a frame header
    pub fn encode_header(frame_type: FrameType, flags: FrameFlags, stream_id: u32, length: usize) -> [u8; FRAME_HEADER_SIZE] {
        Self::encode_raw_header(frame_type.as_u8(), flags, stream_id, length)
    }

    fn encode_raw_header(frame_type: u8, flags: FrameFlags, stream_id: u32, length: usize) -> [u8; FRAME_HEADER_SIZE] {
        let mut header = [0u8; FRAME_HEADER_SIZE];

        // Length (24 bits, big-endian)
        header[0] = ((length >> 16) & 0xFF) as u8;
        header[1] = ((length >> 8) & 0xFF) as u8;
        header[2] = (length & 0xFF) as u8;

        header[3] = frame_type;
        header[4] = flags.as_u8();

        // Stream ID (31 bits, big-endian, reserved bit is 0)
        header[5..].copy_from_slice(&(stream_id & STREAM_ID_MASK).to_be_bytes());

        header
    }

    /// Decode a frame header from bytes
    pub fn decode_header(bytes: &[u8; FRAME_HEADER_SIZE]) -> FrameHeader {
        let length = ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | (bytes[2] as usize);

        // Reserved bit is ignored on receipt
        let stream_id = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) & STREAM_ID_MASK;

        FrameHeader {
            length,
            frame_type: bytes[3],
            flags: FrameFlags::from_u8(bytes[4]),
            stream_id,
        }
    }

    /// Encode a frame into a new buffer
    pub fn encode_frame(frame: &Frame) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_frame_into(frame, &mut buf);
        buf.freeze()
    }

    /// Encode a frame, appending header and payload to `dst`.
    ///
    /// The codec writes whatever it is given; sizes are not checked against
    /// any peer limit.
    pub fn encode_frame_into(frame: &Frame, dst: &mut BytesMut) {
        let start = dst.len();
        dst.put_bytes(0, FRAME_HEADER_SIZE);
        encode_payload(frame, dst);

        let length = dst.len() - start - FRAME_HEADER_SIZE;
        let header = Self::encode_raw_header(frame.type_byte(), frame.flags(), frame.stream_id(), length);
        dst[start..start + FRAME_HEADER_SIZE].copy_from_slice(&header);
    }

    /// Decode one frame from its header and complete payload
    pub fn decode_frame(header: &FrameHeader, payload: Bytes) -> Result<Frame> {
        if payload.len() != header.length {
            return Err(Error::FrameSize(format!(
                "payload is {} bytes, header announces {}",
                payload.len(),
                header.length
            )));
        }

        let kind = match header.kind() {
            Some(kind) => kind,
            None => {
                tracing::trace!(frame_type = header.frame_type, "unknown frame type");
                return Ok(Frame::Unknown(UnknownFrame {
                    frame_type: header.frame_type,
                    flags: header.flags,
                    stream_id: header.stream_id,
                    payload,
                }));
            }
        };

        match kind {
            FrameType::Settings | FrameType::Ping | FrameType::Goaway => {
                if header.stream_id != CONNECTION_STREAM_ID {
                    return Err(invalid_stream(header, kind));
                }
            }
            // WINDOW_UPDATE is valid on both the connection and a stream
            FrameType::WindowUpdate => {}
            _ => {
                if header.stream_id == CONNECTION_STREAM_ID {
                    return Err(invalid_stream(header, kind));
                }
            }
        }

        let flags = header.flags;
        let stream_id = header.stream_id;

        let frame = match kind {
            FrameType::Data => {
                let (data, padding) = strip_padding(flags, payload)?;
                Frame::Data(DataFrame {
                    stream_id,
                    data,
                    end_stream: flags.is_end_stream(),
                    padding,
                })
            }
            FrameType::Headers => {
                let (mut block, padding) = strip_padding(flags, payload)?;
                let priority = if flags.is_priority() {
                    if block.len() < 5 {
                        return Err(Error::FrameSize("HEADERS too short for priority".into()));
                    }
                    Some(get_priority(&mut block))
                } else {
                    None
                };
                Frame::Headers(HeadersFrame {
                    stream_id,
                    header_block: block,
                    end_stream: flags.is_end_stream(),
                    end_headers: flags.is_end_headers(),
                    priority,
                    padding,
                })
            }
            FrameType::Priority => {
                let mut payload = exact_length(kind, payload, 5)?;
                Frame::Priority(PriorityFrame {
                    stream_id,
                    priority: get_priority(&mut payload),
                })
            }
            FrameType::RstStream => {
                let mut payload = exact_length(kind, payload, 4)?;
                Frame::RstStream(RstStreamFrame {
                    stream_id,
                    error_code: error_code(payload.get_u32()),
                })
            }
            FrameType::Settings => {
                if flags.is_ack() {
                    if !payload.is_empty() {
                        return Err(Error::FrameSize("SETTINGS ACK with a payload".into()));
                    }
                    Frame::Settings(SettingsFrame::ack())
                } else {
                    Frame::Settings(SettingsFrame::new(Settings::decode_payload(&payload)?))
                }
            }
            FrameType::PushPromise => {
                let (mut block, padding) = strip_padding(flags, payload)?;
                if block.len() < 4 {
                    return Err(Error::FrameSize("PUSH_PROMISE too short".into()));
                }
                let promised_stream_id = block.get_u32() & STREAM_ID_MASK;
                Frame::PushPromise(PushPromiseFrame {
                    stream_id,
                    promised_stream_id,
                    header_block: block,
                    end_headers: flags.is_end_headers(),
                    padding,
                })
            }
            FrameType::Ping => {
                let payload = exact_length(kind, payload, 8)?;
                let mut data = [0u8; 8];
                data.copy_from_slice(&payload);
                Frame::Ping(PingFrame {
                    ack: flags.is_ack(),
                    data,
                })
            }
            FrameType::Goaway => {
                if payload.len() < 8 {
                    return Err(Error::FrameSize("GOAWAY shorter than 8 bytes".into()));
                }
                let mut payload = payload;
                let last_stream_id = payload.get_u32() & STREAM_ID_MASK;
                let error_code = error_code(payload.get_u32());
                Frame::Goaway(GoawayFrame {
                    last_stream_id,
                    error_code,
                    debug_data: payload,
                })
            }
            FrameType::WindowUpdate => {
                let mut payload = exact_length(kind, payload, 4)?;
                let size_increment = payload.get_u32() & STREAM_ID_MASK;
                if size_increment == 0 {
                    return Err(Error::Protocol("WINDOW_UPDATE with zero increment".into()));
                }
                Frame::WindowUpdate(WindowUpdateFrame {
                    stream_id,
                    size_increment,
                })
            }
            FrameType::Continuation => Frame::Continuation(ContinuationFrame {
                stream_id,
                header_block: payload,
                end_headers: flags.is_end_headers(),
            }),
        };

        Ok(frame)
    }

    /// Write a frame to a writer (generic over any Write)
    pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
        writer.write_all(&Self::encode_frame(frame))?;
        writer.flush()?;
        Ok(())
    }

    /// Read one frame from a reader (works with any Read impl)
    pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: usize) -> Result<Frame> {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut raw)?;

        let header = Self::decode_header(&raw);
        check_length(&header, max_frame_size)?;

        let mut payload = vec![0u8; header.length];
        if header.length > 0 {
            reader.read_exact(&mut payload)?;
        }

        Self::decode_frame(&header, Bytes::from(payload))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_payload(frame: &Frame, dst: &mut BytesMut) {
    match frame {
        Frame::Data(f) => put_padded(dst, f.padding, |dst| dst.put_slice(&f.data)),
        Frame::Headers(f) => put_padded(dst, f.padding, |dst| {
            if let Some(priority) = &f.priority {
                put_priority(dst, priority);
            }
            dst.put_slice(&f.header_block);
        }),
        Frame::Priority(f) => put_priority(dst, &f.priority),
        Frame::RstStream(f) => dst.put_u32(f.error_code.as_u32()),
        Frame::Settings(f) => {
            if !f.ack {
                f.settings.encode_payload(dst);
            }
        }
        Frame::PushPromise(f) => put_padded(dst, f.padding, |dst| {
            dst.put_u32(f.promised_stream_id & STREAM_ID_MASK);
            dst.put_slice(&f.header_block);
        }),
        Frame::Ping(f) => dst.put_slice(&f.data),
        Frame::Goaway(f) => {
            dst.put_u32(f.last_stream_id & STREAM_ID_MASK);
            dst.put_u32(f.error_code.as_u32());
            dst.put_slice(&f.debug_data);
        }
        Frame::WindowUpdate(f) => dst.put_u32(f.size_increment & STREAM_ID_MASK),
        Frame::Continuation(f) => dst.put_slice(&f.header_block),
        Frame::Unknown(f) => dst.put_slice(&f.payload),
    }
}

fn put_padded(dst: &mut BytesMut, padding: Option<u8>, body: impl FnOnce(&mut BytesMut)) {
    if let Some(pad_len) = padding {
        dst.put_u8(pad_len);
    }
    body(dst);
    if let Some(pad_len) = padding {
        dst.put_bytes(0, pad_len as usize);
    }
}

fn put_priority(dst: &mut BytesMut, priority: &PrioritySpec) {
    let mut dep = priority.stream_dependency & STREAM_ID_MASK;
    if priority.exclusive {
        dep |= EXCLUSIVE_BIT;
    }
    dst.put_u32(dep);
    dst.put_u8(priority.weight);
}

fn get_priority(src: &mut Bytes) -> PrioritySpec {
    let dep = src.get_u32();
    PrioritySpec {
        stream_dependency: dep & STREAM_ID_MASK,
        exclusive: dep & EXCLUSIVE_BIT != 0,
        weight: src.get_u8(),
    }
}

/// Remove the pad length octet and trailing padding when PADDED is set
fn strip_padding(flags: FrameFlags, mut payload: Bytes) -> Result<(Bytes, Option<u8>)> {
    if !flags.is_padded() {
        return Ok((payload, None));
    }
    if payload.is_empty() {
        return Err(Error::FrameSize("PADDED frame without pad length".into()));
    }

    let pad_len = payload.get_u8();
    if pad_len as usize > payload.len() {
        return Err(Error::Protocol(format!(
            "padding of {} bytes exceeds remaining payload of {}",
            pad_len,
            payload.len()
        )));
    }
    payload.truncate(payload.len() - pad_len as usize);
    Ok((payload, Some(pad_len)))
}

fn exact_length(kind: FrameType, payload: Bytes, expected: usize) -> Result<Bytes> {
    if payload.len() != expected {
        return Err(Error::FrameSize(format!(
            "{} payload must be {} bytes, got {}",
            kind.name(),
            expected,
            payload.len()
        )));
    }
    Ok(payload)
}

fn check_length(header: &FrameHeader, max_frame_size: usize) -> Result<()> {
    if header.length > max_frame_size {
        return Err(Error::FrameSize(format!(
            "frame payload of {} bytes exceeds maximum {}",
            header.length, max_frame_size
        )));
    }
    Ok(())
}

fn invalid_stream(header: &FrameHeader, kind: FrameType) -> Error {
    Error::InvalidStreamId {
        stream_id: header.stream_id,
        frame_type: kind.name(),
    }
}

// Unknown codes carry no special meaning (RFC 7540 Section 7)
fn error_code(code: u32) -> ErrorCode {
    ErrorCode::from_u32(code).unwrap_or(ErrorCode::InternalError)
}
