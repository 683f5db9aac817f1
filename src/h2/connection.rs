//! Per-connection header compression state
//!
//! A [`ConnectionCodec`] owns the HPACK encoder for the send direction, the
//! HPACK decoder for the receive direction and the CONTINUATION assembler.
//! SETTINGS frames flowing through it adjust the tables: the peer's
//! SETTINGS bound our encoder, our own SETTINGS bound our decoder once the
//! peer acknowledges them.
//!
//! Every method takes `&mut self`, so each table sees one header block at a
//! time in connection order. Independent connections share nothing and can
//! live on different threads.

use super::error::{Error, Result};
use super::frames::{Frame, HeadersFrame, PushPromiseFrame};
use super::header_block::{
    fragment_header_block, fragment_push_promise, HeaderBlockAssembler, HeaderBlockKind, DEFAULT_MAX_HEADER_BLOCK_SIZE,
};
use super::settings::{Settings, SettingsBuilder};
use super::{CONNECTION_STREAM_ID, DEFAULT_HEADER_TABLE_SIZE, DEFAULT_MAX_FRAME_SIZE, MAX_STREAM_ID};
use crate::hpack::{Decoder, Encoder, HeaderField, HpackError, Huffman};

/// Builder for [`ConnectionCodec`]
///
/// The values describe what this endpoint is willing to receive. They are
/// announced through [`ConnectionCodec::local_settings`] and take effect on
/// the decoding side when the peer acknowledges them.
#[derive(Debug, Clone)]
pub struct ConnectionCodecBuilder {
    header_table_size: u32,
    max_frame_size: u32,
    max_header_list_size: Option<u32>,
    max_header_block_size: usize,
    huffman: bool,
}

impl ConnectionCodecBuilder {
    /// Create a builder with protocol defaults
    pub fn new() -> Self {
        ConnectionCodecBuilder {
            header_table_size: DEFAULT_HEADER_TABLE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
            max_header_block_size: DEFAULT_MAX_HEADER_BLOCK_SIZE,
            huffman: true,
        }
    }

    /// Set SETTINGS_HEADER_TABLE_SIZE to advertise
    pub fn header_table_size(mut self, size: u32) -> Self {
        self.header_table_size = size;
        self
    }

    /// Set SETTINGS_MAX_FRAME_SIZE to advertise
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set SETTINGS_MAX_HEADER_LIST_SIZE to advertise and enforce
    pub fn max_header_list_size(mut self, size: u32) -> Self {
        self.max_header_list_size = Some(size);
        self
    }

    /// Cap the bytes buffered while a header block is spread over
    /// CONTINUATION frames
    pub fn max_header_block_size(mut self, size: usize) -> Self {
        self.max_header_block_size = size;
        self
    }

    /// Huffman-code string literals when that makes them shorter
    pub fn huffman(mut self, enable: bool) -> Self {
        self.huffman = enable;
        self
    }

    /// Build the codec
    pub fn build(self) -> Result<ConnectionCodec> {
        let mut settings = SettingsBuilder::new()
            .header_table_size(self.header_table_size)
            .max_frame_size(self.max_frame_size);
        if let Some(size) = self.max_header_list_size {
            settings = settings.max_header_list_size(size);
        }
        let local_settings = settings.build()?;

        let mut encoder = Encoder::new();
        encoder.set_huffman(if self.huffman { Huffman::Shortest } else { Huffman::Never });

        Ok(ConnectionCodec {
            encoder,
            decoder: Decoder::new(),
            assembler: HeaderBlockAssembler::with_max_block_size(self.max_header_block_size),
            max_header_block_size: self.max_header_block_size,
            local_settings,
            local_max_frame_size: DEFAULT_MAX_FRAME_SIZE as usize,
            remote_max_frame_size: DEFAULT_MAX_FRAME_SIZE as usize,
            poisoned: false,
        })
    }
}

impl Default for ConnectionCodecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Header list received on a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeaders {
    /// Stream the header block arrived on
    pub stream_id: u32,
    /// HEADERS or PUSH_PROMISE, with their frame-level fields
    pub kind: HeaderBlockKind,
    /// Decoded header list in wire order
    pub fields: Vec<HeaderField>,
}

impl DecodedHeaders {
    /// Whether the HEADERS frame closed the stream
    pub fn end_stream(&self) -> bool {
        matches!(self.kind, HeaderBlockKind::Headers { end_stream: true, .. })
    }

    /// Stream reserved by a PUSH_PROMISE
    pub fn promised_stream_id(&self) -> Option<u32> {
        match self.kind {
            HeaderBlockKind::PushPromise { promised_stream_id } => Some(promised_stream_id),
            HeaderBlockKind::Headers { .. } => None,
        }
    }
}

/// HPACK encoder/decoder pair of one HTTP/2 connection
#[derive(Debug)]
pub struct ConnectionCodec {
    encoder: Encoder,
    decoder: Decoder,
    assembler: HeaderBlockAssembler,
    max_header_block_size: usize,
    local_settings: Settings,
    local_max_frame_size: usize,
    remote_max_frame_size: usize,
    poisoned: bool,
}

impl ConnectionCodec {
    /// Codec with protocol defaults
    pub fn new() -> Self {
        ConnectionCodec {
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            assembler: HeaderBlockAssembler::new(),
            max_header_block_size: DEFAULT_MAX_HEADER_BLOCK_SIZE,
            local_settings: Settings::new(),
            local_max_frame_size: DEFAULT_MAX_FRAME_SIZE as usize,
            remote_max_frame_size: DEFAULT_MAX_FRAME_SIZE as usize,
            poisoned: false,
        }
    }

    /// SETTINGS this endpoint should send to its peer
    pub fn local_settings(&self) -> &Settings {
        &self.local_settings
    }

    /// Largest frame payload the peer accepts
    pub fn remote_max_frame_size(&self) -> usize {
        self.remote_max_frame_size
    }

    /// Largest frame payload we have told the peer we accept (once acknowledged)
    pub fn local_max_frame_size(&self) -> usize {
        self.local_max_frame_size
    }

    /// Send-direction HPACK encoder
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Receive-direction HPACK decoder
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Whether a fatal error has ended this connection's header processing
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Apply SETTINGS received from the peer.
    ///
    /// The peer's header table size bounds our encoder; the size change is
    /// signalled at the start of the next header block we send.
    pub fn apply_remote_settings(&mut self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        if let Some(size) = settings.header_table_size {
            tracing::debug!(size, "peer header table size");
            self.encoder.set_table_size_limit(size as usize);
        }
        if let Some(size) = settings.max_frame_size {
            tracing::debug!(size, "peer max frame size");
            self.remote_max_frame_size = size as usize;
        }
        Ok(())
    }

    /// Apply our own SETTINGS after the peer acknowledged them.
    ///
    /// An acknowledged header list limit also tightens the reassembly cap
    /// for CONTINUATION frames.
    pub fn apply_local_settings(&mut self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        if let Some(size) = settings.header_table_size {
            tracing::debug!(size, "local header table size acknowledged");
            self.decoder.set_table_size_limit(size as usize);
        }
        if let Some(size) = settings.max_frame_size {
            self.local_max_frame_size = size as usize;
        }
        if let Some(size) = settings.get_max_header_list_size() {
            let size = size as usize;
            self.decoder.set_max_header_list_size(Some(size));
            self.assembler
                .set_max_block_size(self.max_header_block_size.min(block_size_bound(size)));
        }
        Ok(())
    }

    /// Encode a header list as HEADERS plus any CONTINUATION frames.
    pub fn encode_headers(&mut self, stream_id: u32, fields: &[HeaderField], end_stream: bool) -> Result<Vec<Frame>> {
        self.check_usable()?;
        check_stream_id(stream_id, "HEADERS")?;

        let block = self.encoder.encode_block(fields);
        let headers = HeadersFrame::new(stream_id, block, end_stream, true);
        let frames = fragment_header_block(headers, self.remote_max_frame_size);
        self.poison_on_error(frames)
    }

    /// Encode a promised request as PUSH_PROMISE plus any CONTINUATION frames.
    pub fn encode_push_promise(
        &mut self,
        stream_id: u32,
        promised_stream_id: u32,
        fields: &[HeaderField],
    ) -> Result<Vec<Frame>> {
        self.check_usable()?;
        check_stream_id(stream_id, "PUSH_PROMISE")?;
        check_stream_id(promised_stream_id, "PUSH_PROMISE")?;

        let block = self.encoder.encode_block(fields);
        let promise = PushPromiseFrame::new(stream_id, promised_stream_id, block, true);
        let frames = fragment_push_promise(promise, self.remote_max_frame_size);
        self.poison_on_error(frames)
    }

    /// Process one received frame in connection order.
    ///
    /// Returns the decoded header list when the frame completes a header
    /// block. SETTINGS frames are applied here; answering them with an ACK is
    /// left to the caller. Any error is a connection error and poisons the
    /// codec.
    pub fn receive_frame(&mut self, frame: &Frame) -> Result<Option<DecodedHeaders>> {
        self.check_usable()?;

        let block = match self.assembler.push(frame) {
            Ok(block) => block,
            Err(err) => return self.poison_on_error(Err(err)),
        };

        if let Frame::Settings(settings) = frame {
            let applied = if settings.ack {
                let local = self.local_settings.clone();
                self.apply_local_settings(&local)
            } else {
                self.apply_remote_settings(&settings.settings)
            };
            self.poison_on_error(applied)?;
        }

        let block = match block {
            Some(block) => block,
            None => return Ok(None),
        };

        let fields = self.decoder.decode(&block.block).map_err(Error::from);
        let fields = self.poison_on_error(fields)?;

        tracing::trace!(stream_id = block.stream_id, fields = fields.len(), "header block decoded");
        Ok(Some(DecodedHeaders {
            stream_id: block.stream_id,
            kind: block.kind,
            fields,
        }))
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::Compression(HpackError::Desynchronized));
        }
        Ok(())
    }

    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            tracing::warn!(error = %err, code = %err.code(), "connection header state poisoned");
            self.poisoned = true;
        }
        result
    }
}

impl Default for ConnectionCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest encoded block that can decode to a list within `list_size`.
///
/// Every field counts at least 32 bytes against the list and a Huffman code
/// is at most 30 bits per octet, so no valid block exceeds four times the
/// list size plus room for table size updates.
fn block_size_bound(list_size: usize) -> usize {
    list_size.saturating_mul(4).saturating_add(64)
}

fn check_stream_id(stream_id: u32, frame_type: &'static str) -> Result<()> {
    if stream_id == CONNECTION_STREAM_ID || stream_id > MAX_STREAM_ID {
        return Err(Error::InvalidStreamId { stream_id, frame_type });
    }
    Ok(())
}
