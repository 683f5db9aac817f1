//! HPACK error types
//!
//! Every error produced while decoding a header block is fatal for the
//! connection: the decoder's dynamic table may no longer match the peer's
//! encoder, so no later block can be trusted. Encode-side argument errors only
//! reject the single call.

/// HPACK errors (RFC 7541)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HpackError {
    /// Bad argument to an encode call (negative integer, bad prefix width)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Decoded integer exceeds the implementation ceiling
    #[error("Integer overflow")]
    IntegerOverflow,

    /// Index 0 or beyond the static + dynamic address space
    #[error("Index out of range: {0}")]
    IndexOutOfRange(usize),

    /// Invalid Huffman code, EOS in the stream, or bad padding
    #[error("Huffman decode error")]
    HuffmanDecodeError,

    /// Header block ended in the middle of a representation
    #[error("Truncated input")]
    TruncatedInput,

    /// Table size update above the negotiated bound
    #[error("Dynamic table size {requested} exceeds limit {limit}")]
    DynamicTableSizeExceeded {
        /// Size that was asked for
        requested: usize,
        /// Bound negotiated through SETTINGS_HEADER_TABLE_SIZE
        limit: usize,
    },

    /// Dynamic table size update after the first field of a block
    #[error("Dynamic table size update not at start of header block")]
    InvalidSizeUpdate,

    /// Decoded header list exceeds SETTINGS_MAX_HEADER_LIST_SIZE
    #[error("Header list size {size} exceeds limit {limit}")]
    HeaderListTooLarge {
        /// Accumulated list size so far
        size: usize,
        /// Advertised limit
        limit: usize,
    },

    /// A previous decode error left the table out of sync with the peer
    #[error("Decoder desynchronized by an earlier error")]
    Desynchronized,
}

impl HpackError {
    /// Whether this error must tear down the connection.
    ///
    /// `InvalidArgument` is the only error an encoder caller can recover from.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HpackError::InvalidArgument(_))
    }
}

/// Result type for HPACK operations
pub type Result<T> = std::result::Result<T, HpackError>;
