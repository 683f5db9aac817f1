//! HPACK header compression (RFC 7541)
//!
//! The encoder and decoder each own one dynamic table. A connection holds one
//! of each: the encoder's table mirrors what it has told the peer, the
//! decoder's table mirrors what the peer's encoder has told it. Header blocks
//! must pass through them in exactly the order they are sent or received.
//!
//! # Examples
//!
//! ```
//! use h2pack::hpack::{Decoder, Encoder, HeaderField};
//!
//! let mut encoder = Encoder::new();
//! let mut decoder = Decoder::new();
//!
//! let headers = vec![
//!     HeaderField::new(":method", "GET"),
//!     HeaderField::new(":path", "/"),
//!     HeaderField::never_indexed("authorization", "secret"),
//! ];
//!
//! let block = encoder.encode_block(&headers);
//! let decoded = decoder.decode(&block).unwrap();
//! assert_eq!(decoded, headers);
//! ```

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod huffman;
pub mod integer;
pub mod representation;
pub mod string;
pub mod table;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{HpackError, Result};
pub use representation::{NameRef, Representation};
pub use string::Huffman;
pub use table::{DynamicTable, StaticTable, TableMatch, DEFAULT_TABLE_SIZE};

use bytes::Bytes;
use std::fmt;

/// How a literal field may be stored by the tables along its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Indexing {
    /// Added to the dynamic table (RFC 7541 Section 6.2.1)
    #[default]
    Incremental,
    /// Not added here, intermediaries may choose (Section 6.2.2)
    WithoutIndexing,
    /// Must never be added to any table on any hop (Section 6.2.3)
    NeverIndexed,
}

/// One header field of an ordered header list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderField {
    /// Field name, opaque octets
    pub name: Bytes,
    /// Field value, opaque octets
    pub value: Bytes,
    /// Indexing policy to request (encode) or that was received (decode)
    pub indexing: Indexing,
}

impl HeaderField {
    /// Field the encoder may add to its dynamic table
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        HeaderField {
            name: name.into(),
            value: value.into(),
            indexing: Indexing::Incremental,
        }
    }

    /// Field sent as a literal without indexing
    pub fn not_indexed(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        HeaderField::new(name, value).with_indexing(Indexing::WithoutIndexing)
    }

    /// Sensitive field that no table may ever store
    pub fn never_indexed(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        HeaderField::new(name, value).with_indexing(Indexing::NeverIndexed)
    }

    /// Replace the indexing policy
    pub fn with_indexing(mut self, indexing: Indexing) -> Self {
        self.indexing = indexing;
        self
    }

    /// Whether the field carries the never-indexed marker
    pub fn is_sensitive(&self) -> bool {
        self.indexing == Indexing::NeverIndexed
    }

    /// Size as counted by tables and header list limits
    pub fn size(&self) -> usize {
        table::entry_size(&self.name, &self.value)
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_field_constructors() {
        let field = HeaderField::new("content-type", "text/html");
        assert_eq!(field.indexing, Indexing::Incremental);
        assert_eq!(field.size(), 12 + 9 + 32);
        assert!(!field.is_sensitive());

        assert_eq!(HeaderField::not_indexed("a", "b").indexing, Indexing::WithoutIndexing);
        assert!(HeaderField::never_indexed("cookie", "id=1").is_sensitive());
    }

    #[test]
    fn test_header_field_display() {
        let field = HeaderField::new(":path", "/index.html");
        assert_eq!(field.to_string(), ":path: /index.html");
    }
}
