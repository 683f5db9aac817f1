//! HPACK encoder
//!
//! Chooses a representation for every field of a header list, in order, and
//! keeps its dynamic table in step with what the peer's decoder will build.

use super::error::Result;
use super::representation::{NameRef, Representation};
use super::string::Huffman;
use super::table::{DynamicTable, TableMatch, DEFAULT_TABLE_SIZE};
use super::{HeaderField, Indexing};
use crate::util::HexDump;
use bytes::{Bytes, BytesMut};

/// Table size changes not yet announced to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingResize {
    smallest: usize,
    last: usize,
}

/// HPACK encoder for one connection direction
#[derive(Debug)]
pub struct Encoder {
    table: DynamicTable,
    huffman: Huffman,
    pending_resize: Option<PendingResize>,
    /// Size chosen through `resize_table`, kept across limit changes
    preferred_size: Option<usize>,
}

impl Encoder {
    /// Encoder with the protocol default table size (4096)
    pub fn new() -> Self {
        Encoder::with_table_size(DEFAULT_TABLE_SIZE)
    }

    /// Encoder whose table size and negotiated limit are `size`
    pub fn with_table_size(size: usize) -> Self {
        Encoder {
            table: DynamicTable::new(size),
            huffman: Huffman::default(),
            pending_resize: None,
            preferred_size: None,
        }
    }

    /// Set the string literal Huffman policy
    pub fn set_huffman(&mut self, huffman: Huffman) {
        self.huffman = huffman;
    }

    /// The encoder's dynamic table
    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    /// Apply the peer's SETTINGS_HEADER_TABLE_SIZE.
    ///
    /// The table grows to the new limit unless a smaller size was chosen
    /// with [`resize_table`](Encoder::resize_table), which then stays in
    /// force. The change is announced at the start of the next header block.
    pub fn set_table_size_limit(&mut self, limit: usize) {
        let size = self.preferred_size.map_or(limit, |preferred| preferred.min(limit));
        self.table.set_size_limit(limit);
        self.record_resize(size);
        // `size` is at most the limit just applied
        let _ = self.table.set_max_size(size);
    }

    /// Use a smaller table than the peer allows.
    ///
    /// The choice survives later limit changes. Fails with
    /// `DynamicTableSizeExceeded` above the negotiated limit and leaves the
    /// table untouched.
    pub fn resize_table(&mut self, size: usize) -> Result<()> {
        self.table.set_max_size(size)?;
        self.preferred_size = Some(size);
        self.record_resize(size);
        Ok(())
    }

    /// Encode a header list, appending the header block to `dst`.
    pub fn encode(&mut self, fields: &[HeaderField], dst: &mut BytesMut) {
        let start = dst.len();

        if let Some(pending) = self.pending_resize.take() {
            if pending.smallest < pending.last {
                Representation::SizeUpdate(pending.smallest).encode(dst, self.huffman);
            }
            Representation::SizeUpdate(pending.last).encode(dst, self.huffman);
        }

        for field in fields {
            self.encode_field(field, dst);
        }

        tracing::trace!(
            fields = fields.len(),
            table_size = self.table.size(),
            "encoded header block\n{}",
            HexDump(&dst[start..])
        );
    }

    /// Encode a header list into a new header block.
    pub fn encode_block(&mut self, fields: &[HeaderField]) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode(fields, &mut dst);
        dst.freeze()
    }

    /// Encode a single field, updating the table when it is indexed.
    pub fn encode_field(&mut self, field: &HeaderField, dst: &mut BytesMut) {
        let repr = self.represent(field);
        repr.encode(dst, self.huffman);

        if let Representation::Literal {
            indexing: Indexing::Incremental,
            ..
        } = repr
        {
            self.table.insert(field.name.clone(), field.value.clone());
        }
    }

    fn represent(&self, field: &HeaderField) -> Representation {
        let found = match field.indexing {
            // never referenced as a whole so the marker reaches every hop
            Indexing::NeverIndexed => self.table.find_name(&field.name).map(TableMatch::Name),
            _ => self.table.find(&field.name, &field.value),
        };

        let name = match found {
            Some(TableMatch::Field(index)) => return Representation::Indexed(index),
            Some(TableMatch::Name(index)) => NameRef::Indexed(index),
            None => NameRef::Literal(field.name.clone()),
        };

        Representation::Literal {
            name,
            value: field.value.clone(),
            indexing: field.indexing,
        }
    }

    fn record_resize(&mut self, size: usize) {
        self.pending_resize = Some(match self.pending_resize {
            Some(pending) => PendingResize {
                smallest: pending.smallest.min(size),
                last: size,
            },
            None => PendingResize {
                smallest: size,
                last: size,
            },
        });
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}
