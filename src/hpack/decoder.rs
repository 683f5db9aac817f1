//! HPACK decoder
//!
//! Decodes complete header blocks, advancing its dynamic table exactly as the
//! peer's encoder advanced its own. Any error leaves the table in an unknown
//! state relative to the peer, so the decoder refuses all later blocks.

use super::error::{HpackError, Result};
use super::representation::{NameRef, Representation};
use super::table::{DynamicTable, DEFAULT_TABLE_SIZE};
use super::{HeaderField, Indexing};
use crate::util::HexDump;

/// HPACK decoder for one connection direction
#[derive(Debug)]
pub struct Decoder {
    table: DynamicTable,
    max_header_list_size: Option<usize>,
    desynchronized: bool,
}

impl Decoder {
    /// Decoder with the protocol default table size (4096)
    pub fn new() -> Self {
        Decoder::with_table_size(DEFAULT_TABLE_SIZE)
    }

    /// Decoder whose table size and negotiated limit are `size`
    pub fn with_table_size(size: usize) -> Self {
        Decoder {
            table: DynamicTable::new(size),
            max_header_list_size: None,
            desynchronized: false,
        }
    }

    /// The decoder's dynamic table
    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    /// Apply our own acknowledged SETTINGS_HEADER_TABLE_SIZE.
    ///
    /// Size updates in later blocks may not exceed it.
    pub fn set_table_size_limit(&mut self, limit: usize) {
        self.table.set_size_limit(limit);
    }

    /// Apply our own acknowledged SETTINGS_MAX_HEADER_LIST_SIZE.
    pub fn set_max_header_list_size(&mut self, limit: Option<usize>) {
        self.max_header_list_size = limit;
    }

    /// Whether an earlier error has made the decoder unusable
    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    /// Decode one complete header block into its ordered header list.
    ///
    /// Every error is fatal for the connection.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>> {
        if self.desynchronized {
            return Err(HpackError::Desynchronized);
        }

        tracing::trace!("decoding header block\n{}", HexDump(block));
        self.decode_block(block).map_err(|err| {
            tracing::warn!(error = %err, "header block decode failed, decoder desynchronized");
            self.desynchronized = true;
            err
        })
    }

    fn decode_block(&mut self, block: &[u8]) -> Result<Vec<HeaderField>> {
        let mut fields = Vec::new();
        let mut list_size = 0usize;
        let mut pos = 0;

        while pos < block.len() {
            let (repr, used) = Representation::decode(&block[pos..])?;
            pos += used;

            let field = match repr {
                Representation::SizeUpdate(size) => {
                    if !fields.is_empty() {
                        return Err(HpackError::InvalidSizeUpdate);
                    }
                    self.table.set_max_size(size)?;
                    continue;
                }
                Representation::Indexed(index) => {
                    let (name, value) = self.table.get(index)?;
                    HeaderField {
                        name,
                        value,
                        indexing: Indexing::Incremental,
                    }
                }
                Representation::Literal {
                    name,
                    value,
                    indexing,
                } => {
                    let name = match name {
                        NameRef::Indexed(index) => self.table.get_name(index)?,
                        NameRef::Literal(raw) => raw,
                    };
                    if indexing == Indexing::Incremental {
                        self.table.insert(name.clone(), value.clone());
                    }
                    HeaderField {
                        name,
                        value,
                        indexing,
                    }
                }
            };

            list_size += field.size();
            if let Some(limit) = self.max_header_list_size {
                if list_size > limit {
                    return Err(HpackError::HeaderListTooLarge {
                        size: list_size,
                        limit,
                    });
                }
            }
            fields.push(field);
        }

        Ok(fields)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}
