//! Header tables (RFC 7541 Section 2.3)
//!
//! Static and dynamic tables share one index space:
//!
//! ```text
//! <----------  Index Address Space ---------->
//! <-- Static  Table -->  <-- Dynamic Table -->
//! +---+-----------+---+  +---+-----------+---+
//! | 1 |    ...    | s |  |s+1|    ...    |s+k|
//! +---+-----------+---+  +---+-----------+---+
//!                        ^                   |
//!                        |                   V
//!                 Insertion Point      Dropping Point
//! ```

use super::error::{HpackError, Result};
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};

/// Number of static table entries
pub const STATIC_TABLE_LEN: usize = 61;

/// Per-entry overhead counted against the table size
pub const ENTRY_OVERHEAD: usize = 32;

/// SETTINGS_HEADER_TABLE_SIZE initial value
pub const DEFAULT_TABLE_SIZE: usize = 4096;

/// RFC 7541 Appendix A
static STATIC_ENTRIES: [(&str, &str); STATIC_TABLE_LEN] = [
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

/// Result of a table search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMatch {
    /// Both name and value match the entry at this index
    Field(usize),
    /// Only the name matches
    Name(usize),
}

impl TableMatch {
    /// Combined index of the match
    pub fn index(&self) -> usize {
        match *self {
            TableMatch::Field(i) | TableMatch::Name(i) => i,
        }
    }
}

/// The static table, shared read-only by every connection
pub struct StaticTable;

impl StaticTable {
    /// Entry at 1-based `index`.
    pub fn get(index: usize) -> Option<(&'static str, &'static str)> {
        index
            .checked_sub(1)
            .and_then(|i| STATIC_ENTRIES.get(i))
            .copied()
    }

    /// Lowest index holding `name`.
    pub fn find_name(name: &[u8]) -> Option<usize> {
        STATIC_ENTRIES
            .iter()
            .position(|(n, _)| n.as_bytes() == name)
            .map(|i| i + 1)
    }

    /// Lowest index holding exactly `(name, value)`.
    pub fn find_field(name: &[u8], value: &[u8]) -> Option<usize> {
        STATIC_ENTRIES
            .iter()
            .position(|(n, v)| n.as_bytes() == name && v.as_bytes() == value)
            .map(|i| i + 1)
    }

    /// Best match: exact field first, else lowest name-only index.
    pub fn find(name: &[u8], value: &[u8]) -> Option<TableMatch> {
        let mut name_match = None;
        for (i, (n, v)) in STATIC_ENTRIES.iter().enumerate() {
            if n.as_bytes() != name {
                continue;
            }
            if v.as_bytes() == value {
                return Some(TableMatch::Field(i + 1));
            }
            name_match.get_or_insert(TableMatch::Name(i + 1));
        }
        name_match
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: Bytes,
    value: Bytes,
    /// Insertion sequence number; newer entries have larger numbers
    seq: u64,
}

impl Entry {
    fn size(&self) -> usize {
        entry_size(&self.name, &self.value)
    }
}

/// Size an entry occupies in a dynamic table.
pub fn entry_size(name: &[u8], value: &[u8]) -> usize {
    name.len() + value.len() + ENTRY_OVERHEAD
}

/// Newest sequence numbers recorded for one header name
#[derive(Debug, Default)]
struct NameSlot {
    latest: u64,
    values: HashMap<Bytes, u64>,
}

/// Bounded FIFO table of recently coded fields
///
/// The newest entry has dynamic index 1 (combined index 62). Lookups go
/// through a hash index keyed by name and by value within a name; each key
/// maps to the insertion sequence number of its newest entry, from which the
/// recency position follows directly.
#[derive(Debug)]
pub struct DynamicTable {
    /// Front is newest
    entries: VecDeque<Entry>,
    names: HashMap<Bytes, NameSlot>,
    next_seq: u64,
    size: usize,
    max_size: usize,
    /// Bound negotiated through SETTINGS_HEADER_TABLE_SIZE
    size_limit: usize,
}

impl DynamicTable {
    /// Create an empty table whose size and limit are both `max_size`.
    pub fn new(max_size: usize) -> Self {
        DynamicTable {
            entries: VecDeque::new(),
            names: HashMap::new(),
            next_seq: 0,
            size: 0,
            max_size,
            size_limit: max_size,
        }
    }

    /// Sum of entry sizes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Currently applied maximum size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Upper bound for `max_size`
    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Number of dynamic entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dynamic part is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dynamic entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.entries.iter().map(|e| (&e.name, &e.value))
    }

    /// Whether any dynamic entry holds exactly `(name, value)`.
    pub fn contains(&self, name: &[u8], value: &[u8]) -> bool {
        self.names
            .get(name)
            .map_or(false, |slot| slot.values.contains_key(value))
    }

    /// Insert a field as the newest entry, evicting from the old end.
    ///
    /// An entry larger than `max_size` empties the table and is dropped.
    /// Returns whether the entry was stored.
    pub fn insert(&mut self, name: Bytes, value: Bytes) -> bool {
        let size = entry_size(&name, &value);

        while self.size + size > self.max_size && !self.entries.is_empty() {
            self.evict_oldest();
        }

        if size > self.max_size {
            tracing::debug!(size, max_size = self.max_size, "entry larger than dynamic table, not inserted");
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let slot = self.names.entry(name.clone()).or_default();
        slot.latest = seq;
        slot.values.insert(value.clone(), seq);

        self.entries.push_front(Entry { name, value, seq });
        self.size += size;
        true
    }

    /// Field at a combined index.
    pub fn get(&self, index: usize) -> Result<(Bytes, Bytes)> {
        if index == 0 {
            return Err(HpackError::IndexOutOfRange(index));
        }
        if let Some((name, value)) = StaticTable::get(index) {
            return Ok((Bytes::from_static(name.as_bytes()), Bytes::from_static(value.as_bytes())));
        }
        self.entries
            .get(index - STATIC_TABLE_LEN - 1)
            .map(|e| (e.name.clone(), e.value.clone()))
            .ok_or(HpackError::IndexOutOfRange(index))
    }

    /// Name at a combined index.
    pub fn get_name(&self, index: usize) -> Result<Bytes> {
        self.get(index).map(|(name, _)| name)
    }

    /// Lowest combined index matching the field.
    ///
    /// An exact match anywhere beats a name-only match; within a kind the
    /// static table wins, then the most recent dynamic entry.
    pub fn find(&self, name: &[u8], value: &[u8]) -> Option<TableMatch> {
        let static_match = StaticTable::find(name, value);
        if let Some(m @ TableMatch::Field(_)) = static_match {
            return Some(m);
        }

        let slot = self.names.get(name);
        if let Some(seq) = slot.and_then(|s| s.values.get(value)) {
            return Some(TableMatch::Field(self.combined_index(*seq)));
        }

        static_match.or_else(|| slot.map(|s| TableMatch::Name(self.combined_index(s.latest))))
    }

    /// Lowest combined index holding `name`.
    pub fn find_name(&self, name: &[u8]) -> Option<usize> {
        StaticTable::find_name(name)
            .or_else(|| self.names.get(name).map(|s| self.combined_index(s.latest)))
    }

    /// Apply a new maximum size, evicting until the table fits.
    ///
    /// Sizes above the negotiated limit are rejected.
    pub fn set_max_size(&mut self, max_size: usize) -> Result<()> {
        if max_size > self.size_limit {
            return Err(HpackError::DynamicTableSizeExceeded {
                requested: max_size,
                limit: self.size_limit,
            });
        }

        self.resize(max_size);
        Ok(())
    }

    /// Apply a newly negotiated limit, shrinking the table if it is above it.
    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = limit;
        if self.max_size > limit {
            self.resize(limit);
        }
    }

    fn resize(&mut self, max_size: usize) {
        tracing::debug!(from = self.max_size, to = max_size, "dynamic table resized");
        self.max_size = max_size;
        while self.size > self.max_size {
            self.evict_oldest();
        }
    }

    fn combined_index(&self, seq: u64) -> usize {
        let newest = self.next_seq - 1;
        STATIC_TABLE_LEN + 1 + (newest - seq) as usize
    }

    fn evict_oldest(&mut self) {
        let Some(entry) = self.entries.pop_back() else {
            return;
        };
        self.size -= entry.size();

        if let Some(slot) = self.names.get_mut(&entry.name[..]) {
            if slot.values.get(&entry.value[..]) == Some(&entry.seq) {
                slot.values.remove(&entry.value[..]);
            }
            // the newest entry with this name was also the oldest in the table
            if slot.latest == entry.seq {
                self.names.remove(&entry.name[..]);
            }
        }

        tracing::trace!(
            name = %String::from_utf8_lossy(&entry.name),
            size = self.size,
            "evicted dynamic table entry"
        );
    }
}

impl Default for DynamicTable {
    fn default() -> Self {
        DynamicTable::new(DEFAULT_TABLE_SIZE)
    }
}
