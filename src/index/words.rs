//! Word table: ordered term id to postings offset lookup.
//!
//! The table is a memory-mapped array of `(term_id, offset)` pairs
//! sorted by term id, preceded by an entry count:
//! `[count: u64][term_id: u64, offset: u64] × count`. Lookups are a
//! plain binary search, O(log n) with no allocation.

use std::path::Path;

use crate::error::{CrocusError, Result};
use crate::index::files::{MappedFile, WORDS_MAGIC};

/// Memory-mapped term lookup table.
#[derive(Debug)]
pub struct WordIndex {
    map: MappedFile,
    len: usize,
}

impl WordIndex {
    /// Map a word table file and validate its shape.
    pub fn open(path: &Path) -> Result<Self> {
        let map = MappedFile::open(path, WORDS_MAGIC)?;

        if map.payload().len() < 8 {
            return Err(CrocusError::corrupt("word table missing header"));
        }
        let len = map.get_u64(0) as usize;
        if map.payload().len() != 8 + len * 16 {
            return Err(CrocusError::corrupt("word table size mismatch"));
        }

        Ok(WordIndex { map, len })
    }

    /// Number of terms in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn term_at(&self, idx: usize) -> u64 {
        self.map.get_u64(1 + idx * 2)
    }

    fn offset_at(&self, idx: usize) -> u64 {
        self.map.get_u64(2 + idx * 2)
    }

    /// Byte offset of the term's block in the documents file, or -1 if
    /// the term is not present.
    pub fn word_offset(&self, term_id: u64) -> i64 {
        let mut lo = 0usize;
        let mut hi = self.len;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.term_at(mid);
            if entry < term_id {
                lo = mid + 1;
            } else if entry > term_id {
                hi = mid;
            } else {
                return self.offset_at(mid) as i64;
            }
        }
        -1
    }
}
