//! Position data retrieval.
//!
//! The positions file is a concatenation of gamma-coded position blobs.
//! The full index's per-term metadata column addresses them with a
//! packed *position word*: blob length in the top 8 bits, byte offset in
//! the low 56. A zero word means "no position data".
//!
//! Batch reads land in a [`QueryArena`]: one contiguous buffer per
//! request, handed out as borrowed [`TermData`] slices and freed in a
//! single bulk operation when the request completes. High-QPS query
//! paths allocate nothing per term or document.

use std::fs::File;
use std::path::Path;

use log::warn;

use crate::error::{CrocusError, Result};
use crate::index::files::{POSITIONS_MAGIC, read_exact_at, validate_file_footer};
use crate::sequence::gamma::GammaCodedSequence;

/// Number of bits of a position word holding the blob length.
const SIZE_BITS: u32 = 8;
const OFFSET_MASK: u64 = (1 << (64 - SIZE_BITS)) - 1;

/// Largest encodable position blob, in bytes.
pub const MAX_BLOB_LEN: usize = (1 << SIZE_BITS) - 1;

/// Pack a blob length and byte offset into a position word.
pub fn encode_position_word(len: usize, offset: u64) -> Result<u64> {
    if len > MAX_BLOB_LEN {
        return Err(CrocusError::invalid_argument(format!(
            "position blob of {len} bytes exceeds the {MAX_BLOB_LEN} byte cap"
        )));
    }
    if offset > OFFSET_MASK {
        return Err(CrocusError::invalid_argument("position offset too large"));
    }
    Ok((len as u64) << (64 - SIZE_BITS) | offset)
}

/// Blob length of a position word.
pub fn decode_size(word: u64) -> usize {
    (word >> (64 - SIZE_BITS)) as usize
}

/// Byte offset of a position word.
pub fn decode_offset(word: u64) -> u64 {
    word & OFFSET_MASK
}

/// Request-scoped buffer backing one batch of term data.
///
/// Reusable: `reset` discards the previous batch in bulk without
/// releasing the allocation.
#[derive(Debug, Default)]
pub struct QueryArena {
    buf: Vec<u8>,
}

impl QueryArena {
    pub fn new() -> Self {
        QueryArena::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        QueryArena {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Drop everything the arena holds, keeping its allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Position data for one (term, document) pair, borrowed from the arena
/// that backed the batch read.
#[derive(Debug, Clone, Copy)]
pub struct TermData<'arena> {
    raw: &'arena [u8],
}

impl<'arena> TermData<'arena> {
    /// The raw encoded blob.
    pub fn bytes(&self) -> &'arena [u8] {
        self.raw
    }

    /// The decoded position sequence view.
    pub fn positions(&self) -> GammaCodedSequence<'arena> {
        GammaCodedSequence::from_bytes(self.raw)
    }
}

/// One slot per requested document; `None` where the document has no
/// position data or its read failed.
pub type TermDataList<'arena> = Vec<Option<TermData<'arena>>>;

/// Reader over the positions file.
///
/// Blobs are fetched with positioned reads rather than through a map:
/// position data is touched for a small filtered candidate set, not
/// scanned, and the batch read clusters the accesses.
#[derive(Debug)]
pub struct PositionsFileReader {
    file: File,
    payload_len: u64,
}

impl PositionsFileReader {
    /// Open a positions file and validate its footer.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let payload_len = validate_file_footer(&file, POSITIONS_MAGIC)?;
        Ok(PositionsFileReader { file, payload_len })
    }

    /// Materialize the blobs addressed by `words` into the arena.
    ///
    /// Zero words produce `None` slots. A failed blob read is logged and
    /// leaves its slot absent; the rest of the batch still completes.
    pub fn get_term_data<'arena>(
        &self,
        arena: &'arena mut QueryArena,
        words: &[u64],
    ) -> TermDataList<'arena> {
        let mut spans: Vec<Option<(usize, usize)>> = Vec::with_capacity(words.len());

        for &word in words {
            if word == 0 {
                spans.push(None);
                continue;
            }

            let len = decode_size(word);
            let offset = decode_offset(word);
            if offset + len as u64 > self.payload_len {
                warn!("position word {word:#x} points outside the positions file");
                spans.push(None);
                continue;
            }

            let start = arena.buf.len();
            arena.buf.resize(start + len, 0);
            match read_exact_at(&self.file, &mut arena.buf[start..start + len], offset) {
                Ok(()) => spans.push(Some((start, len))),
                Err(e) => {
                    warn!("position data read failed at offset {offset}: {e}");
                    arena.buf.truncate(start);
                    spans.push(None);
                }
            }
        }

        let buf: &'arena [u8] = &arena.buf;
        spans
            .into_iter()
            .map(|span| span.map(|(start, len)| TermData {
                raw: &buf[start..start + len],
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::files::append_footer;
    use crate::sequence::CodedSequence;

    #[test]
    fn test_position_word_round_trip() {
        let word = encode_position_word(200, 123_456_789).unwrap();
        assert_eq!(decode_size(word), 200);
        assert_eq!(decode_offset(word), 123_456_789);

        assert!(encode_position_word(MAX_BLOB_LEN + 1, 0).is_err());
        assert!(encode_position_word(0, u64::MAX).is_err());
    }

    #[test]
    fn test_batch_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.dat");

        let first = GammaCodedSequence::generate(&[1, 5, 9]).unwrap();
        let second = GammaCodedSequence::generate(&[2, 4, 100, 200]).unwrap();

        let mut payload = Vec::new();
        let first_word = {
            let offset = payload.len() as u64;
            payload.extend_from_slice(first.bytes());
            encode_position_word(first.bytes().len(), offset).unwrap()
        };
        let second_word = {
            let offset = payload.len() as u64;
            payload.extend_from_slice(second.bytes());
            encode_position_word(second.bytes().len(), offset).unwrap()
        };
        append_footer(&mut payload, POSITIONS_MAGIC);
        std::fs::write(&path, &payload).unwrap();

        let reader = PositionsFileReader::open(&path).unwrap();
        let mut arena = QueryArena::new();

        let batch = reader.get_term_data(&mut arena, &[first_word, 0, second_word]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].unwrap().positions().values(), vec![1, 5, 9]);
        assert!(batch[1].is_none());
        assert_eq!(batch[2].unwrap().positions().values(), vec![2, 4, 100, 200]);
    }

    #[test]
    fn test_out_of_range_word_is_absent_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.dat");

        let mut payload = b"xyz".to_vec();
        append_footer(&mut payload, POSITIONS_MAGIC);
        std::fs::write(&path, &payload).unwrap();

        let reader = PositionsFileReader::open(&path).unwrap();
        let mut arena = QueryArena::new();

        let bogus = encode_position_word(100, 1 << 40).unwrap();
        let batch = reader.get_term_data(&mut arena, &[bogus]);
        assert!(batch[0].is_none());
    }

    #[test]
    fn test_arena_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.dat");

        let seq = GammaCodedSequence::generate(&[3, 6]).unwrap();
        let mut payload = seq.bytes().to_vec();
        let word = encode_position_word(seq.bytes().len(), 0).unwrap();
        append_footer(&mut payload, POSITIONS_MAGIC);
        std::fs::write(&path, &payload).unwrap();

        let reader = PositionsFileReader::open(&path).unwrap();
        let mut arena = QueryArena::new();

        {
            let batch = reader.get_term_data(&mut arena, &[word]);
            assert_eq!(batch[0].unwrap().positions().values(), vec![3, 6]);
        }

        arena.reset();
        assert!(arena.is_empty());

        let batch = reader.get_term_data(&mut arena, &[word, word]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].unwrap().positions().values(), vec![3, 6]);
    }
}
