//! The full reverse index: sorted posting blocks with position metadata.
//!
//! Each term's block in the documents file holds its document ids as a
//! sorted array plus a parallel metadata column of position words:
//! `[count: u64][doc_id: u64 × count][position word: u64 × count]`,
//! little endian, addressed by byte offset from the word table.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, warn};

use crate::error::{CrocusError, Result};
use crate::index::files::{DOCS_FULL_MAGIC, MappedFile};
use crate::index::filter::{FilterStep, RejectFilter, RetainFilter};
use crate::index::positions::{PositionsFileReader, QueryArena, TermDataList};
use crate::index::source::EntrySource;
use crate::index::words::WordIndex;

/// A zero-copy view over one term's block in the documents file.
#[derive(Clone, Copy)]
pub struct PostingBlock<'a> {
    ids: &'a [u8],
    values: &'a [u8],
    count: usize,
}

impl<'a> PostingBlock<'a> {
    pub(crate) fn parse(payload: &'a [u8], offset: usize) -> Result<Self> {
        if payload.len() < 8 || offset > payload.len() - 8 {
            return Err(CrocusError::corrupt("posting block offset out of range"));
        }
        let count = LittleEndian::read_u64(&payload[offset..offset + 8]) as usize;

        let ids_start = offset + 8;
        let body_len = count
            .checked_mul(16)
            .ok_or_else(|| CrocusError::corrupt("posting block count out of range"))?;
        if payload.len() - ids_start < body_len {
            return Err(CrocusError::corrupt("posting block extends past file end"));
        }
        let values_start = ids_start + count * 8;
        let end = values_start + count * 8;

        Ok(PostingBlock {
            ids: &payload[ids_start..values_start],
            values: &payload[values_start..end],
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The document id at position `idx`.
    pub fn doc(&self, idx: usize) -> u64 {
        LittleEndian::read_u64(&self.ids[idx * 8..idx * 8 + 8])
    }

    /// The metadata word paired with the document at `idx`.
    pub fn value(&self, idx: usize) -> u64 {
        LittleEndian::read_u64(&self.values[idx * 8..idx * 8 + 8])
    }

    /// First position at or after `from` whose document id is >= `doc`.
    ///
    /// Gallops forward then binary-searches the bracketed range, so
    /// walking an ascending candidate list costs O(log gap) per step.
    pub(crate) fn seek(&self, from: usize, doc: u64) -> usize {
        let mut lo = from;
        if lo >= self.count || self.doc(lo) >= doc {
            return lo;
        }

        let mut step = 1;
        let mut hi = lo + 1;
        while hi < self.count && self.doc(hi) < doc {
            lo = hi;
            step *= 2;
            hi = (hi + step).min(self.count);
        }

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.doc(mid) < doc {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Whether the block contains the document id.
    pub fn contains(&self, doc_id: u64) -> bool {
        let idx = self.seek(0, doc_id);
        idx < self.count && self.doc(idx) == doc_id
    }

    /// Metadata words for each of the given ids, zero where absent.
    pub fn values_for(&self, doc_ids: &[u64]) -> Vec<u64> {
        let mut out = Vec::with_capacity(doc_ids.len());
        let mut cursor = 0;
        let mut prev = 0u64;

        for &doc_id in doc_ids {
            // Restart the cursor if the batch is not sorted.
            if doc_id < prev {
                cursor = 0;
            }
            prev = doc_id;

            cursor = self.seek(cursor, doc_id);
            if cursor < self.count && self.doc(cursor) == doc_id {
                out.push(self.value(cursor));
            } else {
                out.push(0);
            }
        }
        out
    }
}

struct ReadyFull {
    words: WordIndex,
    documents: MappedFile,
    positions: Option<PositionsFileReader>,
}

enum FullState {
    Ready(ReadyFull),
    NotReady,
    Closed,
}

/// Reader over the full reverse index.
///
/// Backed by immutable memory-mapped files; any number of threads may
/// query one reader concurrently. A reader whose backing files are
/// missing or fail validation is *not ready*: it stays constructible and
/// answers every query with empty results.
pub struct FullReverseIndexReader {
    name: String,
    state: FullState,
}

impl FullReverseIndexReader {
    /// Open a full index from its words, documents and positions files.
    pub fn new(
        name: &str,
        words_path: &Path,
        docs_path: &Path,
        positions_path: &Path,
    ) -> Result<Self> {
        if !words_path.exists() || !docs_path.exists() {
            return Ok(FullReverseIndexReader {
                name: name.to_string(),
                state: FullState::NotReady,
            });
        }

        let words = match WordIndex::open(words_path) {
            Ok(words) => words,
            Err(CrocusError::Corrupt(msg)) => {
                log::error!("failed to validate {}: {msg}", words_path.display());
                return Ok(FullReverseIndexReader {
                    name: name.to_string(),
                    state: FullState::NotReady,
                });
            }
            Err(e) => return Err(e),
        };

        let documents = match MappedFile::open(docs_path, DOCS_FULL_MAGIC) {
            Ok(documents) => documents,
            Err(CrocusError::Corrupt(msg)) => {
                log::error!("failed to validate {}: {msg}", docs_path.display());
                return Ok(FullReverseIndexReader {
                    name: name.to_string(),
                    state: FullState::NotReady,
                });
            }
            Err(e) => return Err(e),
        };

        let positions = if positions_path.exists() {
            match PositionsFileReader::open(positions_path) {
                Ok(positions) => Some(positions),
                Err(CrocusError::Corrupt(msg)) => {
                    log::error!("failed to validate {}: {msg}", positions_path.display());
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!("no positions file at {}", positions_path.display());
            None
        };

        info!("Switching reverse index {name}");

        Ok(FullReverseIndexReader {
            name: name.to_string(),
            state: FullState::Ready(ReadyFull {
                words,
                documents,
                positions,
            }),
        })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, FullState::Ready(_))
    }

    /// Byte offset of the term's block in the documents file, or -1 if
    /// the term is absent.
    pub fn word_offset(&self, term_id: u64) -> i64 {
        match &self.state {
            FullState::Ready(ready) => ready.words.word_offset(term_id),
            _ => -1,
        }
    }

    fn block(&self, term_id: u64) -> Option<PostingBlock<'_>> {
        let FullState::Ready(ready) = &self.state else {
            return None;
        };

        let offset = ready.words.word_offset(term_id);
        if offset < 0 {
            return None;
        }

        match PostingBlock::parse(ready.documents.payload(), offset as usize) {
            Ok(block) => Some(block),
            Err(e) => {
                warn!("bad posting block for term {term_id}: {e}");
                None
            }
        }
    }

    /// Stream the term's documents in ascending id order.
    pub fn documents(&self, term_id: u64) -> EntrySource<'_> {
        if !self.is_ready() {
            warn!("Reverse index {} is not ready, dropping query", self.name);
            return EntrySource::empty("full");
        }

        match self.block(term_id) {
            Some(block) => EntrySource::full(&self.name, block),
            None => EntrySource::empty("full"),
        }
    }

    /// A filter step requiring the term to contain the candidate.
    ///
    /// An absent term rejects everything: an AND against a term with no
    /// postings can never match.
    pub fn also(&self, term_id: u64) -> FilterStep<'_> {
        match self.block(term_id) {
            Some(block) => FilterStep::Retain(RetainFilter {
                block,
                index_name: &self.name,
                term_id,
            }),
            None => FilterStep::NoPass,
        }
    }

    /// A filter step requiring the term to not contain the candidate.
    ///
    /// An absent term passes everything.
    pub fn not(&self, term_id: u64) -> FilterStep<'_> {
        match self.block(term_id) {
            Some(block) => FilterStep::Reject(RejectFilter { block, term_id }),
            None => FilterStep::LetThrough,
        }
    }

    /// Number of documents in the term's postings, 0 if absent.
    pub fn num_documents(&self, term_id: u64) -> usize {
        self.block(term_id).map_or(0, |block| block.len())
    }

    /// Resolve position data for the given documents under one term.
    ///
    /// Returns one slot per document id; documents missing from the
    /// term's postings, or whose position read fails, are left absent.
    pub fn get_term_data<'arena>(
        &self,
        arena: &'arena mut QueryArena,
        term_id: u64,
        doc_ids: &[u64],
    ) -> TermDataList<'arena> {
        let absent = |_: &u64| None;

        let FullState::Ready(ready) = &self.state else {
            warn!("Reverse index {} is not ready, dropping query", self.name);
            return doc_ids.iter().map(absent).collect();
        };

        let Some(block) = self.block(term_id) else {
            debug!("Missing offset for term {term_id}");
            return doc_ids.iter().map(absent).collect();
        };

        let Some(positions) = &ready.positions else {
            warn!("Positions store unavailable for index {}", self.name);
            return doc_ids.iter().map(absent).collect();
        };

        let words = block.values_for(doc_ids);
        positions.get_term_data(arena, &words)
    }

    /// Unmap the index files. Idempotent; queries against a closed
    /// reader behave like queries against a not-ready one.
    pub fn close(&mut self) {
        self.state = FullState::Closed;
    }
}

impl std::fmt::Debug for FullReverseIndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            FullState::Ready(_) => "ready",
            FullState::NotReady => "not-ready",
            FullState::Closed => "closed",
        };
        f.debug_struct("FullReverseIndexReader")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}
