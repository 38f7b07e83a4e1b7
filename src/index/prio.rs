//! The priority reverse index: rank-biased, delta-coded postings.
//!
//! Each term's stream starts with a four-byte header whose low 30 bits
//! carry the record count, followed by bit-packed records. Every record
//! opens with a 2-bit opcode:
//!
//! - `11` — absolute: a discarded 30-bit size field, then rank (7),
//!   domain id (31) and ordinal (26), all absolute.
//! - `10` — rank changed: gamma-coded rank delta, absolute domain id and
//!   ordinal.
//! - `01` — domain changed: gamma-coded domain delta, ordinal stored as
//!   `gamma(ordinal + 1)`.
//! - `00` — ordinal changed: gamma-coded ordinal delta.
//!
//! The decoder carries `(rank, domain id, ordinal)` across records and
//! packs each reconstructed triple into a document id, so the stream
//! decodes to ascending ids. Streams are read through a windowed bit
//! reader that refills from the documents file on demand; a decoder
//! instance is single-consumer and must not be shared across threads.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::error::{CrocusError, Result};
use crate::index::buffer::QueryBuffer;
use crate::index::doc_id::{
    MAX_DOMAIN_ID, MAX_ORDINAL, MAX_RANK, encode_document_id,
};
use crate::index::files::{DOCS_PRIO_MAGIC, read_exact_at, validate_file_footer};
use crate::index::source::EntrySource;
use crate::index::words::WordIndex;

/// Record count mask of the four-byte stream header; the top two bits
/// are reserved.
pub(crate) const HEADER_COUNT_MASK: u32 = (1 << 30) - 1;

/// How many bytes a refill pulls from the documents file at once.
const READ_CHUNK: usize = 4096;

/// Bit reader over a window of the documents file, refilled on demand.
///
/// When a read outruns the window, consumed bytes are compacted away and
/// a fresh chunk is appended from the current file offset. The refill is
/// synchronous; running out of file mid-record is a corruption error.
struct PrioBitStream {
    file: Arc<File>,
    /// File offset of the next unread byte.
    next_offset: u64,
    /// End of readable stream data (the file payload boundary).
    end_offset: u64,
    window: Vec<u8>,
    /// Bits consumed from the front of the window.
    consumed: usize,
}

impl PrioBitStream {
    fn new(file: Arc<File>, start: u64, end: u64) -> Self {
        PrioBitStream {
            file,
            next_offset: start,
            end_offset: end,
            window: Vec::new(),
            consumed: 0,
        }
    }

    fn available(&self) -> usize {
        self.window.len() * 8 - self.consumed
    }

    fn refill(&mut self) -> Result<()> {
        let keep_from = self.consumed / 8;
        self.window.drain(..keep_from);
        self.consumed %= 8;

        let take = READ_CHUNK.min((self.end_offset - self.next_offset) as usize);
        if take == 0 {
            return Err(CrocusError::corrupt(
                "priority posting stream ended mid-record",
            ));
        }

        let old_len = self.window.len();
        self.window.resize(old_len + take, 0);
        read_exact_at(&self.file, &mut self.window[old_len..], self.next_offset)?;
        self.next_offset += take as u64;
        Ok(())
    }

    fn get(&mut self, width: u32) -> Result<u64> {
        while self.available() < width as usize {
            self.refill()?;
        }

        let mut value = 0u64;
        let mut need = width;
        while need > 0 {
            let byte = self.window[self.consumed / 8] as u64;
            let avail = 8 - (self.consumed % 8) as u32;
            let take = avail.min(need);

            let chunk = (byte >> (avail - take)) & ((1u64 << take) - 1);
            value = (value << take) | chunk;

            self.consumed += take as usize;
            need -= take;
        }
        Ok(value)
    }

    fn get_gamma(&mut self) -> Result<u32> {
        let mut zeros = 0u32;
        while self.get(1)? == 0 {
            zeros += 1;
            if zeros >= 32 {
                return Err(CrocusError::corrupt("malformed gamma code in stream"));
            }
        }
        if zeros == 0 {
            Ok(1)
        } else {
            Ok((1u32 << zeros) | self.get(zeros)? as u32)
        }
    }
}

/// Streaming decoder over one term's priority posting stream.
pub struct PrioEntrySource<'a> {
    index_name: &'a str,
    stream: PrioBitStream,
    remaining: u32,
    rank: u32,
    domain_id: u32,
    ordinal: u32,
}

impl<'a> PrioEntrySource<'a> {
    fn new(index_name: &'a str, file: Arc<File>, start: u64, end: u64, count: u32) -> Self {
        PrioEntrySource {
            index_name,
            stream: PrioBitStream::new(file, start, end),
            remaining: count,
            rank: 0,
            domain_id: 0,
            ordinal: 0,
        }
    }

    pub(crate) fn has_more(&self) -> bool {
        self.remaining > 0
    }

    pub(crate) fn index_name(&self) -> &str {
        self.index_name
    }

    pub(crate) fn read(&mut self, buffer: &mut QueryBuffer) -> Result<()> {
        let n = buffer.capacity().min(self.remaining as usize);

        // Decode first: fill_slots would hold the mutable borrow of the
        // buffer across decode_record calls otherwise.
        let mut decoded = 0;
        {
            let slots = buffer.fill_slots();
            for slot in slots.iter_mut().take(n) {
                *slot = self.decode_record()?;
                decoded += 1;
            }
        }
        self.remaining -= decoded;

        buffer.set_filled(decoded as usize);
        buffer.uniq();
        Ok(())
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        let n = (n as u32).min(self.remaining);
        for _ in 0..n {
            self.decode_record()?;
        }
        self.remaining -= n;
        Ok(())
    }

    fn decode_record(&mut self) -> Result<u64> {
        let overflow = || CrocusError::corrupt("priority posting delta out of range");

        match self.stream.get(2)? {
            0b11 => {
                // Absolute record; the size field is informational.
                self.stream.get(30)?;
                self.rank = self.stream.get(7)? as u32;
                self.domain_id = self.stream.get(31)? as u32;
                self.ordinal = self.stream.get(26)? as u32;
            }
            0b10 => {
                let delta = self.stream.get_gamma()?;
                self.rank = self.rank.checked_add(delta).ok_or_else(overflow)?;
                self.domain_id = self.stream.get(31)? as u32;
                self.ordinal = self.stream.get(26)? as u32;
            }
            0b01 => {
                let delta = self.stream.get_gamma()?;
                self.domain_id = self.domain_id.checked_add(delta).ok_or_else(overflow)?;
                self.ordinal = self.stream.get_gamma()? - 1;
            }
            0b00 => {
                let delta = self.stream.get_gamma()?;
                self.ordinal = self.ordinal.checked_add(delta).ok_or_else(overflow)?;
            }
            _ => {
                return Err(CrocusError::corrupt(
                    "unrecognized opcode in priority posting stream",
                ));
            }
        }

        if self.rank > MAX_RANK as u32
            || self.domain_id > MAX_DOMAIN_ID
            || self.ordinal > MAX_ORDINAL
        {
            return Err(CrocusError::corrupt(
                "priority posting record out of field range",
            ));
        }

        Ok(encode_document_id(
            self.rank as u8,
            self.domain_id,
            self.ordinal,
        ))
    }
}

#[derive(Debug)]
enum PrioState {
    Ready {
        words: WordIndex,
        documents: Arc<File>,
        payload_len: u64,
    },
    NotReady,
    Closed,
}

/// Reader over the priority reverse index.
///
/// The word table is memory mapped; the documents file is read through
/// positioned I/O because its streams are consumed once, front to back.
#[derive(Debug)]
pub struct PrioReverseIndexReader {
    name: String,
    state: PrioState,
}

impl PrioReverseIndexReader {
    /// Open a priority index from its words and documents files.
    ///
    /// Missing files or failed validation leave the reader constructible
    /// but not ready: every query returns empty results.
    pub fn new(name: &str, words_path: &Path, docs_path: &Path) -> Result<Self> {
        if !words_path.exists() || !docs_path.exists() {
            return Ok(PrioReverseIndexReader {
                name: name.to_string(),
                state: PrioState::NotReady,
            });
        }

        let words = match WordIndex::open(words_path) {
            Ok(words) => words,
            Err(CrocusError::Corrupt(msg)) => {
                log::error!("failed to validate {}: {msg}", words_path.display());
                return Ok(PrioReverseIndexReader {
                    name: name.to_string(),
                    state: PrioState::NotReady,
                });
            }
            Err(e) => return Err(e),
        };

        let documents = File::open(docs_path)?;
        let payload_len = match validate_file_footer(&documents, DOCS_PRIO_MAGIC) {
            Ok(len) => len,
            Err(CrocusError::Corrupt(msg)) => {
                log::error!("failed to validate {}: {msg}", docs_path.display());
                return Ok(PrioReverseIndexReader {
                    name: name.to_string(),
                    state: PrioState::NotReady,
                });
            }
            Err(e) => return Err(e),
        };

        Ok(PrioReverseIndexReader {
            name: name.to_string(),
            state: PrioState::Ready {
                words,
                documents: Arc::new(documents),
                payload_len,
            },
        })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PrioState::Ready { .. })
    }

    /// Byte offset of the term's stream, or -1 if absent.
    pub fn word_offset(&self, term_id: u64) -> i64 {
        match &self.state {
            PrioState::Ready { words, .. } => words.word_offset(term_id),
            _ => -1,
        }
    }

    /// Stream the term's documents in ascending id order.
    pub fn documents(&self, term_id: u64) -> EntrySource<'_> {
        let PrioState::Ready {
            words,
            documents,
            payload_len,
        } = &self.state
        else {
            warn!("Priority index {} is not ready, dropping query", self.name);
            return EntrySource::empty("prio");
        };

        let offset = words.word_offset(term_id);
        if offset < 0 {
            return EntrySource::empty("prio");
        }

        match self.stream_count(documents, offset as u64) {
            Ok(count) => EntrySource::Prio(PrioEntrySource::new(
                &self.name,
                documents.clone(),
                offset as u64 + 4,
                *payload_len,
                count,
            )),
            Err(e) => {
                warn!("failed to read stream header for term {term_id}: {e}");
                EntrySource::empty("prio")
            }
        }
    }

    /// Number of records in the term's stream, 0 if absent.
    pub fn num_documents(&self, term_id: u64) -> usize {
        let PrioState::Ready {
            words, documents, ..
        } = &self.state
        else {
            return 0;
        };

        let offset = words.word_offset(term_id);
        if offset < 0 {
            return 0;
        }

        match self.stream_count(documents, offset as u64) {
            Ok(count) => count as usize,
            Err(e) => {
                warn!("failed to read stream header for term {term_id}: {e}");
                0
            }
        }
    }

    fn stream_count(&self, documents: &File, offset: u64) -> Result<u32> {
        let PrioState::Ready { payload_len, .. } = &self.state else {
            return Ok(0);
        };
        if offset + 4 > *payload_len {
            return Err(CrocusError::corrupt("stream header outside documents file"));
        }

        let mut header = [0u8; 4];
        read_exact_at(documents, &mut header, offset)?;
        Ok(LittleEndian::read_u32(&header) & HEADER_COUNT_MASK)
    }

    /// Release the word table map and documents handle. Idempotent.
    pub fn close(&mut self) {
        self.state = PrioState::Closed;
    }
}
