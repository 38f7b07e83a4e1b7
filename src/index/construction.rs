//! Index file writers.
//!
//! These produce the read-side formats: a word table plus a documents
//! file per index variant, and the shared positions file for the full
//! index. Postings accumulate in memory and are written in one pass,
//! which covers index construction jobs, fixtures and tools; the
//! surrounding reindex orchestration lives with the caller.

use std::path::Path;

use ahash::AHashMap;
use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CrocusError, Result};
use crate::index::doc_id::decode_document_id;
use crate::index::files::{
    DOCS_FULL_MAGIC, DOCS_PRIO_MAGIC, POSITIONS_MAGIC, WORDS_MAGIC, append_footer,
};
use crate::index::positions::encode_position_word;
use crate::sequence::CodedSequence;
use crate::sequence::bits::BitWriter;
use crate::sequence::gamma::GammaCodedSequence;

fn write_words_file(path: &Path, entries: &[(u64, u64)]) -> Result<()> {
    let mut payload = Vec::with_capacity(8 + entries.len() * 16);
    payload.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for &(term_id, offset) in entries {
        payload.extend_from_slice(&term_id.to_le_bytes());
        payload.extend_from_slice(&offset.to_le_bytes());
    }
    append_footer(&mut payload, WORDS_MAGIC);
    std::fs::write(path, &payload)?;
    Ok(())
}

/// Writer for the full index: sorted posting blocks plus position data.
#[derive(Debug, Default)]
pub struct FullIndexWriter {
    postings: AHashMap<u64, Vec<(u64, Vec<i32>)>>,
}

impl FullIndexWriter {
    pub fn new() -> Self {
        FullIndexWriter::default()
    }

    /// Record that `doc_id` matches `term_id` at the given word
    /// positions (strictly increasing; may be empty).
    pub fn add(&mut self, term_id: u64, doc_id: u64, positions: &[i32]) {
        self.postings
            .entry(term_id)
            .or_default()
            .push((doc_id, positions.to_vec()));
    }

    /// Write the words, documents and positions files.
    pub fn write(
        self,
        words_path: &Path,
        docs_path: &Path,
        positions_path: &Path,
    ) -> Result<()> {
        let mut terms: Vec<(u64, Vec<(u64, Vec<i32>)>)> = self.postings.into_iter().collect();
        terms.sort_by_key(|(term_id, _)| *term_id);

        let mut docs_payload = Vec::new();
        let mut positions_payload = Vec::new();
        let mut word_entries = Vec::with_capacity(terms.len());

        for (term_id, mut entries) in terms {
            entries.sort_by_key(|(doc_id, _)| *doc_id);
            entries.dedup_by_key(|(doc_id, _)| *doc_id);

            word_entries.push((term_id, docs_payload.len() as u64));

            docs_payload.extend_from_slice(&(entries.len() as u64).to_le_bytes());
            for (doc_id, _) in &entries {
                docs_payload.extend_from_slice(&doc_id.to_le_bytes());
            }
            for (_, positions) in &entries {
                let word = if positions.is_empty() {
                    0
                } else {
                    let blob = GammaCodedSequence::generate(positions)?;
                    let offset = positions_payload.len() as u64;
                    positions_payload.extend_from_slice(blob.bytes());
                    encode_position_word(blob.bytes().len(), offset)?
                };
                docs_payload.extend_from_slice(&word.to_le_bytes());
            }
        }

        write_words_file(words_path, &word_entries)?;

        append_footer(&mut docs_payload, DOCS_FULL_MAGIC);
        std::fs::write(docs_path, &docs_payload)?;

        append_footer(&mut positions_payload, POSITIONS_MAGIC);
        std::fs::write(positions_path, &positions_payload)?;
        Ok(())
    }
}

/// Writer for the priority index: delta-coded record streams.
#[derive(Debug, Default)]
pub struct PrioIndexWriter {
    postings: AHashMap<u64, Vec<u64>>,
}

impl PrioIndexWriter {
    pub fn new() -> Self {
        PrioIndexWriter::default()
    }

    /// Record that `doc_id` matches `term_id`.
    pub fn add(&mut self, term_id: u64, doc_id: u64) {
        self.postings.entry(term_id).or_default().push(doc_id);
    }

    /// Write the words and documents files.
    pub fn write(self, words_path: &Path, docs_path: &Path) -> Result<()> {
        let mut terms: Vec<(u64, Vec<u64>)> = self.postings.into_iter().collect();
        terms.sort_by_key(|(term_id, _)| *term_id);

        let mut docs_payload = Vec::new();
        let mut word_entries = Vec::with_capacity(terms.len());

        for (term_id, mut doc_ids) in terms {
            doc_ids.sort_unstable();
            doc_ids.dedup();

            word_entries.push((term_id, docs_payload.len() as u64));
            encode_stream(&mut docs_payload, &doc_ids)?;
        }

        write_words_file(words_path, &word_entries)?;

        append_footer(&mut docs_payload, DOCS_PRIO_MAGIC);
        std::fs::write(docs_path, &docs_payload)?;
        Ok(())
    }
}

/// Append one term's stream: the count header, then a record per
/// document using the smallest opcode that can express the change from
/// the previous record.
fn encode_stream(out: &mut Vec<u8>, doc_ids: &[u64]) -> Result<()> {
    if doc_ids.len() as u64 > (1 << 30) - 1 {
        return Err(CrocusError::invalid_argument(
            "too many documents for one priority stream",
        ));
    }

    let mut header = [0u8; 4];
    LittleEndian::write_u32(&mut header, doc_ids.len() as u32);
    out.extend_from_slice(&header);

    let mut writer = BitWriter::new();
    let mut prev: Option<(u8, u32, u32)> = None;

    for &doc_id in doc_ids {
        let (rank, domain_id, ordinal) = decode_document_id(doc_id);

        match prev {
            None => {
                writer.put(0b11, 2);
                writer.put(doc_ids.len() as u64, 30);
                writer.put(rank as u64, 7);
                writer.put(domain_id as u64, 31);
                writer.put(ordinal as u64, 26);
            }
            Some((prev_rank, prev_domain, prev_ordinal)) => {
                if rank != prev_rank {
                    writer.put(0b10, 2);
                    writer.put_gamma((rank - prev_rank) as u32);
                    writer.put(domain_id as u64, 31);
                    writer.put(ordinal as u64, 26);
                } else if domain_id != prev_domain {
                    writer.put(0b01, 2);
                    writer.put_gamma(domain_id - prev_domain);
                    writer.put_gamma(ordinal + 1);
                } else {
                    writer.put(0b00, 2);
                    writer.put_gamma(ordinal - prev_ordinal);
                }
            }
        }
        prev = Some((rank, domain_id, ordinal));
    }

    out.extend_from_slice(&writer.finish());
    Ok(())
}
