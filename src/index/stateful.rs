//! Snapshot lifecycle: hot-swappable combined index readers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::error::Result;
use crate::index::files::{self, IndexGeneration, IndexKind};
use crate::index::filter::FilterStep;
use crate::index::full::FullReverseIndexReader;
use crate::index::positions::{QueryArena, TermDataList};
use crate::index::prio::PrioReverseIndexReader;
use crate::index::source::EntrySource;

/// One generation's full and priority readers.
///
/// A combined reader is immutable once constructed; queries borrow it
/// for their whole duration and never observe a partial swap.
#[derive(Debug)]
pub struct CombinedIndexReader {
    full: FullReverseIndexReader,
    prio: PrioReverseIndexReader,
}

impl CombinedIndexReader {
    /// Open the current generation's files under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let generation = IndexGeneration::Current;

        let full = FullReverseIndexReader::new(
            "full",
            &files::words_file(dir, IndexKind::Full, generation),
            &files::docs_file(dir, IndexKind::Full, generation),
            &files::positions_file(dir, generation),
        )?;
        let prio = PrioReverseIndexReader::new(
            "prio",
            &files::words_file(dir, IndexKind::Prio, generation),
            &files::docs_file(dir, IndexKind::Prio, generation),
        )?;

        Ok(CombinedIndexReader { full, prio })
    }

    /// Whether both variants are ready to serve queries.
    pub fn is_ready(&self) -> bool {
        self.full.is_ready() && self.prio.is_ready()
    }

    /// Stream a term's documents from the full index.
    pub fn documents_full(&self, term_id: u64) -> EntrySource<'_> {
        self.full.documents(term_id)
    }

    /// Stream a term's documents from the priority index.
    pub fn documents_prio(&self, term_id: u64) -> EntrySource<'_> {
        self.prio.documents(term_id)
    }

    /// A retain filter over the full index.
    pub fn also(&self, term_id: u64) -> FilterStep<'_> {
        self.full.also(term_id)
    }

    /// A reject filter over the full index.
    pub fn not(&self, term_id: u64) -> FilterStep<'_> {
        self.full.not(term_id)
    }

    /// Number of matching documents in the full index.
    pub fn num_hits(&self, term_id: u64) -> usize {
        self.full.num_documents(term_id)
    }

    /// Number of matching documents in the priority index.
    pub fn num_hits_prio(&self, term_id: u64) -> usize {
        self.prio.num_documents(term_id)
    }

    /// Resolve position data for documents under a term.
    pub fn get_term_data<'arena>(
        &self,
        arena: &'arena mut QueryArena,
        term_id: u64,
        doc_ids: &[u64],
    ) -> TermDataList<'arena> {
        self.full.get_term_data(arena, term_id, doc_ids)
    }
}

/// The mutable cell holding the live index snapshot.
///
/// Readers capture an [`Arc`] to the current snapshot once per query and
/// keep using it even while a reindex publishes a replacement; the old
/// snapshot's files unmap when its last reference drops, never while a
/// read is in flight.
pub struct StatefulIndex {
    root: PathBuf,
    reader: RwLock<Option<Arc<CombinedIndexReader>>>,
}

impl StatefulIndex {
    /// Create an unloaded cell over an index directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StatefulIndex {
            root: root.into(),
            reader: RwLock::new(None),
        }
    }

    /// The live snapshot, if one is loaded.
    pub fn get_reader(&self) -> Option<Arc<CombinedIndexReader>> {
        self.reader.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.reader.read().is_some()
    }

    /// Promote any staged `next` generation files and publish a fresh
    /// snapshot over the result.
    ///
    /// The new snapshot is fully constructed before the reference swap,
    /// so concurrent readers see either the old or the new index,
    /// nothing in between.
    pub fn switch_index(&self) -> Result<()> {
        files::promote_next(&self.root)?;

        let fresh = Arc::new(CombinedIndexReader::open(&self.root)?);

        let mut guard = self.reader.write();
        *guard = Some(fresh);
        info!("Index snapshot switched in {}", self.root.display());
        Ok(())
    }

    /// Drop the live snapshot; queries fail over to "no index loaded".
    pub fn offline(&self) {
        *self.reader.write() = None;
    }
}

impl std::fmt::Debug for StatefulIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatefulIndex")
            .field("root", &self.root)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_cell() {
        let dir = tempfile::tempdir().unwrap();
        let index = StatefulIndex::new(dir.path());

        assert!(!index.is_loaded());
        assert!(index.get_reader().is_none());
    }

    #[test]
    fn test_switch_on_empty_directory_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let index = StatefulIndex::new(dir.path());

        // No files at all: the snapshot loads in its not-ready state.
        index.switch_index().unwrap();
        let reader = index.get_reader().unwrap();
        assert!(!reader.is_ready());
        assert_eq!(reader.num_hits(1), 0);

        index.offline();
        assert!(!index.is_loaded());
    }
}
