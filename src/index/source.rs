//! Streaming producers of a term's matching document ids.
//!
//! An [`EntrySource`] fills a [`QueryBuffer`] in chunks with ascending,
//! de-duplicated document ids. The variants form a closed set chosen at
//! query-construction time: absent terms and not-ready indexes stream
//! nothing, full-index terms stream their sorted block, priority-index
//! terms decode their delta-coded record stream.

use crate::error::Result;
use crate::index::buffer::QueryBuffer;
use crate::index::full::PostingBlock;
use crate::index::prio::PrioEntrySource;

/// A streaming source of one term's document ids.
pub enum EntrySource<'a> {
    /// Nothing to stream: unknown term or a not-ready index.
    Empty(EmptyEntrySource),
    /// Sorted block from the full index.
    Full(FullEntrySource<'a>),
    /// Delta-coded stream from the priority index.
    Prio(PrioEntrySource<'a>),
}

impl<'a> EntrySource<'a> {
    pub(crate) fn empty(index_name: &'static str) -> Self {
        EntrySource::Empty(EmptyEntrySource { index_name })
    }

    pub(crate) fn full(index_name: &'a str, block: PostingBlock<'a>) -> Self {
        EntrySource::Full(FullEntrySource {
            index_name,
            block,
            pos: 0,
        })
    }

    /// Whether another `read` can produce documents.
    pub fn has_more(&self) -> bool {
        match self {
            EntrySource::Empty(_) => false,
            EntrySource::Full(source) => source.pos < source.block.len(),
            EntrySource::Prio(source) => source.has_more(),
        }
    }

    /// Fill the buffer with the next chunk of ascending, de-duplicated
    /// document ids. An exhausted source leaves the buffer empty.
    pub fn read(&mut self, buffer: &mut QueryBuffer) -> Result<()> {
        match self {
            EntrySource::Empty(_) => {
                buffer.reset();
                Ok(())
            }
            EntrySource::Full(source) => {
                source.read(buffer);
                Ok(())
            }
            EntrySource::Prio(source) => source.read(buffer),
        }
    }

    /// Skip the next `n` documents without surfacing them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        match self {
            EntrySource::Empty(_) => Ok(()),
            EntrySource::Full(source) => {
                source.pos = (source.pos + n).min(source.block.len());
                Ok(())
            }
            EntrySource::Prio(source) => source.skip(n),
        }
    }

    /// Which index this source streams from, for diagnostics.
    pub fn index_name(&self) -> &str {
        match self {
            EntrySource::Empty(source) => source.index_name,
            EntrySource::Full(source) => source.index_name,
            EntrySource::Prio(source) => source.index_name(),
        }
    }
}

/// The always-empty source.
pub struct EmptyEntrySource {
    index_name: &'static str,
}

/// Chunked reader over a full-index posting block.
pub struct FullEntrySource<'a> {
    index_name: &'a str,
    block: PostingBlock<'a>,
    pos: usize,
}

impl FullEntrySource<'_> {
    fn read(&mut self, buffer: &mut QueryBuffer) {
        let n = buffer.capacity().min(self.block.len() - self.pos);

        let slots = buffer.fill_slots();
        for (i, slot) in slots.iter_mut().enumerate().take(n) {
            *slot = self.block.doc(self.pos + i);
        }
        self.pos += n;

        buffer.set_filled(n);
        // Blocks are sorted; duplicated entries are collapsed on read.
        buffer.uniq();
    }
}
