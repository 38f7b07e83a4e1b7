//! # Crocus
//!
//! A compact postings storage and retrieval engine for full-text search
//! indexes.
//!
//! ## Features
//!
//! - Elias-Gamma and varint codecs for strictly increasing sequences
//! - Set operations over decoded sequences (intersection, min distance)
//! - Memory-mapped, lock-free reverse index readers
//! - A rank-biased priority index with a delta-coded record stream
//! - Hot-swappable index snapshots for zero-downtime reindexing

pub mod index;
pub mod sequence;

mod error;

// Re-exports for the public API
pub use error::{CrocusError, Result};
pub use index::buffer::QueryBuffer;
pub use index::doc_id::{decode_document_id, encode_document_id};
pub use index::filter::FilterStep;
pub use index::full::FullReverseIndexReader;
pub use index::positions::{QueryArena, TermData};
pub use index::prio::PrioReverseIndexReader;
pub use index::query::IndexQuery;
pub use index::source::EntrySource;
pub use index::stateful::{CombinedIndexReader, StatefulIndex};
pub use sequence::CodedSequence;
pub use sequence::gamma::GammaCodedSequence;
pub use sequence::varint::VarintCodedSequence;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
