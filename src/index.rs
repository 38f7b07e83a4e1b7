//! The reverse index: term id to posting list resolution.
//!
//! Two index variants share one read model. The *full* index stores each
//! term's postings as a sorted block of document ids with a metadata
//! column addressing position data; the *priority* index stores a
//! rank-biased, delta-coded record stream. Both resolve a term id to a
//! postings offset through a mapped word table, stream document ids
//! through [`source::EntrySource`], and compose with
//! [`filter::FilterStep`] retain/reject steps.
//!
//! Index snapshots are immutable once opened. A reindex builds a fresh
//! set of files, stages them as the `next` generation and swaps them in
//! atomically through [`stateful::StatefulIndex`] while in-flight
//! queries keep reading the previous snapshot.

pub mod buffer;
pub mod construction;
pub mod doc_id;
pub mod files;
pub mod filter;
pub mod full;
pub mod positions;
pub mod prio;
pub mod query;
pub mod source;
pub mod stateful;
pub mod words;
