//! Query-composition filter steps.
//!
//! A [`FilterStep`] narrows a buffer of candidate document ids in one
//! pass. The variants form a closed set picked at construction time:
//! `also` on a present term retains matching candidates, `not` rejects
//! them, and absent terms collapse to the constant steps — an AND
//! against a nonexistent term can never match, a NOT against one always
//! passes.

use crate::index::buffer::QueryBuffer;
use crate::index::full::PostingBlock;

/// A retain/reject predicate over candidate document ids.
pub enum FilterStep<'a> {
    /// Rejects every candidate.
    NoPass,
    /// Passes every candidate.
    LetThrough,
    /// Keeps candidates present in a term's posting block.
    Retain(RetainFilter<'a>),
    /// Drops candidates present in a term's posting block.
    Reject(RejectFilter<'a>),
}

pub struct RetainFilter<'a> {
    pub(crate) block: PostingBlock<'a>,
    pub(crate) index_name: &'a str,
    pub(crate) term_id: u64,
}

pub struct RejectFilter<'a> {
    pub(crate) block: PostingBlock<'a>,
    pub(crate) term_id: u64,
}

impl FilterStep<'_> {
    /// Whether a single candidate would survive this step.
    pub fn test(&self, doc_id: u64) -> bool {
        match self {
            FilterStep::NoPass => false,
            FilterStep::LetThrough => true,
            FilterStep::Retain(filter) => filter.block.contains(doc_id),
            FilterStep::Reject(filter) => !filter.block.contains(doc_id),
        }
    }

    /// Filter the buffer in place. Candidates must be ascending.
    pub fn apply(&self, buffer: &mut QueryBuffer) {
        match self {
            FilterStep::NoPass => {
                while buffer.has_remaining() {
                    buffer.reject_and_advance();
                }
                buffer.finalize_filtering();
            }
            FilterStep::LetThrough => {}
            FilterStep::Retain(filter) => apply_block(&filter.block, buffer, true),
            FilterStep::Reject(filter) => apply_block(&filter.block, buffer, false),
        }
    }

    /// Rough work estimate, used to order steps cheapest first.
    pub fn cost(&self) -> f64 {
        match self {
            FilterStep::NoPass | FilterStep::LetThrough => 0.0,
            FilterStep::Retain(filter) => filter.block.len() as f64,
            FilterStep::Reject(filter) => filter.block.len() as f64,
        }
    }

    /// Human-readable description for query diagnostics.
    pub fn describe(&self) -> String {
        match self {
            FilterStep::NoPass => "no-pass".to_string(),
            FilterStep::LetThrough => "let-through".to_string(),
            FilterStep::Retain(filter) => {
                format!("retain:{}:{}", filter.index_name, filter.term_id)
            }
            FilterStep::Reject(filter) => format!("reject:{}", filter.term_id),
        }
    }
}

/// Merge-walk the buffer against a sorted posting block, keeping matches
/// when `retain_matches` is set and dropping them otherwise.
fn apply_block(block: &PostingBlock<'_>, buffer: &mut QueryBuffer, retain_matches: bool) {
    let mut cursor = 0;

    while buffer.has_remaining() {
        let candidate = buffer.current_value();
        cursor = block.seek(cursor, candidate);

        let matched = cursor < block.len() && block.doc(cursor) == candidate;
        if matched == retain_matches {
            buffer.retain_and_advance();
        } else {
            buffer.reject_and_advance();
        }
    }
    buffer.finalize_filtering();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[u64]) -> QueryBuffer {
        let mut buffer = QueryBuffer::new(values.len().max(1));
        let slots = buffer.fill_slots();
        slots[..values.len()].copy_from_slice(values);
        buffer.set_filled(values.len());
        buffer
    }

    #[test]
    fn test_constant_steps() {
        let mut buffer = filled(&[1, 2, 3]);
        FilterStep::NoPass.apply(&mut buffer);
        assert!(buffer.is_empty());
        assert!(!FilterStep::NoPass.test(7));

        let mut buffer = filled(&[1, 2, 3]);
        FilterStep::LetThrough.apply(&mut buffer);
        assert_eq!(buffer.data(), &[1, 2, 3]);
        assert!(FilterStep::LetThrough.test(7));
    }

    #[test]
    fn test_costs_order_constants_first() {
        assert_eq!(FilterStep::NoPass.cost(), 0.0);
        assert_eq!(FilterStep::LetThrough.cost(), 0.0);
    }
}
