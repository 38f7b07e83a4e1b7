//! Query composition: an entry source narrowed by filter steps.

use crate::error::Result;
use crate::index::buffer::QueryBuffer;
use crate::index::filter::FilterStep;
use crate::index::source::EntrySource;

/// One evaluation head of a search query: a stream of candidate
/// documents from a term's postings, narrowed by inclusion and
/// exclusion filters.
///
/// Filters run cheapest first; a buffer emptied part-way skips the
/// remaining steps.
pub struct IndexQuery<'a> {
    source: EntrySource<'a>,
    filters: Vec<FilterStep<'a>>,
}

impl<'a> IndexQuery<'a> {
    pub fn new(source: EntrySource<'a>) -> Self {
        IndexQuery {
            source,
            filters: Vec::new(),
        }
    }

    /// Add a filter step, keeping the steps ordered by cost.
    pub fn add_inclusion_filter(&mut self, filter: FilterStep<'a>) {
        self.filters.push(filter);
        self.filters
            .sort_by(|a, b| a.cost().total_cmp(&b.cost()));
    }

    /// Builder-style [`IndexQuery::add_inclusion_filter`].
    pub fn with_filter(mut self, filter: FilterStep<'a>) -> Self {
        self.add_inclusion_filter(filter);
        self
    }

    /// Whether the source may still produce candidates.
    pub fn has_more(&self) -> bool {
        self.source.has_more()
    }

    /// Pull the next chunk of candidates through the filter chain.
    ///
    /// The buffer holds the surviving document ids afterwards; it may
    /// come up empty even when more candidates remain upstream.
    pub fn read_more(&mut self, buffer: &mut QueryBuffer) -> Result<()> {
        self.source.read(buffer)?;

        for filter in &self.filters {
            if buffer.is_empty() {
                break;
            }
            filter.apply(buffer);
        }
        Ok(())
    }

    /// Describe the query plan for diagnostics.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("source:{}", self.source.index_name())];
        parts.extend(self.filters.iter().map(|f| f.describe()));
        parts.join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_query() {
        let mut query =
            IndexQuery::new(EntrySource::empty("full")).with_filter(FilterStep::LetThrough);

        assert!(!query.has_more());

        let mut buffer = QueryBuffer::new(8);
        query.read_more(&mut buffer).unwrap();
        assert!(buffer.is_empty());

        assert_eq!(query.describe(), "source:full -> let-through");
    }

    #[test]
    fn test_filters_are_cost_ordered() {
        let mut query = IndexQuery::new(EntrySource::empty("full"));
        query.add_inclusion_filter(FilterStep::LetThrough);
        query.add_inclusion_filter(FilterStep::NoPass);

        // Constant steps share a zero cost; both stay in place.
        assert_eq!(query.filters.len(), 2);
    }
}
