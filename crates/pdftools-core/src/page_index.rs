//! Global page index
//!
//! Flat, 1-based page numbering spanning every loaded document in list
//! order. Document `k` starts at `1 + sum(page counts before k)`. The index
//! is always rebuilt from scratch; it is never patched in place.

use std::ops::RangeInclusive;

use crate::error::IndexError;
use crate::registry::{DocumentId, LoadedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    document: DocumentId,
    /// Sum of page counts of all preceding documents
    offset: u32,
    page_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageIndex {
    spans: Vec<Span>,
    total: u32,
}

impl PageIndex {
    pub fn build(documents: &[LoadedDocument]) -> Self {
        Self::from_counts(documents.iter().map(|d| (d.id(), d.page_count())))
    }

    /// Build from `(document, page_count)` pairs in display order
    pub fn from_counts(counts: impl IntoIterator<Item = (DocumentId, u32)>) -> Self {
        let mut spans = Vec::new();
        let mut offset = 0u32;
        for (document, page_count) in counts {
            spans.push(Span {
                document,
                offset,
                page_count,
            });
            offset += page_count;
        }
        Self {
            spans,
            total: offset,
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Forward map: `(document, local page)` to a global index
    pub fn global_index(&self, document: DocumentId, local_page: u32) -> Result<u32, IndexError> {
        let span = self.span(document)?;
        if local_page == 0 || local_page > span.page_count {
            return Err(IndexError::PageOutOfRange {
                document,
                page: local_page,
                page_count: span.page_count,
            });
        }
        Ok(span.offset + local_page)
    }

    /// Reverse map: global index to `(document, local page)`
    pub fn resolve(&self, global: u32) -> Result<(DocumentId, u32), IndexError> {
        if global == 0 || global > self.total {
            return Err(IndexError::GlobalOutOfRange {
                index: global,
                total: self.total,
            });
        }
        // First span whose end reaches `global`; zero-page spans are skipped
        // naturally because their end equals their offset.
        let pos = self
            .spans
            .partition_point(|s| s.offset + s.page_count < global);
        let span = self.spans.get(pos).ok_or(IndexError::GlobalOutOfRange {
            index: global,
            total: self.total,
        })?;
        Ok((span.document, global - span.offset))
    }

    /// Global indices covered by one document
    pub fn document_pages(&self, document: DocumentId) -> Result<RangeInclusive<u32>, IndexError> {
        let span = self.span(document)?;
        Ok(span.offset + 1..=span.offset + span.page_count)
    }

    pub fn contains(&self, document: DocumentId) -> bool {
        self.spans.iter().any(|s| s.document == document)
    }

    fn span(&self, document: DocumentId) -> Result<&Span, IndexError> {
        self.spans
            .iter()
            .find(|s| s.document == document)
            .ok_or(IndexError::UnknownDocument(document))
    }
}
