//! User page selection, kept as global page indices

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::page_index::PageIndex;
use crate::ranges::{pages_in, parse_ranges};
use crate::registry::DocumentId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeSet<u32>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_globals(pages: impl IntoIterator<Item = u32>) -> Self {
        Self(pages.into_iter().collect())
    }

    /// Select local pages of one document
    pub fn from_local(
        index: &PageIndex,
        document: DocumentId,
        pages: impl IntoIterator<Item = u32>,
    ) -> Result<Self, IndexError> {
        let globals = pages
            .into_iter()
            .map(|p| index.global_index(document, p))
            .collect::<Result<BTreeSet<u32>, _>>()?;
        Ok(Self(globals))
    }

    /// Flip one global page; returns whether it is now selected
    pub fn toggle(&mut self, global: u32) -> bool {
        if self.0.remove(&global) {
            false
        } else {
            self.0.insert(global);
            true
        }
    }

    pub fn insert(&mut self, global: u32) -> bool {
        self.0.insert(global)
    }

    pub fn remove(&mut self, global: u32) -> bool {
        self.0.remove(&global)
    }

    pub fn contains(&self, global: u32) -> bool {
        self.0.contains(&global)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn select_all(&mut self, index: &PageIndex) {
        self.0 = (1..=index.total_pages()).collect();
    }

    /// Add every page of one document
    pub fn select_document(&mut self, index: &PageIndex, document: DocumentId) -> Result<(), IndexError> {
        self.0.extend(index.document_pages(document)?);
        Ok(())
    }

    /// Add the pages of a range expression, read as local pages of one
    /// document. Pages beyond the document are ignored. Returns how many
    /// pages were newly selected.
    pub fn select_expression(
        &mut self,
        index: &PageIndex,
        document: DocumentId,
        expression: &str,
    ) -> Result<usize, IndexError> {
        let pages = index.document_pages(document)?;
        let page_count = pages.end() + 1 - pages.start();
        let before = self.0.len();
        for local in pages_in(&parse_ranges(expression), page_count) {
            self.0.insert(index.global_index(document, local)?);
        }
        Ok(self.0.len() - before)
    }

    /// Local pages of `document` that are selected, ascending
    pub fn local_pages(&self, index: &PageIndex, document: DocumentId) -> Result<BTreeSet<u32>, IndexError> {
        let pages = index.document_pages(document)?;
        if pages.is_empty() {
            return Ok(BTreeSet::new());
        }
        let offset = pages.start() - 1;
        Ok(self.0.range(pages).map(|g| g - offset).collect())
    }

    /// Carry the selection across a registry change. Pages are matched by
    /// `(document, local page)`; pages of documents no longer present are
    /// dropped.
    pub fn remap(&self, old: &PageIndex, new: &PageIndex) -> Selection {
        self.0
            .iter()
            .filter_map(|&global| old.resolve(global).ok())
            .filter_map(|(document, local)| new.global_index(document, local).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for Selection {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::from_globals(iter)
    }
}
