//! File registry
//!
//! Holds the ordered set of loaded documents. Insertion order is display
//! order and the default merge order. Every mutation rebuilds the global
//! page index so lookups never see stale offsets.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::config::{ToolsConfig, PDF_MIME_TYPE};
use crate::engine::{DocumentEngine, DocumentMetadata};
use crate::error::{EngineError, LoadError, RegistryError};
use crate::page_index::PageIndex;

/// Opaque identifier assigned at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for DocumentId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A parsed document owned by the registry. The content is never mutated;
/// operations always produce new bytes.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    id: DocumentId,
    name: String,
    page_count: u32,
    content: Vec<u8>,
    metadata: DocumentMetadata,
}

impl LoadedDocument {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name without a trailing `.pdf`
    pub fn stem(&self) -> &str {
        let lower = self.name.to_ascii_lowercase();
        if lower.ends_with(".pdf") && self.name.len() > 4 {
            &self.name[..self.name.len() - 4]
        } else {
            &self.name
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            name: self.name.clone(),
            page_count: self.page_count,
            size_bytes: self.byte_size(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Serializable view of a loaded document for UI listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub name: String,
    pub page_count: u32,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

/// A file handed over by the upload surface
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    /// Declared MIME type, when the surface knows it
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Result of loading one file out of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub name: String,
    pub result: Result<DocumentId, LoadError>,
}

#[derive(Debug, Clone)]
pub struct Registry {
    documents: Vec<LoadedDocument>,
    index: PageIndex,
    max_file_size: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(&ToolsConfig::default())
    }
}

impl Registry {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            documents: Vec::new(),
            index: PageIndex::default(),
            max_file_size: config.max_file_size,
        }
    }

    /// Parse and append a document
    pub fn load<E: DocumentEngine>(
        &mut self,
        engine: &E,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<&LoadedDocument, LoadError> {
        let size = bytes.len() as u64;
        if size > self.max_file_size {
            tracing::warn!(name, size, limit = self.max_file_size, "Rejected oversized file");
            return Err(LoadError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        let parsed = engine.parse(&bytes).map_err(|e| match e {
            EngineError::NotAPdf => LoadError::NotAPdf(name.to_string()),
            other => LoadError::Corrupt(other.to_string()),
        })?;

        let page_count = engine.page_count(&parsed);
        if page_count == 0 {
            return Err(LoadError::Corrupt("PDF has no pages".into()));
        }
        let metadata = engine.metadata(&parsed);

        let document = LoadedDocument {
            id: DocumentId::new(),
            name: name.to_string(),
            page_count,
            content: bytes,
            metadata,
        };
        tracing::info!(
            document = %document.id,
            name,
            pages = page_count,
            size,
            "Loaded document"
        );

        self.documents.push(document);
        self.rebuild_index();
        Ok(&self.documents[self.documents.len() - 1])
    }

    /// Load a file after checking its declared MIME type
    pub fn load_file<E: DocumentEngine>(
        &mut self,
        engine: &E,
        file: PendingFile,
    ) -> Result<&LoadedDocument, LoadError> {
        if let Some(mime) = file.mime_type.as_deref() {
            if !mime.eq_ignore_ascii_case(PDF_MIME_TYPE) {
                return Err(LoadError::NotAPdf(format!(
                    "{} has type {}",
                    file.name, mime
                )));
            }
        }
        self.load(engine, &file.name, file.bytes)
    }

    /// Load several files. Each file succeeds or fails on its own; failures
    /// leave the registry untouched for that file.
    pub fn load_all<E: DocumentEngine>(
        &mut self,
        engine: &E,
        files: Vec<PendingFile>,
    ) -> Vec<LoadOutcome> {
        files
            .into_iter()
            .map(|file| {
                let name = file.name.clone();
                let result = self.load_file(engine, file).map(|doc| doc.id());
                if let Err(ref e) = result {
                    tracing::warn!(name = %name, error = %e, "Failed to load file");
                }
                LoadOutcome { name, result }
            })
            .collect()
    }

    /// Remove a document. Unknown ids are ignored.
    pub fn remove(&mut self, id: DocumentId) -> Option<LoadedDocument> {
        let position = self.position(id)?;
        let removed = self.documents.remove(position);
        self.rebuild_index();
        tracing::info!(document = %id, name = %removed.name, "Removed document");
        Some(removed)
    }

    /// Reorder documents. `new_order` lists current positions in the
    /// desired order.
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<(), RegistryError> {
        if new_order.len() != self.documents.len() {
            return Err(RegistryError::InvalidOrder(
                "wrong number of indices".into(),
            ));
        }

        let mut seen = vec![false; self.documents.len()];
        for &idx in new_order {
            if idx >= self.documents.len() {
                return Err(RegistryError::InvalidOrder("index out of bounds".into()));
            }
            if seen[idx] {
                return Err(RegistryError::InvalidOrder("duplicate index".into()));
            }
            seen[idx] = true;
        }

        let mut slots: Vec<Option<LoadedDocument>> =
            std::mem::take(&mut self.documents).into_iter().map(Some).collect();
        self.documents = new_order
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();
        self.rebuild_index();
        tracing::info!(order = ?new_order, "Reordered documents");
        Ok(())
    }

    pub fn rename(&mut self, id: DocumentId, name: &str) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let document = self
            .documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(RegistryError::UnknownDocument(id))?;
        document.name = name.to_string();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.rebuild_index();
    }

    pub fn list(&self) -> &[LoadedDocument] {
        &self.documents
    }

    pub fn get(&self, id: DocumentId) -> Option<&LoadedDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn position(&self, id: DocumentId) -> Option<usize> {
        self.documents.iter().position(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_pages(&self) -> u32 {
        self.index.total_pages()
    }

    pub fn page_index(&self) -> &PageIndex {
        &self.index
    }


    fn rebuild_index(&mut self) {
        self.index = PageIndex::build(&self.documents);
    }
}
