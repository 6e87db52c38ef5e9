//! In-memory ZIP archive for image export

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::EngineError;

/// Builds a ZIP archive in memory. Entries are stored uncompressed since
/// PNG and JPEG payloads are already compressed.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
    options: SimpleFileOptions,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        }
    }

    /// Add an entry and return the name it was stored under. A name that is
    /// already taken gets a `_2`, `_3`, ... suffix before its extension.
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<String, EngineError> {
        let name = self.unique_name(name);
        self.writer
            .start_file(name.as_str(), self.options)
            .map_err(|e| EngineError::Archive(format!("Failed to create entry {}: {}", name, e)))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| EngineError::Archive(format!("Failed to write entry {}: {}", name, e)))?;
        self.names.insert(name.clone());
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, EngineError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| EngineError::Archive(format!("Failed to finalize archive: {}", e)))?;
        Ok(cursor.into_inner())
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }
        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
            _ => (name, ""),
        };
        (2..)
            .map(|n| format!("{}_{}{}", stem, n, ext))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}
