use thiserror::Error;

use crate::registry::DocumentId;

/// Failures raised by the document engine, rasterizer, image encoder or
/// archive builder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Not a valid PDF file (missing %PDF- header)")]
    NotAPdf,

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Missing object: {0}")]
    MissingObject(String),

    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),

    #[error("Failed to save PDF: {0}")]
    Save(String),

    #[error("Failed to render page: {0}")]
    Render(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Per-file load failures. One bad file never blocks the others.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Not a PDF file: {0}")]
    NotAPdf(String),

    #[error("File is too large ({size} bytes, limit is {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Corrupt PDF: {0}")]
    Corrupt(String),
}

/// Out-of-range lookups against the global page index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Document {0} is not loaded")]
    UnknownDocument(DocumentId),

    #[error("Page {page} is out of range for document {document} (1-{page_count})")]
    PageOutOfRange {
        document: DocumentId,
        page: u32,
        page_count: u32,
    },

    #[error("Global page {index} is out of range (1-{total})")]
    GlobalOutOfRange { index: u32, total: u32 },
}

/// Why a range-expression token was dropped. Collected for diagnostics;
/// parsing never fails as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty token")]
    Empty,

    #[error("Invalid page number: {0}")]
    NotANumber(String),

    #[error("Invalid range format: {0}")]
    Malformed(String),

    #[error("Invalid range: start {start} > end {end}")]
    Reversed { start: u32, end: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Pages {start}-{end} are outside the document (1-{page_count})")]
    OutOfBounds { start: u32, end: u32, page_count: u32 },

    #[error("Ranges {first} and {second} overlap")]
    Overlap { first: String, second: String },

    #[error("Range {index} has no output name")]
    EmptyName { index: usize },

    #[error("Selection of {selected} page(s) is not allowed for a {page_count}-page document")]
    EmptyOrFull { selected: usize, page_count: u32 },
}

/// Failure of one orchestrated operation. Validation variants are raised
/// before any engine work starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("PDF operation failed: {0}")]
    EngineFailure(#[from] EngineError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Document {0} is not loaded")]
    DocumentNotFound(DocumentId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Document {0} is not loaded")]
    UnknownDocument(DocumentId),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Document name cannot be empty")]
    EmptyName,
}
