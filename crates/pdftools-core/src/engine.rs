//! Document engine seam
//!
//! The orchestrator never touches PDF objects directly. Everything it needs
//! from a PDF library goes through [`DocumentEngine`]: parse bytes, create an
//! empty output, copy pages across documents, set rotation, stamp text and
//! serialize. [`crate::lopdf_engine::LopdfEngine`] is the production
//! implementation.

use serde::Serialize;

use crate::error::EngineError;

/// Descriptive metadata captured when a document is loaded
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// A single line of text drawn onto a page, in PDF user-space units
#[derive(Debug, Clone, PartialEq)]
pub struct TextStamp {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    /// Fill gray level, 0.0 (black) to 1.0 (white)
    pub gray: f64,
    /// Fill and stroke opacity, 0.0 to 1.0
    pub opacity: f64,
}

pub trait DocumentEngine {
    /// A parsed document, either loaded from bytes or created empty
    type Document;
    /// A page copied out of one document, not yet appended to another
    type Page;

    fn parse(&self, bytes: &[u8]) -> Result<Self::Document, EngineError>;

    fn page_count(&self, doc: &Self::Document) -> u32;

    fn metadata(&self, doc: &Self::Document) -> DocumentMetadata;

    fn create_empty(&self) -> Self::Document;

    /// Copy the given 1-based pages of `source` for insertion into `dest`.
    /// Pages come back in the order requested.
    fn copy_pages(
        &self,
        source: &Self::Document,
        dest: &mut Self::Document,
        pages: &[u32],
    ) -> Result<Vec<Self::Page>, EngineError>;

    /// Replace the page's rotation value. This is absolute, not additive.
    fn set_page_rotation(&self, page: &mut Self::Page, degrees: i32);

    /// Effective rotation of a page, including inherited values
    fn page_rotation(&self, doc: &Self::Document, page: u32) -> Result<i32, EngineError>;

    /// Append copied pages, in order, to a document made by `create_empty`
    fn append_pages(
        &self,
        dest: &mut Self::Document,
        pages: Vec<Self::Page>,
    ) -> Result<(), EngineError>;

    /// Page width and height in points
    fn page_size(&self, doc: &Self::Document, page: u32) -> Result<(f64, f64), EngineError>;

    fn draw_text(
        &self,
        doc: &mut Self::Document,
        page: u32,
        stamp: &TextStamp,
    ) -> Result<(), EngineError>;

    fn serialize(&self, doc: Self::Document) -> Result<Vec<u8>, EngineError>;
}
