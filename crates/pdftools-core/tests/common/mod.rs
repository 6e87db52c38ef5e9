//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use image::RgbaImage;
use pdftools_core::engine::{DocumentEngine, DocumentMetadata, TextStamp};
use pdftools_core::lopdf_engine::{LopdfDocument, LopdfPage};
use pdftools_core::{DocumentId, EngineError, LoadedDocument, LopdfEngine, PageRasterizer};

pub use pdftools_core::testing::{
    create_test_pdf, orchestrator, orchestrator_with, page_count, page_labels, registry_with,
    BlankRasterizer,
};

/// Route engine logs to the test harness output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Rasterizer that records which documents it was asked to forget
#[derive(Default)]
pub struct RecordingRasterizer {
    pub released: RefCell<Vec<DocumentId>>,
}

#[async_trait(?Send)]
impl PageRasterizer for RecordingRasterizer {
    async fn render_page(
        &self,
        document: &LoadedDocument,
        page: u32,
        scale: f32,
    ) -> Result<RgbaImage, EngineError> {
        BlankRasterizer.render_page(document, page, scale).await
    }

    fn release(&self, document: DocumentId) {
        self.released.borrow_mut().push(document);
    }
}

/// Rasterizer that fails on one page number
pub struct FailingRasterizer {
    pub fail_on: u32,
    pub rendered: Cell<usize>,
}

#[async_trait(?Send)]
impl PageRasterizer for FailingRasterizer {
    async fn render_page(
        &self,
        _document: &LoadedDocument,
        page: u32,
        _scale: f32,
    ) -> Result<RgbaImage, EngineError> {
        if page == self.fail_on {
            return Err(EngineError::Render(format!("page {} exploded", page)));
        }
        self.rendered.set(self.rendered.get() + 1);
        Ok(RgbaImage::new(2, 2))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Copy,
    Serialize,
}

/// lopdf engine that fails at one stage
pub struct FailingEngine {
    pub fail_at: FailAt,
}

impl DocumentEngine for FailingEngine {
    type Document = LopdfDocument;
    type Page = LopdfPage;

    fn parse(&self, bytes: &[u8]) -> Result<LopdfDocument, EngineError> {
        LopdfEngine.parse(bytes)
    }

    fn page_count(&self, doc: &LopdfDocument) -> u32 {
        LopdfEngine.page_count(doc)
    }

    fn metadata(&self, doc: &LopdfDocument) -> DocumentMetadata {
        LopdfEngine.metadata(doc)
    }

    fn create_empty(&self) -> LopdfDocument {
        LopdfEngine.create_empty()
    }

    fn copy_pages(
        &self,
        source: &LopdfDocument,
        dest: &mut LopdfDocument,
        pages: &[u32],
    ) -> Result<Vec<LopdfPage>, EngineError> {
        if self.fail_at == FailAt::Copy {
            return Err(EngineError::MissingObject("simulated copy failure".into()));
        }
        LopdfEngine.copy_pages(source, dest, pages)
    }

    fn set_page_rotation(&self, page: &mut LopdfPage, degrees: i32) {
        LopdfEngine.set_page_rotation(page, degrees)
    }

    fn page_rotation(&self, doc: &LopdfDocument, page: u32) -> Result<i32, EngineError> {
        LopdfEngine.page_rotation(doc, page)
    }

    fn append_pages(
        &self,
        dest: &mut LopdfDocument,
        pages: Vec<LopdfPage>,
    ) -> Result<(), EngineError> {
        LopdfEngine.append_pages(dest, pages)
    }

    fn page_size(&self, doc: &LopdfDocument, page: u32) -> Result<(f64, f64), EngineError> {
        LopdfEngine.page_size(doc, page)
    }

    fn draw_text(
        &self,
        doc: &mut LopdfDocument,
        page: u32,
        stamp: &TextStamp,
    ) -> Result<(), EngineError> {
        LopdfEngine.draw_text(doc, page, stamp)
    }

    fn serialize(&self, doc: LopdfDocument) -> Result<Vec<u8>, EngineError> {
        if self.fail_at == FailAt::Serialize {
            return Err(EngineError::Save("simulated save failure".into()));
        }
        LopdfEngine.serialize(doc)
    }
}
