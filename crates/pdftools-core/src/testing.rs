//! Test fixtures: generated PDFs, page inspectors, a blank rasterizer
//!
//! Available to unit tests and, through the `test-util` feature, to
//! integration tests and dependent crates.

use image::{Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, Stream};

use crate::config::ToolsConfig;
use crate::error::EngineError;
use crate::lopdf_engine::LopdfEngine;
use crate::orchestrator::Orchestrator;
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, LoadedDocument, Registry};

/// Build a PDF with `num_pages` pages whose content streams show
/// `<prefix>-Page-<n>`, so page order can be checked after processing.
pub fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for page_num in 0..num_pages {
        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            content_prefix,
            page_num + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// The `<prefix>-Page-<n>` label of every page, in page order
pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').unwrap() + 1;
            let end = start + text[start..].find(')').unwrap();
            text[start..end].to_string()
        })
        .collect()
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

pub fn page_rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            doc.get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

/// Rasterizer that returns a white bitmap sized from the scale factor
pub struct BlankRasterizer;

#[async_trait::async_trait(?Send)]
impl PageRasterizer for BlankRasterizer {
    async fn render_page(
        &self,
        document: &LoadedDocument,
        page: u32,
        scale: f32,
    ) -> Result<RgbaImage, EngineError> {
        if page == 0 || page > document.page_count() {
            return Err(EngineError::Render(format!("no page {}", page)));
        }
        let side = (10.0 * scale).round().max(1.0) as u32;
        Ok(RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255])))
    }
}

pub fn orchestrator() -> Orchestrator<LopdfEngine, BlankRasterizer> {
    orchestrator_with(ToolsConfig::default())
}

pub fn orchestrator_with(config: ToolsConfig) -> Orchestrator<LopdfEngine, BlankRasterizer> {
    Orchestrator::new(LopdfEngine, BlankRasterizer, config)
}

/// Load one test document per `(name, pages)` pair. Page labels use the
/// name without its extension as prefix.
pub fn registry_with(docs: &[(&str, u32)]) -> (Registry, Vec<DocumentId>) {
    let mut registry = Registry::default();
    let ids = docs
        .iter()
        .map(|&(name, pages)| {
            let prefix = name.trim_end_matches(".pdf");
            registry
                .load(&LopdfEngine, name, create_test_pdf(pages, prefix))
                .unwrap()
                .id()
        })
        .collect();
    (registry, ids)
}
