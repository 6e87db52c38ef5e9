//! Text watermark stamped on every page
//!
//! The stamp is gray Helvetica at 5% of the page's smaller dimension. The
//! document is modified in place on a fresh parse of its bytes; no pages are
//! copied.

use serde::Deserialize;

use crate::command::OperationOutput;
use crate::engine::{DocumentEngine, TextStamp};
use crate::error::OperationError;
use crate::orchestrator::{output_name, Orchestrator};
use crate::progress::{yield_now, OperationContext};
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, Registry};

const FONT_SIZE_RATIO: f64 = 0.05;
/// Approximate Helvetica advance width per character, relative to font size
const CHAR_WIDTH_RATIO: f64 = 0.6;
const STAMP_GRAY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatermarkRequest {
    pub document: DocumentId,
    pub text: String,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub position: WatermarkPosition,
    #[serde(default)]
    pub output_name: Option<String>,
}

fn default_opacity() -> f64 {
    0.3
}

impl WatermarkRequest {
    pub fn new(document: DocumentId, text: impl Into<String>) -> Self {
        Self {
            document,
            text: text.into(),
            opacity: default_opacity(),
            position: WatermarkPosition::default(),
            output_name: None,
        }
    }
}

/// The stamp for `text` on a `width` x `height` page
pub fn stamp_layout(
    text: &str,
    position: WatermarkPosition,
    opacity: f64,
    width: f64,
    height: f64,
) -> TextStamp {
    let font_size = width.min(height) * FONT_SIZE_RATIO;
    let text_width = font_size * text.chars().count() as f64 * CHAR_WIDTH_RATIO;
    let (x, y) = match position {
        WatermarkPosition::Center => (width / 2.0, height / 2.0),
        WatermarkPosition::TopLeft => (font_size, height - font_size),
        WatermarkPosition::TopRight => (width - text_width, height - font_size),
        WatermarkPosition::BottomLeft => (font_size, font_size),
        WatermarkPosition::BottomRight => (width - text_width, font_size),
    };
    TextStamp {
        text: text.to_string(),
        x,
        y,
        font_size,
        gray: STAMP_GRAY,
        opacity,
    }
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    pub async fn watermark(
        &self,
        registry: &Registry,
        request: &WatermarkRequest,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        let document = self.document(registry, request.document)?;
        let text = request.text.trim();
        if text.is_empty() {
            return Err(OperationError::InvalidRequest(
                "watermark text cannot be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&request.opacity) {
            return Err(OperationError::InvalidRequest(format!(
                "opacity must be between 0 and 1, got {}",
                request.opacity
            )));
        }

        tracing::info!(
            document = %document.id(),
            position = ?request.position,
            "Adding watermark"
        );
        ctx.progress.report(0, "Preparing watermark");

        let mut doc = self.open(document)?;
        let page_count = document.page_count();
        let batch_size = self.config().copy_batch_size.max(1) as u32;
        let mut tally = self.tally(ctx, page_count as usize);

        for page in 1..=page_count {
            if (page - 1) % batch_size == 0 {
                ctx.checkpoint()?;
            }
            let (width, height) = self.engine().page_size(&doc, page)?;
            let stamp = stamp_layout(text, request.position, request.opacity, width, height);
            self.engine().draw_text(&mut doc, page, &stamp)?;
            tally.advance(1, "Adding watermark");
            if page % batch_size == 0 {
                yield_now().await;
            }
        }

        let name = output_name(
            request.output_name.as_deref(),
            format!("{}_watermarked.pdf", document.stem()),
            "pdf",
        );
        let result = self.save(doc, name, ctx)?;
        ctx.progress.finish("Watermark added");
        Ok(result)
    }
}
