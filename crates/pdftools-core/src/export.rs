//! Export selected pages as images in a ZIP archive
//!
//! Selected global pages are resolved to their owning documents through the
//! page index. Pages render in batches of `render_batch_size`; a batch runs
//! concurrently and must finish before the next one starts, so at most one
//! batch of bitmaps is alive at a time.

use futures::stream::{FuturesOrdered, StreamExt};
use serde::Deserialize;

use crate::archive::ArchiveBuilder;
use crate::command::OperationOutput;
use crate::config::ZIP_MIME_TYPE;
use crate::engine::DocumentEngine;
use crate::error::{EngineError, OperationError, RangeError};
use crate::orchestrator::{output_name, Orchestrator};
use crate::progress::{yield_now, OperationContext};
use crate::raster::{encode_image, ImageFormat, PageRasterizer};
use crate::registry::{LoadedDocument, Registry};
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportImagesRequest {
    /// Pages to export, as global indices
    pub selection: Selection,
    #[serde(default)]
    pub format: ImageFormat,
    /// JPEG quality in `[0, 1]`
    #[serde(default = "default_quality")]
    pub quality: f32,
    #[serde(default)]
    pub output_name: Option<String>,
}

fn default_quality() -> f32 {
    0.92
}

impl ExportImagesRequest {
    pub fn new(selection: Selection, format: ImageFormat) -> Self {
        Self {
            selection,
            format,
            quality: default_quality(),
            output_name: None,
        }
    }
}

/// Archive entry name for one exported page
pub fn image_entry_name(document: &LoadedDocument, page: u32, format: ImageFormat) -> String {
    format!("{}_page_{}.{}", document.stem(), page, format.extension())
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    pub async fn export_images(
        &self,
        registry: &Registry,
        request: &ExportImagesRequest,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        let index = registry.page_index();
        if request.selection.is_empty() {
            return Err(RangeError::EmptyOrFull {
                selected: 0,
                page_count: index.total_pages(),
            }
            .into());
        }

        let mut jobs = Vec::with_capacity(request.selection.len());
        for global in request.selection.iter() {
            let (id, page) = index.resolve(global)?;
            jobs.push((self.document(registry, id)?, page));
        }

        tracing::info!(
            pages = jobs.len(),
            format = ?request.format,
            "Exporting pages as images"
        );
        ctx.progress.report(0, "Preparing export");

        let scale = self.config().render_scale;
        let batch_size = self.config().render_batch_size.max(1);
        let mut archive = ArchiveBuilder::new();
        let mut tally = self.tally(ctx, jobs.len());

        for batch in jobs.chunks(batch_size) {
            ctx.checkpoint()?;
            let mut rendering: FuturesOrdered<_> = batch
                .iter()
                .map(|&(document, page)| self.render_encoded(document, page, scale, request))
                .collect();

            while let Some(rendered) = rendering.next().await {
                let (name, bytes) = rendered?;
                archive.add_entry(&name, &bytes)?;
                tally.advance(1, &format!("Rendered {}", name));
            }
            yield_now().await;
        }

        ctx.checkpoint()?;
        ctx.progress
            .report(self.config().work_ceiling(), "Creating archive");
        let data = archive.finish()?;

        let default_name = format!("{}_images.zip", jobs[0].0.stem());
        let name = output_name(request.output_name.as_deref(), default_name, "zip");
        ctx.progress.finish("Export complete");
        Ok(OperationOutput::new(name, ZIP_MIME_TYPE, data))
    }

    async fn render_encoded(
        &self,
        document: &LoadedDocument,
        page: u32,
        scale: f32,
        request: &ExportImagesRequest,
    ) -> Result<(String, Vec<u8>), EngineError> {
        let bitmap = self.rasterizer().render_page(document, page, scale).await?;
        let bytes = encode_image(&bitmap, request.format, request.quality)?;
        Ok((image_entry_name(document, page, request.format), bytes))
    }
}
