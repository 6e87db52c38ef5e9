//! Operation orchestrator
//!
//! Runs merge, split, remove-pages, rotate, watermark, optimize and
//! image-export against a borrowed [`Registry`]. Holding `&Registry` for the
//! whole operation keeps the document list and page index frozen until the
//! operation finishes.
//!
//! Page copies run in batches of `copy_batch_size`. Between batches the
//! orchestrator checks for cancellation and yields to the executor. Output
//! page order always matches the order pages were requested in.
//!
//! The operations themselves live in their own modules (`merge`, `split`,
//! `remove`, `rotate`, `watermark`, `optimize`, `export`).

use crate::command::{OperationOutput, ToolCommand};
use crate::config::{ToolsConfig, PDF_MIME_TYPE};
use crate::engine::DocumentEngine;
use crate::error::OperationError;
use crate::progress::{scaled, yield_now, OperationContext};
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, LoadedDocument, Registry};

pub struct Orchestrator<E, R> {
    engine: E,
    rasterizer: R,
    config: ToolsConfig,
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    pub fn new(engine: E, rasterizer: R, config: ToolsConfig) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "Orchestrator configured with out-of-range values");
        }
        Self {
            engine,
            rasterizer,
            config,
        }
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Remove a document and release what the rasterizer holds for it
    pub fn remove_document(&self, registry: &mut Registry, id: DocumentId) -> bool {
        match registry.remove(id) {
            Some(removed) => {
                self.rasterizer.release(removed.id());
                true
            }
            None => false,
        }
    }

    /// Empty the registry, releasing every document it held
    pub fn clear_documents(&self, registry: &mut Registry) {
        let ids: Vec<DocumentId> = registry.list().iter().map(|d| d.id()).collect();
        registry.clear();
        for id in ids {
            self.rasterizer.release(id);
        }
    }

    /// Run one command to completion
    pub async fn execute(
        &self,
        registry: &Registry,
        command: ToolCommand,
        ctx: &OperationContext,
    ) -> Result<Vec<OperationOutput>, OperationError> {
        tracing::info!(operation = command.name(), "Starting operation");
        let result = match command {
            ToolCommand::Merge(request) => self.merge(registry, &request, ctx).await.map(|o| vec![o]),
            ToolCommand::Split(request) => self.split(registry, &request, ctx).await,
            ToolCommand::RemovePages(request) => self
                .remove_pages(registry, &request, ctx)
                .await
                .map(|o| vec![o]),
            ToolCommand::Rotate(request) => self.rotate(registry, &request, ctx).await.map(|o| vec![o]),
            ToolCommand::Watermark(request) => self
                .watermark(registry, &request, ctx)
                .await
                .map(|o| vec![o]),
            ToolCommand::Optimize(request) => self
                .optimize(registry, &request, ctx)
                .await
                .map(|o| vec![o]),
            ToolCommand::ExportImages(request) => self
                .export_images(registry, &request, ctx)
                .await
                .map(|o| vec![o]),
        };

        match &result {
            Ok(outputs) => tracing::info!(outputs = outputs.len(), "Operation complete"),
            Err(e) => tracing::warn!(error = %e, "Operation failed"),
        }
        result
    }

    pub(crate) fn document<'r>(
        &self,
        registry: &'r Registry,
        id: DocumentId,
    ) -> Result<&'r LoadedDocument, OperationError> {
        registry.get(id).ok_or(OperationError::DocumentNotFound(id))
    }

    pub(crate) fn open(&self, document: &LoadedDocument) -> Result<E::Document, OperationError> {
        Ok(self.engine.parse(document.content())?)
    }

    /// Copy `pages` of `source` into `dest` in order, batch by batch.
    /// `transform` sees each copied page with its source page number before
    /// it is appended; `on_batch` receives the number of pages just copied.
    pub(crate) async fn copy_in_batches<T, P>(
        &self,
        source: &E::Document,
        dest: &mut E::Document,
        pages: &[u32],
        ctx: &OperationContext,
        mut transform: T,
        mut on_batch: P,
    ) -> Result<(), OperationError>
    where
        T: FnMut(u32, &mut E::Page),
        P: FnMut(usize),
    {
        let batch_size = self.config.copy_batch_size.max(1);
        for batch in pages.chunks(batch_size) {
            ctx.checkpoint()?;
            let mut copied = self.engine.copy_pages(source, dest, batch)?;
            for (page, &number) in copied.iter_mut().zip(batch) {
                transform(number, page);
            }
            self.engine.append_pages(dest, copied)?;
            on_batch(batch.len());
            yield_now().await;
        }
        Ok(())
    }

    /// Serialize a finished document as the single output of an operation
    pub(crate) fn save(
        &self,
        doc: E::Document,
        name: String,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        ctx.checkpoint()?;
        ctx.progress.report(self.config.work_ceiling(), "Saving");
        let data = self.engine.serialize(doc)?;
        Ok(OperationOutput::new(name, PDF_MIME_TYPE, data))
    }

    pub(crate) fn tally<'c>(&self, ctx: &'c OperationContext, total: usize) -> Tally<'c> {
        Tally {
            ctx,
            done: 0,
            total,
            ceiling: self.config.work_ceiling(),
        }
    }
}

/// Work counter mapped onto `[0, work_ceiling]`
pub(crate) struct Tally<'c> {
    ctx: &'c OperationContext,
    done: usize,
    total: usize,
    ceiling: u8,
}

impl Tally<'_> {
    pub(crate) fn advance(&mut self, units: usize, label: &str) {
        self.done += units;
        self.ctx
            .progress
            .report(scaled(self.done, self.total, 0, self.ceiling), label);
    }
}

/// Normalize a user-supplied output file name, falling back to `default`
pub(crate) fn output_name(requested: Option<&str>, default: String, extension: &str) -> String {
    let name = match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default,
    };
    let suffix = format!(".{}", extension);
    if name.to_ascii_lowercase().ends_with(&suffix) {
        name
    } else {
        name + &suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_defaults_and_extension() {
        assert_eq!(output_name(None, "merged.pdf".into(), "pdf"), "merged.pdf");
        assert_eq!(output_name(Some("  "), "merged.pdf".into(), "pdf"), "merged.pdf");
        assert_eq!(output_name(Some("combined"), "merged.pdf".into(), "pdf"), "combined.pdf");
        assert_eq!(output_name(Some("Report.PDF"), "x.pdf".into(), "pdf"), "Report.PDF");
        assert_eq!(output_name(None, "scan_images".into(), "zip"), "scan_images.zip");
    }
}
