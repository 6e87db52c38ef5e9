//! Re-save a document with unused objects pruned and streams compressed

use serde::Deserialize;

use crate::command::OperationOutput;
use crate::engine::DocumentEngine;
use crate::error::OperationError;
use crate::orchestrator::{output_name, Orchestrator};
use crate::progress::OperationContext;
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, Registry};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptimizeRequest {
    pub document: DocumentId,
    #[serde(default)]
    pub output_name: Option<String>,
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    pub async fn optimize(
        &self,
        registry: &Registry,
        request: &OptimizeRequest,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        let document = self.document(registry, request.document)?;
        ctx.progress.report(0, "Loading document");
        let doc = self.open(document)?;

        let name = output_name(
            request.output_name.as_deref(),
            format!("{}_optimized.pdf", document.stem()),
            "pdf",
        );
        let result = self.save(doc, name, ctx)?;
        tracing::info!(
            document = %document.id(),
            before = document.byte_size(),
            after = result.data.len(),
            "Optimized document"
        );
        ctx.progress.finish("Optimization complete");
        Ok(result)
    }
}
