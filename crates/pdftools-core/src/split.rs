//! Split one document into several, one output per page range

use serde::Deserialize;

use crate::command::OperationOutput;
use crate::config::PDF_MIME_TYPE;
use crate::engine::DocumentEngine;
use crate::error::OperationError;
use crate::orchestrator::Orchestrator;
use crate::progress::OperationContext;
use crate::ranges::{parse_ranges, validate_ranges, PageRange};
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, LoadedDocument, Registry};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SplitRequest {
    pub document: DocumentId,
    pub ranges: Vec<PageRange>,
}

impl SplitRequest {
    /// Build a request from a range expression, naming every range
    /// `<stem>_pages_<start>-<end>.pdf`
    pub fn from_expression(document: &LoadedDocument, expression: &str) -> Self {
        let ranges = parse_ranges(expression)
            .into_iter()
            .map(|span| PageRange::with_default_name(span, document.stem()))
            .collect();
        Self {
            document: document.id(),
            ranges,
        }
    }
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    /// Produce one output per range, in request order
    pub async fn split(
        &self,
        registry: &Registry,
        request: &SplitRequest,
        ctx: &OperationContext,
    ) -> Result<Vec<OperationOutput>, OperationError> {
        let document = self.document(registry, request.document)?;
        if request.ranges.is_empty() {
            return Err(OperationError::InvalidRequest("no page ranges given".into()));
        }
        validate_ranges(&request.ranges, document.page_count())?;

        tracing::info!(
            document = %document.id(),
            ranges = request.ranges.len(),
            "Splitting document"
        );
        ctx.progress.report(0, "Preparing split");

        let source = self.open(document)?;
        let mut tally = self.tally(ctx, request.ranges.len());
        let mut outputs = Vec::with_capacity(request.ranges.len());

        for range in &request.ranges {
            let pages: Vec<u32> = range.span().pages().collect();
            let mut output = self.engine().create_empty();
            self.copy_in_batches(&source, &mut output, &pages, ctx, |_, _| {}, |_| {})
                .await?;

            ctx.checkpoint()?;
            let data = self.engine().serialize(output)?;
            outputs.push(OperationOutput::new(
                range.output_name.trim(),
                PDF_MIME_TYPE,
                data,
            ));
            tally.advance(1, &format!("Created {}", range.output_name.trim()));
        }

        ctx.progress.finish("Split complete");
        Ok(outputs)
    }
}
