//! Merge documents into one
//!
//! Documents are concatenated in request order (registry order when the
//! request names none). A document with selected pages contributes only
//! those pages, ascending; a document with no selected pages contributes
//! all of them.

use serde::Deserialize;

use crate::command::OperationOutput;
use crate::engine::DocumentEngine;
use crate::error::OperationError;
use crate::orchestrator::{output_name, Orchestrator};
use crate::progress::OperationContext;
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, Registry};
use crate::selection::Selection;

pub const DEFAULT_MERGE_NAME: &str = "merged.pdf";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergeRequest {
    /// Documents to merge, in output order. Empty means every loaded document.
    pub documents: Vec<DocumentId>,
    pub selection: Selection,
    pub output_name: Option<String>,
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    pub async fn merge(
        &self,
        registry: &Registry,
        request: &MergeRequest,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        let ids: Vec<DocumentId> = if request.documents.is_empty() {
            registry.list().iter().map(|d| d.id()).collect()
        } else {
            request.documents.clone()
        };
        if ids.is_empty() {
            return Err(OperationError::InvalidRequest("no documents to merge".into()));
        }

        let index = registry.page_index();
        let mut plan = Vec::with_capacity(ids.len());
        for id in ids {
            let document = self.document(registry, id)?;
            let selected = request.selection.local_pages(index, id)?;
            let pages: Vec<u32> = if selected.is_empty() {
                (1..=document.page_count()).collect()
            } else {
                selected.into_iter().collect()
            };
            plan.push((document, pages));
        }

        let total: usize = plan.iter().map(|(_, pages)| pages.len()).sum();
        tracing::info!(documents = plan.len(), pages = total, "Merging documents");
        ctx.progress.report(0, "Preparing merge");

        let mut output = self.engine().create_empty();
        let mut tally = self.tally(ctx, total);
        for (document, pages) in &plan {
            let source = self.open(document)?;
            let label = format!("Merging {}", document.name());
            self.copy_in_batches(
                &source,
                &mut output,
                pages,
                ctx,
                |_, _| {},
                |copied| tally.advance(copied, &label),
            )
            .await?;
        }

        let name = output_name(
            request.output_name.as_deref(),
            DEFAULT_MERGE_NAME.to_string(),
            "pdf",
        );
        let result = self.save(output, name, ctx)?;
        ctx.progress.finish("Merge complete");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressReporter;
    use crate::testing::{orchestrator, page_labels, registry_with};
    use futures::executor::block_on;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_all_documents_in_order() {
        let (registry, _) = registry_with(&[("a.pdf", 2), ("b.pdf", 3)]);
        let result = block_on(orchestrator().merge(
            &registry,
            &MergeRequest::default(),
            &OperationContext::silent(),
        ))
        .unwrap();

        assert_eq!(result.name, "merged.pdf");
        assert_eq!(result.mime_type, "application/pdf");
        assert_eq!(
            page_labels(&result.data),
            vec!["a-Page-1", "a-Page-2", "b-Page-1", "b-Page-2", "b-Page-3"]
        );
    }

    #[test]
    fn test_merge_respects_request_order() {
        let (registry, ids) = registry_with(&[("a.pdf", 1), ("b.pdf", 1)]);
        let request = MergeRequest {
            documents: vec![ids[1], ids[0]],
            output_name: Some("swapped".into()),
            ..Default::default()
        };
        let result =
            block_on(orchestrator().merge(&registry, &request, &OperationContext::silent()))
                .unwrap();
        assert_eq!(result.name, "swapped.pdf");
        assert_eq!(page_labels(&result.data), vec!["b-Page-1", "a-Page-1"]);
    }

    #[test]
    fn test_merge_uses_selection_per_document() {
        let (registry, _) = registry_with(&[("a.pdf", 3), ("b.pdf", 3)]);
        // Global 2 is a's page 2; b has nothing selected and is copied whole
        let request = MergeRequest {
            selection: Selection::from_globals([2]),
            ..Default::default()
        };
        let result =
            block_on(orchestrator().merge(&registry, &request, &OperationContext::silent()))
                .unwrap();
        assert_eq!(
            page_labels(&result.data),
            vec!["a-Page-2", "b-Page-1", "b-Page-2", "b-Page-3"]
        );
    }

    #[test]
    fn test_merge_empty_registry_is_rejected() {
        let (registry, _) = registry_with(&[]);
        let result = block_on(orchestrator().merge(
            &registry,
            &MergeRequest::default(),
            &OperationContext::silent(),
        ));
        assert!(matches!(result, Err(OperationError::InvalidRequest(_))));
    }

    #[test]
    fn test_merge_unknown_document() {
        let (registry, _) = registry_with(&[("a.pdf", 1)]);
        let missing = DocumentId::new();
        let request = MergeRequest {
            documents: vec![missing],
            ..Default::default()
        };
        let result =
            block_on(orchestrator().merge(&registry, &request, &OperationContext::silent()));
        assert_eq!(result.unwrap_err(), OperationError::DocumentNotFound(missing));
    }

    #[test]
    fn test_merge_progress_is_monotonic_and_ends_at_100() {
        let (registry, _) = registry_with(&[("a.pdf", 12), ("b.pdf", 9)]);
        let (reporter, stream) = ProgressReporter::channel();
        let ctx = OperationContext::new(reporter);

        block_on(orchestrator().merge(&registry, &MergeRequest::default(), &ctx)).unwrap();
        drop(ctx);

        let percents: Vec<u8> = block_on(stream.map(|p| p.percent).collect());
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert_eq!(percents.iter().filter(|&&p| p == 100).count(), 1);
        assert!(percents.contains(&90));
    }
}
