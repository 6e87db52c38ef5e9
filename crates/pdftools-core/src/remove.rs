//! Remove pages from a document

use serde::Deserialize;

use crate::command::OperationOutput;
use crate::engine::DocumentEngine;
use crate::error::OperationError;
use crate::orchestrator::{output_name, Orchestrator};
use crate::progress::OperationContext;
use crate::ranges::{validate_selection, SelectionRule};
use crate::raster::PageRasterizer;
use crate::registry::{DocumentId, Registry};
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemovePagesRequest {
    pub document: DocumentId,
    /// Pages to delete, as global indices. Pages of other documents are
    /// ignored.
    pub selection: Selection,
    #[serde(default)]
    pub output_name: Option<String>,
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    /// Copy every page not selected into a new document. At least one page
    /// must be removed and at least one must remain.
    pub async fn remove_pages(
        &self,
        registry: &Registry,
        request: &RemovePagesRequest,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        let document = self.document(registry, request.document)?;
        let removed = request
            .selection
            .local_pages(registry.page_index(), document.id())?;
        validate_selection(&removed, document.page_count(), SelectionRule::Partial)?;

        let keep: Vec<u32> = (1..=document.page_count())
            .filter(|page| !removed.contains(page))
            .collect();
        tracing::info!(
            document = %document.id(),
            removed = removed.len(),
            remaining = keep.len(),
            "Removing pages"
        );
        ctx.progress.report(0, "Preparing page removal");

        let source = self.open(document)?;
        let mut output = self.engine().create_empty();
        let mut tally = self.tally(ctx, keep.len());
        self.copy_in_batches(
            &source,
            &mut output,
            &keep,
            ctx,
            |_, _| {},
            |copied| tally.advance(copied, "Copying remaining pages"),
        )
        .await?;

        let name = output_name(
            request.output_name.as_deref(),
            format!("{}_removed.pdf", document.stem()),
            "pdf",
        );
        let result = self.save(output, name, ctx)?;
        ctx.progress.finish("Pages removed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RangeError;
    use crate::testing::{orchestrator, page_labels, registry_with};
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remove_preserves_survivor_order() {
        let (registry, ids) = registry_with(&[("doc.pdf", 10)]);
        let request = RemovePagesRequest {
            document: ids[0],
            selection: Selection::from_globals([3, 4, 5]),
            output_name: None,
        };
        let result =
            block_on(orchestrator().remove_pages(&registry, &request, &OperationContext::silent()))
                .unwrap();

        let labels = page_labels(&result.data);
        assert_eq!(labels.len(), 7);
        assert_eq!(labels[3], "doc-Page-6");
        assert_eq!(result.name, "doc_removed.pdf");
    }

    #[test]
    fn test_remove_uses_document_local_projection() {
        let (registry, ids) = registry_with(&[("a.pdf", 3), ("b.pdf", 3)]);
        // Global 1 belongs to a and is ignored; global 5 is b's page 2
        let request = RemovePagesRequest {
            document: ids[1],
            selection: Selection::from_globals([1, 5]),
            output_name: Some("trimmed.pdf".into()),
        };
        let result =
            block_on(orchestrator().remove_pages(&registry, &request, &OperationContext::silent()))
                .unwrap();
        assert_eq!(page_labels(&result.data), vec!["b-Page-1", "b-Page-3"]);
        assert_eq!(result.name, "trimmed.pdf");
    }

    #[test]
    fn test_remove_all_pages_is_rejected() {
        let (registry, ids) = registry_with(&[("doc.pdf", 3)]);
        let request = RemovePagesRequest {
            document: ids[0],
            selection: Selection::from_globals([1, 2, 3]),
            output_name: None,
        };
        let result =
            block_on(orchestrator().remove_pages(&registry, &request, &OperationContext::silent()));
        assert_eq!(
            result.unwrap_err(),
            OperationError::Range(RangeError::EmptyOrFull {
                selected: 3,
                page_count: 3
            })
        );
    }

    #[test]
    fn test_remove_nothing_is_rejected() {
        let (registry, ids) = registry_with(&[("doc.pdf", 3)]);
        let request = RemovePagesRequest {
            document: ids[0],
            selection: Selection::new(),
            output_name: None,
        };
        let result =
            block_on(orchestrator().remove_pages(&registry, &request, &OperationContext::silent()));
        assert!(matches!(
            result,
            Err(OperationError::Range(RangeError::EmptyOrFull { selected: 0, .. }))
        ));
    }
}
