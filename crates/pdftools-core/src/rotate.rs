//! Rotate selected pages
//!
//! Rotation replaces the page's `/Rotate` value; it is not added to the
//! existing rotation. Rotating a page by 90 twice leaves it at 90.

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
pub struct RotateRequest {
    pub document: DocumentId,
    /// Pages to rotate, as global indices
    pub selection: Selection,
    #[serde(default = "default_degrees")]
    pub degrees: i32,
    #[serde(default)]
    pub output_name: Option<String>,
}

fn default_degrees() -> i32 {
    90
}

/// Reduce an angle to `0..360`. Only quarter turns are valid page rotations.
pub fn normalize_rotation(degrees: i32) -> Result<i32, OperationError> {
    let normalized = degrees.rem_euclid(360);
    if normalized % 90 != 0 {
        return Err(OperationError::InvalidRequest(format!(
            "rotation must be a multiple of 90 degrees, got {}",
            degrees
        )));
    }
    Ok(normalized)
}

impl<E, R> Orchestrator<E, R>
where
    E: DocumentEngine,
    R: PageRasterizer,
{
    /// Copy every page into a new document, setting the rotation of the
    /// selected ones on the way
    pub async fn rotate(
        &self,
        registry: &Registry,
        request: &RotateRequest,
        ctx: &OperationContext,
    ) -> Result<OperationOutput, OperationError> {
        let document = self.document(registry, request.document)?;
        let degrees = normalize_rotation(request.degrees)?;
        let selected = request
            .selection
            .local_pages(registry.page_index(), document.id())?;
        validate_selection(&selected, document.page_count(), SelectionRule::NonEmpty)?;

        tracing::info!(
            document = %document.id(),
            pages = selected.len(),
            degrees,
            "Rotating pages"
        );
        ctx.progress.report(0, "Preparing rotation");

        let source = self.open(document)?;
        let pages: Vec<u32> = (1..=document.page_count()).collect();
        let mut output = self.engine().create_empty();
        let mut tally = self.tally(ctx, pages.len());
        let engine = self.engine();
        self.copy_in_batches(
            &source,
            &mut output,
            &pages,
            ctx,
            |number, page| {
                if selected.contains(&number) {
                    engine.set_page_rotation(page, degrees);
                }
            },
            |copied| tally.advance(copied, "Rotating pages"),
        )
        .await?;

        let name = output_name(
            request.output_name.as_deref(),
            format!("{}_rotated.pdf", document.stem()),
            "pdf",
        );
        let result = self.save(output, name, ctx)?;
        ctx.progress.finish("Rotation complete");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lopdf_engine::LopdfEngine;
    use crate::testing::{orchestrator, page_labels, page_rotations, registry_with};
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    fn rotate_pages(bytes: Vec<u8>, pages: &[u32], degrees: i32) -> Vec<u8> {
        let mut registry = crate::registry::Registry::default();
        let id = registry.load(&LopdfEngine, "doc.pdf", bytes).unwrap().id();
        let request = RotateRequest {
            document: id,
            selection: Selection::from_globals(pages.iter().copied()),
            degrees,
            output_name: None,
        };
        block_on(orchestrator().rotate(&registry, &request, &OperationContext::silent()))
            .unwrap()
            .data
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(90).unwrap(), 90);
        assert_eq!(normalize_rotation(-90).unwrap(), 270);
        assert_eq!(normalize_rotation(450).unwrap(), 90);
        assert_eq!(normalize_rotation(-360).unwrap(), 0);
        assert!(normalize_rotation(45).is_err());
    }

    #[test]
    fn test_rotate_selected_pages_only() {
        let (registry, ids) = registry_with(&[("doc.pdf", 4)]);
        let request = RotateRequest {
            document: ids[0],
            selection: Selection::from_globals([2, 4]),
            degrees: 180,
            output_name: None,
        };
        let result =
            block_on(orchestrator().rotate(&registry, &request, &OperationContext::silent()))
                .unwrap();

        assert_eq!(result.name, "doc_rotated.pdf");
        assert_eq!(page_rotations(&result.data), vec![0, 180, 0, 180]);
        assert_eq!(
            page_labels(&result.data),
            vec!["doc-Page-1", "doc-Page-2", "doc-Page-3", "doc-Page-4"]
        );
    }

    #[test]
    fn test_rotation_replaces_instead_of_adding() {
        let once = rotate_pages(crate::testing::create_test_pdf(2, "doc"), &[1], 90);
        let twice = rotate_pages(once, &[1], 90);
        assert_eq!(page_rotations(&twice), vec![90, 0]);
    }

    #[test]
    fn test_later_rotation_wins() {
        let turned = rotate_pages(crate::testing::create_test_pdf(1, "doc"), &[1], 270);
        assert_eq!(page_rotations(&turned), vec![270]);
        let again = rotate_pages(turned, &[1], 360 - 270);
        assert_eq!(page_rotations(&again), vec![90]);
        let restored = rotate_pages(again, &[1], 0);
        assert_eq!(page_rotations(&restored), vec![0]);
    }

    #[test]
    fn test_negative_angle_matches_positive_equivalent() {
        let a = rotate_pages(crate::testing::create_test_pdf(1, "doc"), &[1], -90);
        let b = rotate_pages(crate::testing::create_test_pdf(1, "doc"), &[1], 270);
        assert_eq!(page_rotations(&a), page_rotations(&b));
    }

    #[test]
    fn test_rotate_rejects_empty_selection_and_bad_angle() {
        let (registry, ids) = registry_with(&[("doc.pdf", 2)]);
        let mut request = RotateRequest {
            document: ids[0],
            selection: Selection::new(),
            degrees: 90,
            output_name: None,
        };
        assert!(matches!(
            block_on(orchestrator().rotate(&registry, &request, &OperationContext::silent())),
            Err(OperationError::Range(_))
        ));

        request.selection = Selection::from_globals([1]);
        request.degrees = 30;
        assert!(matches!(
            block_on(orchestrator().rotate(&registry, &request, &OperationContext::silent())),
            Err(OperationError::InvalidRequest(_))
        ));
    }
}
