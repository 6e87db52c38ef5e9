use serde::{Deserialize, Serialize};

use crate::export::ExportImagesRequest;
use crate::merge::MergeRequest;
use crate::optimize::OptimizeRequest;
use crate::remove::RemovePagesRequest;
use crate::rotate::RotateRequest;
use crate::selection::Selection;
use crate::split::SplitRequest;
use crate::watermark::WatermarkRequest;

/// One user-facing command, as sent by the web surface
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ToolCommand {
    Merge(MergeRequest),
    Split(SplitRequest),
    RemovePages(RemovePagesRequest),
    Rotate(RotateRequest),
    Watermark(WatermarkRequest),
    Optimize(OptimizeRequest),
    ExportImages(ExportImagesRequest),
}

impl ToolCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCommand::Merge(_) => "merge",
            ToolCommand::Split(_) => "split",
            ToolCommand::RemovePages(_) => "remove_pages",
            ToolCommand::Rotate(_) => "rotate",
            ToolCommand::Watermark(_) => "watermark",
            ToolCommand::Optimize(_) => "optimize",
            ToolCommand::ExportImages(_) => "export_images",
        }
    }

    /// Page selection carried by the command, for commands that take one
    pub fn selection_mut(&mut self) -> Option<&mut Selection> {
        match self {
            ToolCommand::Merge(request) => Some(&mut request.selection),
            ToolCommand::RemovePages(request) => Some(&mut request.selection),
            ToolCommand::Rotate(request) => Some(&mut request.selection),
            ToolCommand::ExportImages(request) => Some(&mut request.selection),
            ToolCommand::Split(_) | ToolCommand::Watermark(_) | ToolCommand::Optimize(_) => None,
        }
    }
}

/// A produced file. Inputs are never modified; every result is new bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutput {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl OperationOutput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: u64,
    pub output_size_bytes: u64,
    pub output_count: usize,
    /// Filled in by the host, which owns the clock
    pub processing_time_ms: u64,
}

impl ProcessMetrics {
    pub fn new(input_size_bytes: u64, outputs: &[OperationOutput]) -> Self {
        Self {
            input_size_bytes,
            output_size_bytes: outputs.iter().map(|o| o.data.len() as u64).sum(),
            output_count: outputs.len(),
            processing_time_ms: 0,
        }
    }

    pub fn with_elapsed_ms(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ImageFormat;
    use crate::watermark::WatermarkPosition;

    #[test]
    fn test_command_deserializes_merge() {
        let json = r#"{"type":"Merge"}"#;
        let cmd: ToolCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, ToolCommand::Merge(ref r) if r.documents.is_empty()));
        assert_eq!(cmd.name(), "merge");
    }

    #[test]
    fn test_command_deserializes_split() {
        let json = r#"{
            "type":"Split",
            "document":"67e55044-10b1-426f-9247-bb680e5fe0c8",
            "ranges":[{"start":1,"end":3,"output_name":"a.pdf"}]
        }"#;
        let cmd: ToolCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ToolCommand::Split(request) => {
                assert_eq!(request.ranges.len(), 1);
                assert_eq!(request.ranges[0].output_name, "a.pdf");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_command_deserializes_export_and_watermark() {
        let json = r#"{"type":"ExportImages","selection":[1,4],"format":"jpeg","quality":0.8}"#;
        let cmd: ToolCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ToolCommand::ExportImages(request) => {
                assert_eq!(request.format, ImageFormat::Jpeg);
                assert_eq!(request.selection.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let json = r#"{
            "type":"Watermark",
            "document":"67e55044-10b1-426f-9247-bb680e5fe0c8",
            "text":"DRAFT",
            "position":"top-left"
        }"#;
        let cmd: ToolCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ToolCommand::Watermark(request) => {
                assert_eq!(request.position, WatermarkPosition::TopLeft);
                assert_eq!(request.opacity, 0.3);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_selection_mut_only_for_page_commands() {
        let mut merge: ToolCommand = serde_json::from_str(r#"{"type":"Merge"}"#).unwrap();
        let selection = merge.selection_mut().unwrap();
        assert!(selection.is_empty());
        *selection = Selection::from_globals([2, 3]);
        assert!(matches!(merge, ToolCommand::Merge(ref r) if r.selection.len() == 2));

        let mut split: ToolCommand = serde_json::from_str(
            r#"{"type":"Split","document":"67e55044-10b1-426f-9247-bb680e5fe0c8","ranges":[]}"#,
        )
        .unwrap();
        assert!(split.selection_mut().is_none());
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let result: Result<ToolCommand, _> = serde_json::from_str(r#"{"type":"Compress"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_metrics_sum_outputs() {
        let outputs = vec![
            OperationOutput::new("a.pdf", "application/pdf", vec![0; 10]),
            OperationOutput::new("b.pdf", "application/pdf", vec![0; 5]),
        ];
        let metrics = ProcessMetrics::new(100, &outputs).with_elapsed_ms(7);
        assert_eq!(metrics.output_size_bytes, 15);
        assert_eq!(metrics.output_count, 2);
        assert_eq!(metrics.processing_time_ms, 7);
    }
}
