//! Client-side PDF tools
//!
//! Keeps an ordered registry of loaded PDFs, numbers their pages across
//! documents, parses and validates page ranges, and runs batched,
//! progress-reporting operations on top of a pluggable document engine:
//!
//! - merge, split, remove pages, rotate (page copying via [`DocumentEngine`])
//! - watermark and optimize (in-place edits)
//! - export pages as PNG/JPEG images in a ZIP archive (via [`PageRasterizer`])
//!
//! [`LopdfEngine`] is the document engine used in production.

pub mod archive;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod lopdf_engine;
pub mod merge;
pub mod optimize;
pub mod orchestrator;
pub mod page_index;
pub mod progress;
pub mod ranges;
pub mod raster;
pub mod registry;
pub mod remove;
pub mod rotate;
pub mod selection;
pub mod split;
pub mod watermark;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{OperationOutput, ProcessMetrics, ToolCommand};
pub use config::ToolsConfig;
pub use engine::{DocumentEngine, DocumentMetadata, TextStamp};
pub use error::{
    ConfigError, EngineError, IndexError, LoadError, OperationError, ParseError, RangeError,
    RegistryError,
};
pub use export::ExportImagesRequest;
pub use lopdf_engine::LopdfEngine;
pub use merge::MergeRequest;
pub use optimize::OptimizeRequest;
pub use orchestrator::Orchestrator;
pub use page_index::PageIndex;
pub use progress::{OperationContext, Progress, ProgressReporter, ProgressStream};
pub use ranges::{format_ranges, parse_ranges, validate_ranges, validate_selection, PageRange, PageSpan};
pub use raster::{ImageFormat, PageRasterizer};
pub use registry::{DocumentId, LoadedDocument, PendingFile, Registry};
pub use remove::RemovePagesRequest;
pub use rotate::RotateRequest;
pub use selection::Selection;
pub use split::SplitRequest;
pub use tokio_util::sync::CancellationToken;
pub use watermark::{WatermarkPosition, WatermarkRequest};
