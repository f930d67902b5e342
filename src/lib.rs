//! COCO to YOLO dataset converter
//!
//! This library converts COCO detection/segmentation documents into YOLO label
//! trees, merges converted datasets by collapsing each source onto one class id,
//! and renders ground-truth overlays to check the result.

pub mod coco;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod labels;
pub mod merge;
pub mod normalize;
pub mod render;
pub mod simplify;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use coco::{load_document, AnnotationRecord, CategoryRecord, CocoDocument, ImageRecord};
pub use config::{
    ClassIdMode, ConvertArgs, ConvertOptions, LabelLayout, MergeArgs, MissingImagePolicy,
    RenderArgs, SimplifyArgs,
};
pub use dataset::{process_dataset, DatasetReport};
pub use error::{Coco2YoloError, Result};
pub use io::{read_summary, DatasetSummary};
pub use merge::{merge_datasets, write_merged_summary, MergeSource};
pub use normalize::{normalize_box, normalize_polygon};
pub use render::{render_dataset, ImageCodec, RasterCodec};
pub use simplify::simplify_document;
pub use types::{
    ClassTable, DatasetRole, LabelLine, NormalizedBox, NormalizedPolygon, ProcessingStats,
};
