use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::error::{Coco2YoloError, Result};

/// Converts a directory of COCO documents (train/validation/test) to YOLO label trees.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ConvertArgs {
    /// Directory holding train.json, validation.json and test.json plus one
    /// image folder per document named after the document stem
    #[arg(short = 'd', long = "coco_dir")]
    pub coco_dir: String,

    /// Root of the YOLO dataset to create
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: String,

    /// Label layout: one combined file per image, or split bbox/mask files
    #[arg(long = "layout", value_enum, default_value = "split")]
    pub layout: LabelLayout,

    /// Source of the class id written at the head of each label line
    #[arg(long = "class_ids", value_enum, default_value = "category")]
    pub class_ids: ClassIdMode,

    /// What to do when an image referenced by a document is missing on disk
    #[arg(long = "on_missing_image", value_enum, default_value = "abort")]
    pub on_missing_image: MissingImagePolicy,
}

/// Merges converted YOLO datasets, collapsing each source onto one class id.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct MergeArgs {
    /// Root directories of the converted datasets to merge
    #[arg(required = true, num_args = 2..)]
    pub datasets: Vec<String>,

    /// Root of the merged dataset
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: String,

    /// Class id assigned to each dataset, in the order given
    #[arg(long = "class_ids", value_delimiter = ',', default_value = "0,1")]
    pub class_ids: Vec<u32>,

    /// Also write a data.yaml naming each source at its class id
    #[arg(long = "write_summary")]
    pub write_summary: bool,
}

impl MergeArgs {
    /// Pair every dataset root with its class id.
    pub fn sources(&self) -> Result<Vec<(PathBuf, u32)>> {
        if self.class_ids.len() != self.datasets.len() {
            return Err(Coco2YoloError::InvalidArgument(format!(
                "{} datasets given but {} class ids",
                self.datasets.len(),
                self.class_ids.len()
            )));
        }
        Ok(self
            .datasets
            .iter()
            .map(PathBuf::from)
            .zip(self.class_ids.iter().copied())
            .collect())
    }
}

/// Draws ground-truth labels over every image of a converted dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct RenderArgs {
    /// The dataset's data.yaml
    #[arg(long = "data", default_value = "data.yaml")]
    pub data: String,

    /// TrueType font used for class names; labels are omitted without one
    #[arg(long = "font")]
    pub font: Option<String>,

    /// Folder created next to each role's images folder for the overlays
    #[arg(
        long = "output_name",
        default_value = "check_groundtruth",
        value_parser = validate_dir_name
    )]
    pub output_name: String,
}

/// Renames the images of COCO documents to their zero-padded ids.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct SimplifyArgs {
    /// COCO documents to simplify
    #[arg(required = true)]
    pub documents: Vec<String>,

    /// Folder receiving the rewritten documents and image folders
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: String,

    /// What to do when an image referenced by a document is missing on disk
    #[arg(long = "on_missing_image", value_enum, default_value = "abort")]
    pub on_missing_image: MissingImagePolicy,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum LabelLayout {
    /// `labels/<name>.txt`, box then polygons on one line
    Combined,
    /// `labels/bboxes/<name>.txt` and `labels/masks/<name>.txt`
    #[default]
    Split,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum ClassIdMode {
    /// Write the annotation's category_id as is
    #[default]
    Category,
    /// Write the category's position in the document's category list
    Index,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum MissingImagePolicy {
    /// Log the missing image, keep its labels and continue
    Skip,
    /// Stop the whole run at the first missing image
    #[default]
    Abort,
}

/// Options shared by every role of one conversion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    pub layout: LabelLayout,
    pub class_ids: ClassIdMode,
    pub on_missing_image: MissingImagePolicy,
}

impl From<&ConvertArgs> for ConvertOptions {
    fn from(args: &ConvertArgs) -> Self {
        Self {
            layout: args.layout,
            class_ids: args.class_ids,
            on_missing_image: args.on_missing_image,
        }
    }
}

// A plain folder name, no separators
fn validate_dir_name(s: &str) -> std::result::Result<String, String> {
    if s.is_empty() || s.contains(['/', '\\']) || s == "." || s == ".." {
        Err("NAME must be a single folder name".to_string())
    } else {
        Ok(s.to_string())
    }
}
