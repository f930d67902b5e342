use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::LabelLayout;

/// Box in YOLO form: center, width and height relative to the image size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

/// Polygon vertices relative to the image size, in source order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedPolygon {
    pub points: Vec<(f64, f64)>,
}

/// One annotation ready to be serialized
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLine {
    pub class_id: u64,
    pub bbox: Option<NormalizedBox>,
    pub polygons: Vec<NormalizedPolygon>,
}

/// Dataset split a document feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetRole {
    Train,
    Validation,
    Test,
}

impl DatasetRole {
    /// Processing order; the last role's categories end up in the summary.
    pub const ALL: [DatasetRole; 3] = [
        DatasetRole::Train,
        DatasetRole::Validation,
        DatasetRole::Test,
    ];

    /// Sub-directory of the YOLO tree and key of the summary document
    pub fn dir_name(self) -> &'static str {
        match self {
            DatasetRole::Train => "train",
            DatasetRole::Validation => "val",
            DatasetRole::Test => "test",
        }
    }

    /// File stem of the COCO document feeding this role
    pub fn document_stem(self) -> &'static str {
        match self {
            DatasetRole::Train => "train",
            DatasetRole::Validation => "validation",
            DatasetRole::Test => "test",
        }
    }
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Class names, positionally aligned to output class indices
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable(Vec<String>);

impl ClassTable {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display name for a class id, falling back to `class_<id>` when out of range.
    pub fn name_of(&self, class_id: u64) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|index| self.0.get(index))
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// Output folders of one role
#[derive(Debug, Clone)]
pub struct RoleDirs {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub layout: LabelLayout,
}

impl RoleDirs {
    /// `<root>/<role>/images` and `<root>/<role>/labels`
    pub fn new(root: &Path, role: DatasetRole, layout: LabelLayout) -> Self {
        let role_dir = root.join(role.dir_name());
        Self {
            images_dir: role_dir.join("images"),
            labels_dir: role_dir.join("labels"),
            layout,
        }
    }

    pub fn bboxes_dir(&self) -> PathBuf {
        self.labels_dir.join("bboxes")
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.labels_dir.join("masks")
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub images_processed: usize,
    pub label_files_written: usize,
    pub annotations_written: usize,
    pub incomplete_annotations: usize,
    pub missing_images: usize,
    pub name_collisions: usize,
    pub orphan_annotations: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another tally into this one.
    pub fn absorb(&mut self, other: &ProcessingStats) {
        self.images_processed += other.images_processed;
        self.label_files_written += other.label_files_written;
        self.annotations_written += other.annotations_written;
        self.incomplete_annotations += other.incomplete_annotations;
        self.missing_images += other.missing_images;
        self.name_collisions += other.name_collisions;
        self.orphan_annotations += other.orphan_annotations;
    }

    pub fn print_summary(&self, scope: &str) {
        info!("=== Conversion Summary ({}) ===", scope);
        info!("Images processed: {}", self.images_processed);
        info!("Label files written: {}", self.label_files_written);
        info!("Annotations written: {}", self.annotations_written);

        if self.incomplete_annotations > 0 {
            warn!(
                "Dropped incomplete annotations: {}",
                self.incomplete_annotations
            );
        }
        if self.missing_images > 0 {
            warn!("Images missing on disk: {}", self.missing_images);
        }
        if self.name_collisions > 0 {
            warn!(
                "Images skipped due to label name collisions: {}",
                self.name_collisions
            );
        }
        if self.orphan_annotations > 0 {
            warn!(
                "Annotations referencing no listed image: {}",
                self.orphan_annotations
            );
        }
    }
}
