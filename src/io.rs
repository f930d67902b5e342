use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::LabelLayout;
use crate::error::{Coco2YoloError, Result};
use crate::types::{ClassTable, DatasetRole, RoleDirs};

pub const SUMMARY_FILE_NAME: &str = "data.yaml";

/// Create a directory and its parents; existing directories are left untouched.
pub fn ensure_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path).map_err(|e| Coco2YoloError::io(path, e))?;
    Ok(path.to_path_buf())
}

/// Set up `<root>/<role>/images` and the label folders of the chosen layout
pub fn setup_role_directories(
    root: &Path,
    role: DatasetRole,
    layout: LabelLayout,
) -> Result<RoleDirs> {
    let dirs = RoleDirs::new(root, role, layout);
    ensure_dir(&dirs.images_dir)?;
    match layout {
        LabelLayout::Combined => {
            ensure_dir(&dirs.labels_dir)?;
        }
        LabelLayout::Split => {
            ensure_dir(&dirs.bboxes_dir())?;
            ensure_dir(&dirs.masks_dir())?;
        }
    }
    Ok(dirs)
}

/// Byte-copy a file, overwriting the destination.
pub fn copy_file(source: &Path, destination: &Path) -> Result<u64> {
    if !source.is_file() {
        return Err(Coco2YoloError::AssetMissing {
            path: source.to_path_buf(),
        });
    }
    debug!("Copying {} -> {}", source.display(), destination.display());
    fs::copy(source, destination).map_err(|e| Coco2YoloError::io(destination, e))
}

/// The `data.yaml` describing a converted dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub train: PathBuf,
    pub val: PathBuf,
    pub test: PathBuf,
    pub nc: usize,
    pub names: ClassTable,
}

impl DatasetSummary {
    /// Summary for a dataset rooted at `root`, with absolute image folders.
    pub fn for_root(root: &Path, names: ClassTable) -> Result<Self> {
        let root = fs::canonicalize(root).map_err(|e| Coco2YoloError::io(root, e))?;
        let images_dir = |role: DatasetRole| root.join(role.dir_name()).join("images");
        Ok(Self {
            train: images_dir(DatasetRole::Train),
            val: images_dir(DatasetRole::Validation),
            test: images_dir(DatasetRole::Test),
            nc: names.len(),
            names,
        })
    }

    pub fn images_dir(&self, role: DatasetRole) -> &Path {
        match role {
            DatasetRole::Train => &self.train,
            DatasetRole::Validation => &self.val,
            DatasetRole::Test => &self.test,
        }
    }
}

/// Write the summary document, replacing any previous one
pub fn write_summary(path: &Path, summary: &DatasetSummary) -> Result<()> {
    let file = File::create(path).map_err(|e| Coco2YoloError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_yaml::to_writer(&mut writer, summary).map_err(|source| Coco2YoloError::Summary {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| Coco2YoloError::io(path, e))
}

pub fn read_summary(path: &Path) -> Result<DatasetSummary> {
    let data = fs::read_to_string(path).map_err(|e| Coco2YoloError::io(path, e))?;
    serde_yaml::from_str(&data).map_err(|source| Coco2YoloError::Summary {
        path: path.to_path_buf(),
        source,
    })
}
