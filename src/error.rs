use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Coco2YoloError>;

/// Every failure the converter, merger and renderer can surface.
///
/// `IncompleteAnnotation` and `LabelFileMissing` never abort a run: callers
/// count and log them. `MalformedDocument` stops the affected role and
/// `AssetMissing` stops the run only under the `abort` policy.
#[derive(Debug, Error)]
pub enum Coco2YoloError {
    #[error("malformed interchange document {path}: {message}")]
    MalformedDocument { path: PathBuf, message: String },

    #[error("source image {path} does not exist")]
    AssetMissing { path: PathBuf },

    #[error("incomplete annotation on image {image_id}: {reason}")]
    IncompleteAnnotation { image_id: u64, reason: String },

    #[error("no label file found for {image}: expected {expected}")]
    LabelFileMissing { image: PathBuf, expected: PathBuf },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("summary document error at {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("image codec error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{0}")]
    InvalidArgument(String),
}

impl Coco2YoloError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Coco2YoloError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn incomplete(image_id: u64, reason: impl Into<String>) -> Self {
        Coco2YoloError::IncompleteAnnotation {
            image_id,
            reason: reason.into(),
        }
    }
}
