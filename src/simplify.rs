//! Prepare a raw COCO export for conversion
//!
//! Images are copied next to the rewritten document into a folder named after
//! the document stem and renamed to their zero-padded image id. Everything else
//! in the document is written back untouched.

use log::{info, warn};
use rayon::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::MissingImagePolicy;
use crate::error::{Coco2YoloError, Result};
use crate::io::{copy_file, ensure_dir};
use crate::utils::create_progress_bar;

/// Outcome of simplifying one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifyReport {
    pub document: PathBuf,
    pub images_dir: PathBuf,
    pub images_copied: usize,
    pub missing_images: usize,
}

/// `{id:05}` keeping the original extension
pub fn simplified_file_name(image_id: u64, original: &str) -> String {
    match Path::new(original).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{:05}.{}", image_id, ext),
        None => format!("{:05}", image_id),
    }
}

fn malformed(path: &Path, message: impl Into<String>) -> Coco2YoloError {
    Coco2YoloError::MalformedDocument {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Copy and rename the images of `input`, then write the updated document into `output_dir`.
pub fn simplify_document(
    input: &Path,
    output_dir: &Path,
    policy: MissingImagePolicy,
) -> Result<SimplifyReport> {
    let file = File::open(input).map_err(|e| Coco2YoloError::io(input, e))?;
    let mut document: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| malformed(input, e.to_string()))?;

    let stem = input
        .file_stem()
        .ok_or_else(|| malformed(input, "document path has no file name"))?;
    let source_dir = input.parent().unwrap_or_else(|| Path::new(""));
    let images_dir = ensure_dir(&output_dir.join(stem))?;

    let images = document
        .get_mut("images")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| malformed(input, "missing `images` array"))?;

    let pb = create_progress_bar(images.len() as u64, &stem.to_string_lossy());
    let (images_copied, missing_images) = images
        .par_iter_mut()
        .map(|image| {
            let id = image
                .get("id")
                .and_then(Value::as_u64)
                .ok_or_else(|| malformed(input, "image record without numeric `id`"))?;
            let file_name = image
                .get("file_name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(input, format!("image {} without `file_name`", id)))?;

            let new_name = simplified_file_name(id, file_name);
            let source = source_dir.join(file_name);
            let copied: (usize, usize) = match copy_file(&source, &images_dir.join(&new_name)) {
                Ok(_) => (1, 0),
                Err(Coco2YoloError::AssetMissing { path })
                    if policy == MissingImagePolicy::Skip =>
                {
                    warn!("Image file not found: {}", path.display());
                    (0, 1)
                }
                Err(e) => return Err(e),
            };
            image["file_name"] = Value::String(new_name);
            pb.inc(1);
            Ok(copied)
        })
        .try_reduce(|| (0, 0), |a, b| Ok((a.0 + b.0, a.1 + b.1)))?;
    pb.finish_with_message("Images copied");

    let file_name = input
        .file_name()
        .ok_or_else(|| malformed(input, "document path has no file name"))?;
    let document_path = output_dir.join(file_name);
    let out = File::create(&document_path).map_err(|e| Coco2YoloError::io(&document_path, e))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer(&mut writer, &document)
        .map_err(|e| Coco2YoloError::io(&document_path, e.into()))?;
    writer.flush().map_err(|e| Coco2YoloError::io(&document_path, e))?;

    info!(
        "Wrote {} ({} images copied, {} missing)",
        document_path.display(),
        images_copied,
        missing_images
    );
    Ok(SimplifyReport {
        document: document_path,
        images_dir,
        images_copied,
        missing_images,
    })
}
