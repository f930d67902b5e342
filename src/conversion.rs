use dashmap::DashSet;
use log::warn;
use std::collections::HashMap;
use std::path::Path;

use crate::coco::{AnnotationRecord, ImageRecord};
use crate::config::{ClassIdMode, ConvertOptions, LabelLayout, MissingImagePolicy};
use crate::error::{Coco2YoloError, Result};
use crate::io::copy_file;
use crate::labels::{image_output_name, label_file_name, write_label_files};
use crate::normalize::normalize_annotation;
use crate::types::{LabelLine, ProcessingStats, RoleDirs};

/// Class id written for an annotation under the chosen mode
pub fn resolve_class_id(
    annotation: &AnnotationRecord,
    mode: ClassIdMode,
    category_positions: &HashMap<u64, usize>,
) -> Result<u64> {
    let category_id = annotation.category_id.ok_or_else(|| {
        Coco2YoloError::incomplete(annotation.image_id, "annotation has no category_id")
    })?;
    match mode {
        ClassIdMode::Category => Ok(category_id),
        ClassIdMode::Index => category_positions
            .get(&category_id)
            .map(|&position| position as u64)
            .ok_or_else(|| {
                Coco2YoloError::incomplete(
                    annotation.image_id,
                    format!("category {} is not listed", category_id),
                )
            }),
    }
}

/// Convert the annotations of one image, returning the label lines and how many were dropped
pub fn convert_image_annotations(
    image: &ImageRecord,
    annotations: &[&AnnotationRecord],
    options: &ConvertOptions,
    category_positions: &HashMap<u64, usize>,
) -> (Vec<LabelLine>, usize) {
    let mut labels = Vec::with_capacity(annotations.len());
    let mut dropped = 0;

    for annotation in annotations {
        let line = resolve_class_id(annotation, options.class_ids, category_positions)
            .and_then(|class_id| normalize_annotation(image, annotation, class_id))
            .and_then(|line| {
                if options.layout == LabelLayout::Combined && line.bbox.is_none() {
                    Err(Coco2YoloError::incomplete(
                        image.id,
                        "combined layout needs a bbox",
                    ))
                } else {
                    Ok(line)
                }
            });

        match line {
            Ok(line) => labels.push(line),
            Err(e) => {
                warn!("Dropping annotation in {}: {}", image.file_name, e);
                dropped += 1;
            }
        }
    }

    (labels, dropped)
}

/// Everything a worker needs to convert images of one role
pub struct RoleContext<'a> {
    pub dirs: &'a RoleDirs,
    pub source_images_dir: &'a Path,
    pub options: &'a ConvertOptions,
    pub category_positions: &'a HashMap<u64, usize>,
    pub claimed_labels: &'a DashSet<String>,
}

/// Convert one image end to end: labels first, then the raster copy.
///
/// Returns the tally for this image. Errors are reserved for failures that
/// must stop the run (I/O, or a missing image under the `abort` policy).
pub fn process_image(
    image: &ImageRecord,
    annotations: &[&AnnotationRecord],
    context: &RoleContext,
) -> Result<ProcessingStats> {
    let mut stats = ProcessingStats::new();

    let label_name = label_file_name(&image.file_name);
    if !context.claimed_labels.insert(label_name.clone()) {
        warn!(
            "Skipping {}: label file {} already written by another image",
            image.file_name, label_name
        );
        stats.name_collisions += 1;
        return Ok(stats);
    }

    let (labels, dropped) = convert_image_annotations(
        image,
        annotations,
        context.options,
        context.category_positions,
    );
    stats.incomplete_annotations += dropped;
    stats.annotations_written += labels.len();
    stats.label_files_written += write_label_files(context.dirs, &label_name, &labels)?;

    let source = context.source_images_dir.join(&image.file_name);
    let destination = context
        .dirs
        .images_dir
        .join(image_output_name(&image.file_name));
    match copy_file(&source, &destination) {
        Ok(_) => {}
        Err(Coco2YoloError::AssetMissing { path })
            if context.options.on_missing_image == MissingImagePolicy::Skip =>
        {
            warn!("Image file not found, labels kept: {}", path.display());
            stats.missing_images += 1;
        }
        Err(e) => return Err(e),
    }

    stats.images_processed += 1;
    Ok(stats)
}
