use dashmap::DashSet;
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::coco::{load_document, AnnotationRecord, ImageRecord};
use crate::config::ConvertOptions;
use crate::conversion::{process_image, RoleContext};
use crate::error::{Coco2YoloError, Result};
use crate::io::{
    ensure_dir, setup_role_directories, write_summary, DatasetSummary, SUMMARY_FILE_NAME,
};
use crate::types::{ClassTable, DatasetRole, ProcessingStats};
use crate::utils::create_progress_bar;

/// Outcome of converting one role's document
#[derive(Debug, Clone)]
pub struct RoleReport {
    pub role: DatasetRole,
    pub stats: ProcessingStats,
    pub class_table: ClassTable,
}

/// Outcome of a whole conversion run
#[derive(Debug, Clone)]
pub struct DatasetReport {
    pub roles: Vec<RoleReport>,
    pub summary: DatasetSummary,
    pub summary_path: PathBuf,
}

impl DatasetReport {
    pub fn total(&self) -> ProcessingStats {
        let mut total = ProcessingStats::new();
        for report in &self.roles {
            total.absorb(&report.stats);
        }
        total
    }
}

/// `<coco_dir>/<stem>.json` for a role
pub fn document_path(coco_dir: &Path, role: DatasetRole) -> PathBuf {
    coco_dir.join(format!("{}.json", role.document_stem()))
}

/// Images of a document live next to it, in a folder named after the document stem
pub fn source_images_dir(document: &Path) -> PathBuf {
    let stem = document.file_stem().unwrap_or_default();
    document
        .parent()
        .map(|parent| parent.join(stem))
        .unwrap_or_else(|| PathBuf::from(stem))
}

/// Annotations whose `image_id` matches none of the image records
pub fn count_orphan_annotations(
    images: &[ImageRecord],
    by_image: &HashMap<u64, Vec<&AnnotationRecord>>,
) -> usize {
    let image_ids: HashSet<u64> = images.iter().map(|image| image.id).collect();
    by_image
        .iter()
        .filter(|(image_id, _)| !image_ids.contains(*image_id))
        .map(|(_, annotations)| annotations.len())
        .sum()
}

/// Convert one COCO document into `<output_root>/<role>/...`
pub fn convert_role(
    document: &Path,
    role: DatasetRole,
    output_root: &Path,
    options: &ConvertOptions,
) -> Result<RoleReport> {
    let coco = load_document(document)?;
    info!(
        "[{}] Loaded {} images, {} annotations, {} categories from {}",
        role,
        coco.images.len(),
        coco.annotations.len(),
        coco.categories.len(),
        document.display()
    );

    let dirs = setup_role_directories(output_root, role, options.layout)?;
    let images_dir = source_images_dir(document);
    let by_image = coco.annotations_by_image();
    let category_positions = coco.category_positions();
    let claimed_labels = DashSet::new();
    let context = RoleContext {
        dirs: &dirs,
        source_images_dir: &images_dir,
        options,
        category_positions: &category_positions,
        claimed_labels: &claimed_labels,
    };

    let pb = create_progress_bar(coco.images.len() as u64, &role.to_string());
    let no_annotations: Vec<&AnnotationRecord> = Vec::new();
    let stats = coco
        .images
        .par_iter()
        .map(|image| {
            let annotations = by_image.get(&image.id).unwrap_or(&no_annotations);
            let result = process_image(image, annotations, &context);
            pb.inc(1);
            result
        })
        .try_reduce(ProcessingStats::new, |mut total, part| {
            total.absorb(&part);
            Ok(total)
        });
    pb.finish_with_message(format!("{} processing complete", role));

    let mut stats = stats?;
    stats.orphan_annotations = count_orphan_annotations(&coco.images, &by_image);
    stats.print_summary(role.dir_name());
    Ok(RoleReport {
        role,
        stats,
        class_table: coco.class_table(),
    })
}

/// Convert every role found in `coco_dir` and write `data.yaml`.
///
/// A role whose document is absent or malformed is logged and skipped; any
/// other error stops the run. The class table in the summary is taken from
/// the last role converted.
pub fn process_dataset(
    coco_dir: &Path,
    output_root: &Path,
    options: &ConvertOptions,
) -> Result<DatasetReport> {
    ensure_dir(output_root)?;

    let mut roles: Vec<RoleReport> = Vec::new();
    for role in DatasetRole::ALL {
        let document = document_path(coco_dir, role);
        if !document.is_file() {
            warn!("[{}] No document at {}, skipping role", role, document.display());
            continue;
        }
        match convert_role(&document, role, output_root, options) {
            Ok(report) => roles.push(report),
            Err(e @ Coco2YoloError::MalformedDocument { .. }) => {
                error!("[{}] {}", role, e);
            }
            Err(e) => return Err(e),
        }
    }

    let last = roles.last().ok_or_else(|| {
        Coco2YoloError::InvalidArgument(format!(
            "no convertible train/validation/test documents in {}",
            coco_dir.display()
        ))
    })?;
    for report in &roles {
        if report.class_table != last.class_table {
            warn!(
                "Categories of '{}' differ from '{}'; data.yaml lists the categories of '{}'",
                report.role, last.role, last.role
            );
        }
    }

    info!("Creating {} file...", SUMMARY_FILE_NAME);
    let summary = DatasetSummary::for_root(output_root, last.class_table.clone())?;
    let summary_path = output_root.join(SUMMARY_FILE_NAME);
    write_summary(&summary_path, &summary)?;

    let report = DatasetReport {
        roles,
        summary,
        summary_path,
    };
    report.total().print_summary("all roles");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_and_image_paths() {
        let coco_dir = Path::new("simple_coco");
        let doc = document_path(coco_dir, DatasetRole::Validation);
        assert_eq!(doc, Path::new("simple_coco/validation.json"));
        assert_eq!(source_images_dir(&doc), Path::new("simple_coco/validation"));
    }

    #[test]
    fn test_count_orphan_annotations() {
        let doc = crate::coco::CocoDocument::from_json_str(
            r#"{
                "images": [{"id": 1, "file_name": "a.jpg", "width": 10, "height": 10}],
                "annotations": [
                    {"image_id": 1, "category_id": 0, "bbox": [1, 1, 2, 2]},
                    {"image_id": 4, "category_id": 0, "bbox": [1, 1, 2, 2]},
                    {"image_id": 4, "category_id": 1, "bbox": [1, 1, 2, 2]},
                    {"image_id": 9, "category_id": 0, "bbox": [1, 1, 2, 2]}
                ]
            }"#,
            Path::new("train.json"),
        )
        .unwrap();
        let by_image = doc.annotations_by_image();
        assert_eq!(count_orphan_annotations(&doc.images, &by_image), 3);
        assert_eq!(count_orphan_annotations(&doc.images, &HashMap::new()), 0);
    }

    #[test]
    fn test_empty_coco_dir_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("out");
        let err = process_dataset(temp_dir.path(), &out, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Coco2YoloError::InvalidArgument(_)));
    }
}
