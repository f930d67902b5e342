//! COCO interchange document records and loader
//!
//! Only the subset of the COCO schema the converter consumes is modelled:
//! `images`, `annotations` and `categories`. Unknown fields are ignored.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Coco2YoloError, Result};
use crate::types::ClassTable;

/// COCO image information
///
/// Sizes are read as plain JSON numbers; exporters write both `640` and `640.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub file_name: String,
    pub width: f64,
    pub height: f64,
}

/// COCO category information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: u64,
    pub name: String,
}

/// COCO annotation information
///
/// `bbox` is `[x_min, y_min, width, height]` in pixels. A `null` component or
/// category is kept as `None` so the converter can drop the annotation instead
/// of rejecting the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub image_id: u64,
    #[serde(default)]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub bbox: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub segmentation: Option<Segmentation>,
}

/// Polygon lists, or anything else COCO allows in `segmentation` (RLE for crowds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    Polygons(Vec<Vec<f64>>),
    Encoded(serde_json::Value),
}

impl AnnotationRecord {
    /// The polygon lists of this annotation; empty when absent or run-length encoded.
    pub fn polygons(&self) -> &[Vec<f64>] {
        match &self.segmentation {
            Some(Segmentation::Polygons(polygons)) => polygons,
            Some(Segmentation::Encoded(_)) => {
                debug!(
                    "Ignoring non-polygon segmentation on image {}",
                    self.image_id
                );
                &[]
            }
            None => &[],
        }
    }
}

/// Complete COCO document, as far as conversion is concerned
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDocument {
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
}

impl CocoDocument {
    /// Parse a document from any JSON string.
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| malformed(origin, e))
    }

    /// Build the image id -> annotations join once, keeping document order.
    pub fn annotations_by_image(&self) -> HashMap<u64, Vec<&AnnotationRecord>> {
        let mut index: HashMap<u64, Vec<&AnnotationRecord>> =
            HashMap::with_capacity(self.images.len());
        for annotation in &self.annotations {
            index.entry(annotation.image_id).or_default().push(annotation);
        }
        index
    }

    /// Category names in document order.
    pub fn class_table(&self) -> ClassTable {
        ClassTable::new(self.categories.iter().map(|c| c.name.clone()).collect())
    }

    /// Category id -> position in the category list.
    pub fn category_positions(&self) -> HashMap<u64, usize> {
        self.categories
            .iter()
            .enumerate()
            .map(|(position, category)| (category.id, position))
            .collect()
    }
}

/// Load a COCO document from disk, streaming it through serde.
pub fn load_document(path: &Path) -> Result<CocoDocument> {
    let file = File::open(path).map_err(|e| Coco2YoloError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| malformed(path, e))
}

fn malformed(path: &Path, e: serde_json::Error) -> Coco2YoloError {
    Coco2YoloError::MalformedDocument {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "info": {"description": "ignored"},
        "images": [
            {"id": 1, "file_name": "a.jpg", "width": 100, "height": 50},
            {"id": 2, "file_name": "b.jpg", "width": 10, "height": 10}
        ],
        "annotations": [
            {"id": 7, "image_id": 1, "category_id": 3, "bbox": [10, 10, 20, 10]},
            {"image_id": 2, "category_id": 1, "segmentation": [[1, 1, 5, 1, 5, 5]]},
            {"image_id": 1, "category_id": 4, "segmentation": {"counts": [1, 2], "size": [10, 10]}},
            {"image_id": 1, "category_id": 3, "bbox": [1, null, 2, 2]}
        ],
        "categories": [{"id": 3, "name": "cab"}, {"id": 1, "name": "truck"}]
    }"#;

    #[test]
    fn test_parse_tolerates_optional_fields() {
        let doc = CocoDocument::from_json_str(DOC, Path::new("doc.json")).unwrap();
        assert_eq!(doc.images.len(), 2);
        assert_eq!(doc.annotations.len(), 4);
        assert_eq!(
            doc.annotations[0].bbox,
            Some(vec![Some(10.0), Some(10.0), Some(20.0), Some(10.0)])
        );
        assert!(doc.annotations[0].polygons().is_empty());
        assert_eq!(doc.annotations[1].bbox, None);
        assert_eq!(doc.annotations[1].polygons().len(), 1);
        assert!(doc.annotations[2].polygons().is_empty());
        assert_eq!(doc.annotations[3].bbox.as_ref().unwrap()[1], None);
    }

    #[test]
    fn test_missing_containers_are_malformed() {
        let err = CocoDocument::from_json_str(r#"{"annotations": []}"#, Path::new("x.json"))
            .unwrap_err();
        assert!(matches!(err, Coco2YoloError::MalformedDocument { .. }));

        let err = CocoDocument::from_json_str(r#"{"images": []}"#, Path::new("x.json"))
            .unwrap_err();
        assert!(matches!(err, Coco2YoloError::MalformedDocument { .. }));

        let err = CocoDocument::from_json_str("not json", Path::new("x.json")).unwrap_err();
        assert!(matches!(err, Coco2YoloError::MalformedDocument { .. }));
    }

    #[test]
    fn test_bad_records_do_not_reject_the_document() {
        let doc = CocoDocument::from_json_str(
            r#"{
                "images": [
                    {"id": 1, "file_name": "a.jpg", "width": 100.0, "height": 50.0},
                    {"id": 2, "file_name": "b.jpg", "width": 10, "height": 10}
                ],
                "annotations": [
                    {"image_id": 1, "category_id": null, "bbox": [1, 1, 2, 2]},
                    {"image_id": 2, "bbox": [1, 1, 2, 2]},
                    {"image_id": 2, "category_id": 5, "bbox": [1, 1, 2, 2]}
                ]
            }"#,
            Path::new("t.json"),
        )
        .unwrap();
        assert_eq!(doc.images[0].width, 100.0);
        assert_eq!(doc.annotations[0].category_id, None);
        assert_eq!(doc.annotations[1].category_id, None);
        assert_eq!(doc.annotations[2].category_id, Some(5));
    }

    #[test]
    fn test_categories_are_optional() {
        let doc = CocoDocument::from_json_str(
            r#"{"images": [], "annotations": []}"#,
            Path::new("x.json"),
        )
        .unwrap();
        assert!(doc.categories.is_empty());
        assert!(doc.class_table().is_empty());
    }

    #[test]
    fn test_annotations_by_image_keeps_order() {
        let doc = CocoDocument::from_json_str(DOC, Path::new("doc.json")).unwrap();
        let index = doc.annotations_by_image();
        let first = &index[&1];
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].category_id, Some(3));
        assert_eq!(first[1].category_id, Some(4));
        assert_eq!(index[&2].len(), 1);
        assert!(!index.contains_key(&3));
    }

    #[test]
    fn test_class_table_and_positions() {
        let doc = CocoDocument::from_json_str(DOC, Path::new("doc.json")).unwrap();
        assert_eq!(doc.class_table().names(), &["cab".to_string(), "truck".to_string()]);
        let positions = doc.category_positions();
        assert_eq!(positions[&3], 0);
        assert_eq!(positions[&1], 1);
    }
}
