use std::collections::HashMap;
use std::path::Path;

use coco2yolo::config::{ClassIdMode, ConvertOptions, LabelLayout};
use coco2yolo::conversion::convert_image_annotations;
use coco2yolo::labels::{parse_label_line, render_label_contents, LabelKind};
use coco2yolo::normalize::{denormalize_box, PixelBox};
use coco2yolo::{normalize_box, normalize_polygon, CocoDocument};

const SCENARIO: &str = r#"{
    "images": [{"id": 1, "file_name": "a.jpg", "width": 100, "height": 50}],
    "annotations": [{"image_id": 1, "category_id": 3, "bbox": [10, 10, 20, 10]}],
    "categories": [{"id": 3, "name": "cab"}]
}"#;

fn parse_numbers(line: &str) -> Vec<f64> {
    line.split_whitespace().map(|t| t.parse().unwrap()).collect()
}

#[test]
fn test_scenario_combined_line() {
    let doc = CocoDocument::from_json_str(SCENARIO, Path::new("train.json")).unwrap();
    let index = doc.annotations_by_image();
    let options = ConvertOptions {
        layout: LabelLayout::Combined,
        ..Default::default()
    };
    let (labels, dropped) =
        convert_image_annotations(&doc.images[0], &index[&1], &options, &doc.category_positions());
    assert_eq!(dropped, 0);

    let (contents, masks) = render_label_contents(LabelLayout::Combined, &labels);
    assert!(masks.is_none());
    assert!(contents.ends_with('\n'));
    let values = parse_numbers(contents.trim_end());
    let expected = [3.0, 0.2, 0.3, 0.2, 0.2];
    assert_eq!(values.len(), expected.len());
    for (value, expected) in values.iter().zip(expected) {
        assert!((value - expected).abs() < 1e-9, "{} != {}", value, expected);
    }
}

#[test]
fn test_index_mode_uses_category_position() {
    let doc = CocoDocument::from_json_str(SCENARIO, Path::new("train.json")).unwrap();
    let index = doc.annotations_by_image();
    let options = ConvertOptions {
        layout: LabelLayout::Split,
        class_ids: ClassIdMode::Index,
        ..Default::default()
    };
    let (labels, _) =
        convert_image_annotations(&doc.images[0], &index[&1], &options, &doc.category_positions());
    assert_eq!(labels[0].class_id, 0);

    let (_, dropped) =
        convert_image_annotations(&doc.images[0], &index[&1], &options, &HashMap::new());
    assert_eq!(dropped, 1);
}

#[test]
fn test_round_trip_through_label_text() {
    let (w, h) = (1280.0, 720.0);
    let pixel = PixelBox {
        x_min: 101.3,
        y_min: 47.9,
        width: 333.3,
        height: 211.7,
    };
    let line = coco2yolo::labels::format_bbox_line(5, &normalize_box(w, h, &pixel).unwrap());
    let parsed = parse_label_line(&line, LabelKind::Bbox).unwrap();
    let back = denormalize_box(w, h, &parsed.bbox.unwrap());
    assert!((back.x_min - pixel.x_min).abs() < 1e-6);
    assert!((back.y_min - pixel.y_min).abs() < 1e-6);
    assert!((back.width - pixel.width).abs() < 1e-6);
    assert!((back.height - pixel.height).abs() < 1e-6);
}

#[test]
fn test_polygon_scaling_by_axis() {
    let flat = [20.0, 10.0, 40.0, 30.0, 0.0, 50.0, 100.0, 0.0];
    let polygon = normalize_polygon(100.0, 50.0, &flat).unwrap();
    assert_eq!(polygon.points.len(), flat.len() / 2);
    for (i, (x, y)) in polygon.points.iter().enumerate() {
        assert!((x - flat[2 * i] / 100.0).abs() < 1e-12);
        assert!((y - flat[2 * i + 1] / 50.0).abs() < 1e-12);
    }
}

#[test]
fn test_split_layout_multiple_polygons_share_class() {
    let doc = CocoDocument::from_json_str(
        r#"{
            "images": [{"id": 9, "file_name": "b.png", "width": 10, "height": 10}],
            "annotations": [{"image_id": 9, "category_id": 2,
                             "segmentation": [[0, 0, 5, 0, 5, 5], [6, 6, 9, 6, 9, 9]]}]
        }"#,
        Path::new("test.json"),
    )
    .unwrap();
    let index = doc.annotations_by_image();
    let (labels, _) = convert_image_annotations(
        &doc.images[0],
        &index[&9],
        &ConvertOptions::default(),
        &HashMap::new(),
    );
    let (bboxes, masks) = render_label_contents(LabelLayout::Split, &labels);
    assert!(bboxes.is_empty());
    let masks = masks.unwrap();
    assert_eq!(masks.lines().count(), 2);
    assert!(masks.lines().all(|line| line.starts_with("2 ")));
}
