//! YOLO label files: naming, writing and reading back
//!
//! Numbers are written with Rust's shortest round-trip `Display` for `f64`,
//! so reading a file back reproduces the exact values that were written.

use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::LabelLayout;
use crate::error::{Coco2YoloError, Result};
use crate::types::{LabelLine, NormalizedBox, NormalizedPolygon, RoleDirs};

pub const LABEL_EXTENSION: &str = "txt";

/// Label file name for an image: sanitized file stem plus `.txt`.
///
/// The renderer derives label paths from image names with this same function.
pub fn label_file_name(image_file_name: &str) -> String {
    let path = Path::new(image_file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_file_name);
    format!("{}.{}", sanitize_filename::sanitize(stem), LABEL_EXTENSION)
}

/// Name an image gets inside `<role>/images`: its sanitized final path component.
pub fn image_output_name(image_file_name: &str) -> String {
    let path = Path::new(image_file_name);
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(image_file_name);
    sanitize_filename::sanitize(name)
}

fn push_box(line: &mut String, bbox: &NormalizedBox) {
    line.push_str(&format!(
        " {} {} {} {}",
        bbox.x_center, bbox.y_center, bbox.width, bbox.height
    ));
}

fn push_points(line: &mut String, polygon: &NormalizedPolygon) {
    for (x, y) in &polygon.points {
        line.push_str(&format!(" {} {}", x, y));
    }
}

/// `class cx cy w h [x1 y1 ...]*`; `None` when the annotation carries no box.
pub fn format_combined_line(label: &LabelLine) -> Option<String> {
    let bbox = label.bbox.as_ref()?;
    let mut line = label.class_id.to_string();
    push_box(&mut line, bbox);
    for polygon in &label.polygons {
        push_points(&mut line, polygon);
    }
    Some(line)
}

pub fn format_bbox_line(class_id: u64, bbox: &NormalizedBox) -> String {
    let mut line = class_id.to_string();
    push_box(&mut line, bbox);
    line
}

pub fn format_mask_line(class_id: u64, polygon: &NormalizedPolygon) -> String {
    let mut line = class_id.to_string();
    push_points(&mut line, polygon);
    line
}

/// Render one image's annotations as file contents: `(primary, masks)`.
///
/// `primary` is the combined file or the bbox file; `masks` is only produced
/// for the split layout.
pub fn render_label_contents(
    layout: LabelLayout,
    labels: &[LabelLine],
) -> (String, Option<String>) {
    let mut primary = String::with_capacity(labels.len() * 64);
    match layout {
        LabelLayout::Combined => {
            for line in labels.iter().filter_map(format_combined_line) {
                primary.push_str(&line);
                primary.push('\n');
            }
            (primary, None)
        }
        LabelLayout::Split => {
            let mut masks = String::new();
            for label in labels {
                if let Some(bbox) = &label.bbox {
                    primary.push_str(&format_bbox_line(label.class_id, bbox));
                    primary.push('\n');
                }
                for polygon in &label.polygons {
                    masks.push_str(&format_mask_line(label.class_id, polygon));
                    masks.push('\n');
                }
            }
            (primary, Some(masks))
        }
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| Coco2YoloError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| Coco2YoloError::io(path, e))
}

/// Write (truncating) the label file(s) of one image; returns how many files were written.
pub fn write_label_files(dirs: &RoleDirs, label_name: &str, labels: &[LabelLine]) -> Result<usize> {
    let (primary, masks) = render_label_contents(dirs.layout, labels);
    match (dirs.layout, masks) {
        (LabelLayout::Split, Some(masks)) => {
            write_text(&dirs.bboxes_dir().join(label_name), &primary)?;
            write_text(&dirs.masks_dir().join(label_name), &masks)?;
            Ok(2)
        }
        _ => {
            write_text(&dirs.labels_dir.join(label_name), &primary)?;
            Ok(1)
        }
    }
}

/// Which of the three line formats a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Combined,
    Bbox,
    Mask,
}

/// A label line read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLabel {
    pub class_id: u64,
    pub bbox: Option<NormalizedBox>,
    pub polygon: Option<NormalizedPolygon>,
}

fn parse_class_id(token: &str) -> Option<u64> {
    token.parse::<u64>().ok().or_else(|| {
        token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

fn parse_points(values: &[f64]) -> Option<NormalizedPolygon> {
    if values.is_empty() || values.len() % 2 != 0 {
        return None;
    }
    Some(NormalizedPolygon {
        points: values.chunks_exact(2).map(|xy| (xy[0], xy[1])).collect(),
    })
}

/// Parse one non-blank line; `None` when it does not fit `kind`.
pub fn parse_label_line(line: &str, kind: LabelKind) -> Option<ParsedLabel> {
    let mut tokens = line.split_whitespace();
    let class_id = parse_class_id(tokens.next()?)?;
    let values = tokens
        .map(|t| t.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;

    let (bbox, rest) = match kind {
        LabelKind::Mask => (None, values.as_slice()),
        LabelKind::Bbox | LabelKind::Combined => {
            if values.len() < 4 {
                return None;
            }
            let bbox = NormalizedBox {
                x_center: values[0],
                y_center: values[1],
                width: values[2],
                height: values[3],
            };
            (Some(bbox), &values[4..])
        }
    };

    let polygon = match kind {
        LabelKind::Bbox => None,
        LabelKind::Combined if rest.is_empty() => None,
        LabelKind::Combined | LabelKind::Mask => Some(parse_points(rest)?),
    };

    Some(ParsedLabel {
        class_id,
        bbox,
        polygon,
    })
}

/// Read a label file, skipping blank lines and logging lines that do not parse.
pub fn read_label_file(path: &Path, kind: LabelKind) -> Result<Vec<ParsedLabel>> {
    let content = std::fs::read_to_string(path).map_err(|e| Coco2YoloError::io(path, e))?;
    let mut labels = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_label_line(line, kind) {
            Some(label) => labels.push(label),
            None => warn!(
                "Skipping malformed label line {} in {}",
                index + 1,
                path.display()
            ),
        }
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabelLine {
        LabelLine {
            class_id: 3,
            bbox: Some(NormalizedBox {
                x_center: 0.2,
                y_center: 0.3,
                width: 0.2,
                height: 0.2,
            }),
            polygons: vec![
                NormalizedPolygon {
                    points: vec![(0.1, 0.2), (0.3, 0.2), (0.3, 0.4)],
                },
                NormalizedPolygon {
                    points: vec![(0.5, 0.5), (0.6, 0.5), (0.6, 0.6)],
                },
            ],
        }
    }

    #[test]
    fn test_label_file_name() {
        assert_eq!(label_file_name("a.jpg"), "a.txt");
        assert_eq!(label_file_name("00001.png"), "00001.txt");
        assert_eq!(label_file_name("sub/dir/img.v2.jpeg"), "img.v2.txt");
        assert_eq!(image_output_name("sub/dir/img.v2.jpeg"), "img.v2.jpeg");
    }

    #[test]
    fn test_combined_line_box_before_polygons() {
        let line = format_combined_line(&sample()).unwrap();
        assert_eq!(line, "3 0.2 0.3 0.2 0.2 0.1 0.2 0.3 0.2 0.3 0.4 0.5 0.5 0.6 0.5 0.6 0.6");

        let mut no_box = sample();
        no_box.bbox = None;
        assert!(format_combined_line(&no_box).is_none());
    }

    #[test]
    fn test_split_contents() {
        let polygon_only = LabelLine {
            class_id: 1,
            bbox: None,
            polygons: vec![NormalizedPolygon {
                points: vec![(0.25, 0.5)],
            }],
        };
        let box_only = LabelLine {
            class_id: 2,
            bbox: sample().bbox,
            polygons: Vec::new(),
        };
        let (bboxes, masks) =
            render_label_contents(LabelLayout::Split, &[sample(), polygon_only, box_only]);
        assert_eq!(bboxes, "3 0.2 0.3 0.2 0.2\n2 0.2 0.3 0.2 0.2\n");
        let masks = masks.unwrap();
        let lines: Vec<&str> = masks.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("3 0.1 0.2"));
        assert!(lines[1].starts_with("3 0.5 0.5"));
        assert_eq!(lines[2], "1 0.25 0.5");
    }

    #[test]
    fn test_combined_line_reads_back_exactly() {
        let odd = LabelLine {
            class_id: 0,
            bbox: Some(NormalizedBox {
                x_center: 1.0 / 3.0,
                y_center: 2.0 / 7.0,
                width: 0.1 + 0.2,
                height: 1.25,
            }),
            polygons: vec![NormalizedPolygon {
                points: vec![(1.0 / 9.0, 5.0 / 11.0), (0.0, 1.0)],
            }],
        };
        let line = format_combined_line(&odd).unwrap();
        let parsed = parse_label_line(&line, LabelKind::Combined).unwrap();
        assert_eq!(parsed.bbox, odd.bbox);
        assert_eq!(parsed.polygon.as_ref(), odd.polygons.first());
    }

    #[test]
    fn test_parse_label_lines() {
        let bbox = parse_label_line("4 0.5 0.5 0.1 0.1", LabelKind::Bbox).unwrap();
        assert_eq!(bbox.class_id, 4);
        assert!(bbox.polygon.is_none());

        let mask = parse_label_line("1 0.1 0.1 0.2 0.1 0.2 0.2", LabelKind::Mask).unwrap();
        assert_eq!(mask.polygon.unwrap().points.len(), 3);
        assert!(mask.bbox.is_none());

        let combined = parse_label_line("2.0 0.5 0.5 0.1 0.1", LabelKind::Combined).unwrap();
        assert_eq!(combined.class_id, 2);
        assert!(combined.polygon.is_none());

        assert!(parse_label_line("1 0.5 0.5", LabelKind::Bbox).is_none());
        assert!(parse_label_line("1 0.5 0.5 0.1", LabelKind::Mask).is_none());
        assert!(parse_label_line("x 0.5 0.5 0.1 0.1", LabelKind::Bbox).is_none());
        assert!(parse_label_line("1 0.5 nope 0.1 0.1", LabelKind::Bbox).is_none());
    }
}
