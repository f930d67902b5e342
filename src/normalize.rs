//! Pixel <-> normalized geometry
//!
//! Values are never clamped: a box reaching past the image border keeps its
//! out-of-range coordinates. Only undefined results (zero-sized images,
//! missing or non-finite components) are rejected.

use crate::coco::{AnnotationRecord, ImageRecord};
use crate::error::{Coco2YoloError, Result};
use crate::types::{LabelLine, NormalizedBox, NormalizedPolygon};

/// COCO box in pixels: origin and size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x_min: f64,
    pub y_min: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    /// Build from COCO's `[x_min, y_min, w, h]`, rejecting missing components.
    /// Trailing extra values are ignored.
    pub fn from_components(components: &[Option<f64>]) -> Option<Self> {
        match components {
            [Some(x_min), Some(y_min), Some(width), Some(height), ..] => Some(Self {
                x_min: *x_min,
                y_min: *y_min,
                width: *width,
                height: *height,
            }),
            _ => None,
        }
    }
}

pub fn normalize_box(
    image_width: f64,
    image_height: f64,
    bbox: &PixelBox,
) -> Option<NormalizedBox> {
    let normalized = NormalizedBox {
        x_center: (bbox.x_min + bbox.width / 2.0) / image_width,
        y_center: (bbox.y_min + bbox.height / 2.0) / image_height,
        width: bbox.width / image_width,
        height: bbox.height / image_height,
    };
    let defined = [
        normalized.x_center,
        normalized.y_center,
        normalized.width,
        normalized.height,
    ]
    .iter()
    .all(|v| v.is_finite());
    defined.then_some(normalized)
}

/// Scale a flat `x1 y1 x2 y2 ...` list; `None` for odd, empty or non-finite input.
pub fn normalize_polygon(
    image_width: f64,
    image_height: f64,
    polygon: &[f64],
) -> Option<NormalizedPolygon> {
    if polygon.is_empty() || polygon.len() % 2 != 0 {
        return None;
    }
    let points: Vec<(f64, f64)> = polygon
        .chunks_exact(2)
        .map(|xy| (xy[0] / image_width, xy[1] / image_height))
        .collect();
    points
        .iter()
        .all(|(x, y)| x.is_finite() && y.is_finite())
        .then_some(NormalizedPolygon { points })
}

pub fn denormalize_box(image_width: f64, image_height: f64, bbox: &NormalizedBox) -> PixelBox {
    let width = bbox.width * image_width;
    let height = bbox.height * image_height;
    PixelBox {
        x_min: bbox.x_center * image_width - width / 2.0,
        y_min: bbox.y_center * image_height - height / 2.0,
        width,
        height,
    }
}

pub fn denormalize_polygon(
    image_width: f64,
    image_height: f64,
    polygon: &NormalizedPolygon,
) -> Vec<(f64, f64)> {
    polygon
        .points
        .iter()
        .map(|(x, y)| (x * image_width, y * image_height))
        .collect()
}

/// Normalize every piece of geometry of one annotation against its image.
///
/// Any malformed component drops the whole annotation.
pub fn normalize_annotation(
    image: &ImageRecord,
    annotation: &AnnotationRecord,
    class_id: u64,
) -> Result<LabelLine> {
    let (width, height) = (image.width, image.height);
    if !(width > 0.0 && height > 0.0) {
        return Err(Coco2YoloError::incomplete(
            image.id,
            format!("image {} has no usable size", image.file_name),
        ));
    }

    let bbox = match &annotation.bbox {
        Some(components) => {
            let pixel_box = PixelBox::from_components(components).ok_or_else(|| {
                Coco2YoloError::incomplete(
                    image.id,
                    format!("bbox needs 4 components, got {:?}", components),
                )
            })?;
            let normalized = normalize_box(width, height, &pixel_box).ok_or_else(|| {
                Coco2YoloError::incomplete(image.id, "bbox normalizes to undefined values")
            })?;
            Some(normalized)
        }
        None => None,
    };

    let polygons = annotation
        .polygons()
        .iter()
        .map(|polygon| {
            normalize_polygon(width, height, polygon).ok_or_else(|| {
                Coco2YoloError::incomplete(
                    image.id,
                    format!("polygon with {} coordinates is not a point list", polygon.len()),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if bbox.is_none() && polygons.is_empty() {
        return Err(Coco2YoloError::incomplete(image.id, "no bbox and no polygon"));
    }

    Ok(LabelLine {
        class_id,
        bbox,
        polygons,
    })
}
