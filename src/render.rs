//! Ground-truth overlays for visual checks of a converted dataset
//!
//! Labels are denormalized against the pixel size of the image actually
//! decoded, never against sizes recorded at conversion time.

use ab_glyph::{FontVec, PxScale};
use glob::{glob, Pattern};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::{error, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LabelLayout;
use crate::error::{Coco2YoloError, Result};
use crate::io::{ensure_dir, read_summary};
use crate::labels::{label_file_name, read_label_file, LabelKind, ParsedLabel};
use crate::normalize::{denormalize_box, denormalize_polygon};
use crate::types::{ClassTable, DatasetRole, NormalizedPolygon};
use crate::utils::{create_progress_bar, file_name_str, is_image_file};

/// Opacity of mask fills over the original pixels
pub const MASK_ALPHA: f32 = 0.5;
const BOX_THICKNESS: i32 = 2;
const TEXT_SCALE: f32 = 16.0;
const TEXT_OFFSET: i32 = 10;
// Label geometry is bounded to this many canvas sizes around the image
const CANVAS_MARGIN: f64 = 4.0;

/// Raster decode/encode and drawing primitives the renderer relies on
pub trait ImageCodec: Sync {
    fn load(&self, path: &Path) -> Result<RgbImage>;
    fn save(&self, canvas: &RgbImage, path: &Path) -> Result<()>;
    fn draw_rectangle(
        &self,
        canvas: &mut RgbImage,
        top_left: (i32, i32),
        bottom_right: (i32, i32),
        color: Rgb<u8>,
    );
    fn fill_polygon(&self, canvas: &mut RgbImage, points: &[(i32, i32)], color: Rgb<u8>);
    fn draw_text(&self, canvas: &mut RgbImage, position: (i32, i32), text: &str, color: Rgb<u8>);
    /// `canvas = overlay * alpha + canvas * (1 - alpha)`
    fn blend(&self, canvas: &mut RgbImage, overlay: &RgbImage, alpha: f32);
}

/// `image` + `imageproc` backed codec; text needs a TrueType font
pub struct RasterCodec {
    font: Option<FontVec>,
    scale: PxScale,
}

impl RasterCodec {
    pub fn new(font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => {
                let bytes = fs::read(path).map_err(|e| Coco2YoloError::io(path, e))?;
                let font = FontVec::try_from_vec(bytes).map_err(|_| {
                    Coco2YoloError::InvalidArgument(format!(
                        "{} is not a usable TrueType/OpenType font",
                        path.display()
                    ))
                })?;
                Some(font)
            }
            None => {
                warn!("No font given, class names will not be drawn");
                None
            }
        };
        Ok(Self {
            font,
            scale: PxScale::from(TEXT_SCALE),
        })
    }

    pub fn without_font() -> Self {
        Self {
            font: None,
            scale: PxScale::from(TEXT_SCALE),
        }
    }
}

impl ImageCodec for RasterCodec {
    fn load(&self, path: &Path) -> Result<RgbImage> {
        image::open(path)
            .map(|image| image.to_rgb8())
            .map_err(|source| Coco2YoloError::Image {
                path: path.to_path_buf(),
                source,
            })
    }

    fn save(&self, canvas: &RgbImage, path: &Path) -> Result<()> {
        canvas.save(path).map_err(|source| Coco2YoloError::Image {
            path: path.to_path_buf(),
            source,
        })
    }

    fn draw_rectangle(
        &self,
        canvas: &mut RgbImage,
        top_left: (i32, i32),
        bottom_right: (i32, i32),
        color: Rgb<u8>,
    ) {
        // Edges past the border are pulled in to just outside it, which leaves
        // the visible part of the box unchanged.
        let thickness = i64::from(BOX_THICKNESS);
        let bound = |v: i32, extent: u32| {
            i64::from(v).clamp(-thickness, i64::from(extent) + thickness)
        };
        let (x1, y1) = (bound(top_left.0, canvas.width()), bound(top_left.1, canvas.height()));
        let (x2, y2) = (
            bound(bottom_right.0, canvas.width()),
            bound(bottom_right.1, canvas.height()),
        );
        for inset in 0..thickness {
            let width = (x2 - x1 - 2 * inset).max(1) as u32;
            let height = (y2 - y1 - 2 * inset).max(1) as u32;
            let rect = Rect::at((x1 + inset) as i32, (y1 + inset) as i32).of_size(width, height);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn fill_polygon(&self, canvas: &mut RgbImage, points: &[(i32, i32)], color: Rgb<u8>) {
        let mut polygon: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let point = Point::new(x, y);
            if polygon.last() != Some(&point) {
                polygon.push(point);
            }
        }
        while polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }
        if polygon.len() < 3 {
            return;
        }
        draw_polygon_mut(canvas, &polygon, color);
    }

    fn draw_text(&self, canvas: &mut RgbImage, position: (i32, i32), text: &str, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, color, position.0, position.1, self.scale, font, text);
        }
    }

    fn blend(&self, canvas: &mut RgbImage, overlay: &RgbImage, alpha: f32) {
        for (base, over) in canvas.pixels_mut().zip(overlay.pixels()) {
            for channel in 0..3 {
                let mixed =
                    f32::from(over[channel]) * alpha + f32::from(base[channel]) * (1.0 - alpha);
                base[channel] = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Fixed palette indexed by class id
pub fn class_color(class_id: u64) -> Rgb<u8> {
    const PALETTE: [[u8; 3]; 6] = [
        [0, 255, 0],
        [255, 0, 0],
        [0, 128, 255],
        [255, 255, 0],
        [255, 0, 255],
        [0, 255, 255],
    ];
    Rgb(PALETTE[(class_id % PALETTE.len() as u64) as usize])
}

/// Pixel coordinate kept within a margin around the canvas
fn to_canvas(value: f64, extent: f64) -> i32 {
    let margin = extent.max(1.0) * CANVAS_MARGIN;
    value.clamp(-margin, extent + margin) as i32
}

fn to_pixels(polygon: &NormalizedPolygon, width: f64, height: f64) -> Vec<(i32, i32)> {
    denormalize_polygon(width, height, polygon)
        .into_iter()
        .map(|(x, y)| (to_canvas(x, width), to_canvas(y, height)))
        .collect()
}

fn centroid(points: &[(i32, i32)]) -> Option<(i32, i32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as i64;
    let (sx, sy) = points
        .iter()
        .fold((0i64, 0i64), |(sx, sy), &(x, y)| (sx + i64::from(x), sy + i64::from(y)));
    Some(((sx / n) as i32, (sy / n) as i32))
}

/// Draw all labels of one image onto `canvas`.
///
/// Masks are filled on a copy and blended at [`MASK_ALPHA`]; boxes and class
/// names are drawn on top at full opacity. Each annotation gets one name, at
/// its box's top-left corner or, for masks without a box, at the polygon centroid.
pub fn draw_labels<C: ImageCodec>(
    codec: &C,
    canvas: &mut RgbImage,
    labels: &[ParsedLabel],
    class_table: &ClassTable,
) {
    let (width, height) = (f64::from(canvas.width()), f64::from(canvas.height()));
    let mut texts: Vec<((i32, i32), String, Rgb<u8>)> = Vec::with_capacity(labels.len());

    let mut overlay = canvas.clone();
    let mut has_masks = false;
    for label in labels {
        let color = class_color(label.class_id);
        if let Some(polygon) = &label.polygon {
            let points = to_pixels(polygon, width, height);
            codec.fill_polygon(&mut overlay, &points, color);
            has_masks = true;
            if label.bbox.is_none() {
                if let Some(center) = centroid(&points) {
                    texts.push((center, class_table.name_of(label.class_id), color));
                }
            }
        }
    }
    if has_masks {
        codec.blend(canvas, &overlay, MASK_ALPHA);
    }

    for label in labels {
        let Some(bbox) = &label.bbox else {
            continue;
        };
        let color = class_color(label.class_id);
        let pixel = denormalize_box(width, height, bbox);
        let top_left = (to_canvas(pixel.x_min, width), to_canvas(pixel.y_min, height));
        let bottom_right = (
            to_canvas(pixel.x_min + pixel.width, width),
            to_canvas(pixel.y_min + pixel.height, height),
        );
        codec.draw_rectangle(canvas, top_left, bottom_right, color);
        let text_at = (top_left.0, top_left.1.saturating_sub(TEXT_OFFSET).max(0));
        texts.push((text_at, class_table.name_of(label.class_id), color));
    }

    for (position, text, color) in texts {
        codec.draw_text(canvas, position, &text, color);
    }
}

/// Where the labels of a role live and which layout they use
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_dir: PathBuf,
    pub layout: LabelLayout,
}

impl RenderTarget {
    /// Labels sit next to `images_dir`; split layout is detected by its sub-folders.
    pub fn for_images_dir(images_dir: &Path, output_name: &str) -> Self {
        let role_dir = images_dir.parent().unwrap_or(images_dir);
        let labels_dir = role_dir.join("labels");
        let layout = if labels_dir.join("bboxes").is_dir() || labels_dir.join("masks").is_dir() {
            LabelLayout::Split
        } else {
            LabelLayout::Combined
        };
        Self {
            images_dir: images_dir.to_path_buf(),
            labels_dir,
            output_dir: role_dir.join(output_name),
            layout,
        }
    }

    /// Label files to read for an image, in drawing order
    pub fn label_files(&self, image_name: &str) -> Vec<(PathBuf, LabelKind)> {
        let name = label_file_name(image_name);
        match self.layout {
            LabelLayout::Combined => vec![(self.labels_dir.join(name), LabelKind::Combined)],
            LabelLayout::Split => vec![
                (self.labels_dir.join("bboxes").join(&name), LabelKind::Bbox),
                (self.labels_dir.join("masks").join(name), LabelKind::Mask),
            ],
        }
    }
}

// Struct to hold render statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderStats {
    pub images_rendered: usize,
    pub missing_labels: usize,
    pub failed_images: usize,
}

impl RenderStats {
    pub fn absorb(&mut self, other: &RenderStats) {
        self.images_rendered += other.images_rendered;
        self.missing_labels += other.missing_labels;
        self.failed_images += other.failed_images;
    }

    pub fn print_summary(&self, scope: &str) {
        info!("=== Render Summary ({}) ===", scope);
        info!("Images rendered: {}", self.images_rendered);
        if self.missing_labels > 0 {
            warn!("Images skipped, label file missing: {}", self.missing_labels);
        }
        if self.failed_images > 0 {
            warn!("Images that could not be rendered: {}", self.failed_images);
        }
    }
}

/// Render one image; `LabelFileMissing` when any of its label files is absent
pub fn render_image<C: ImageCodec>(
    codec: &C,
    image_path: &Path,
    target: &RenderTarget,
    class_table: &ClassTable,
) -> Result<PathBuf> {
    let image_name = file_name_str(image_path).ok_or_else(|| {
        Coco2YoloError::InvalidArgument(format!(
            "file name is not valid UTF-8: {}",
            image_path.display()
        ))
    })?;

    let mut labels = Vec::new();
    for (label_path, kind) in target.label_files(image_name) {
        if !label_path.is_file() {
            return Err(Coco2YoloError::LabelFileMissing {
                image: image_path.to_path_buf(),
                expected: label_path,
            });
        }
        labels.extend(read_label_file(&label_path, kind)?);
    }

    let mut canvas = codec.load(image_path)?;
    draw_labels(codec, &mut canvas, &labels, class_table);
    let output_path = target.output_dir.join(image_name);
    codec.save(&canvas, &output_path)?;
    Ok(output_path)
}

fn list_images(images_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", Pattern::escape(&images_dir.to_string_lossy()));
    let entries = glob(&pattern).map_err(|e| Coco2YoloError::InvalidArgument(e.to_string()))?;
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort();
    Ok(images)
}

/// Render every image of one role; missing labels and unreadable images are counted, not fatal
pub fn render_role<C: ImageCodec>(
    codec: &C,
    target: &RenderTarget,
    class_table: &ClassTable,
    label: &str,
) -> Result<RenderStats> {
    let images = list_images(&target.images_dir)?;
    ensure_dir(&target.output_dir)?;

    let pb = create_progress_bar(images.len() as u64, label);
    let stats = images
        .par_iter()
        .map(|image_path| {
            let outcome = render_image(codec, image_path, target, class_table);
            pb.inc(1);
            match outcome {
                Ok(_) => RenderStats {
                    images_rendered: 1,
                    ..Default::default()
                },
                Err(e @ Coco2YoloError::LabelFileMissing { .. }) => {
                    warn!("{}", e);
                    RenderStats {
                        missing_labels: 1,
                        ..Default::default()
                    }
                }
                Err(e) => {
                    error!("Failed to render {}: {}", image_path.display(), e);
                    RenderStats {
                        failed_images: 1,
                        ..Default::default()
                    }
                }
            }
        })
        .reduce(RenderStats::default, |mut total, part| {
            total.absorb(&part);
            total
        });
    pb.finish_with_message(format!("{} rendering complete", label));
    stats.print_summary(label);
    Ok(stats)
}

/// Render all roles listed in a dataset's `data.yaml`
pub fn render_dataset<C: ImageCodec>(
    codec: &C,
    summary_path: &Path,
    output_name: &str,
) -> Result<Vec<(DatasetRole, RenderStats)>> {
    let summary = read_summary(summary_path)?;
    let mut reports = Vec::new();
    for role in DatasetRole::ALL {
        let images_dir = summary.images_dir(role);
        if !images_dir.is_dir() {
            warn!("[{}] No images folder at {}, skipping role", role, images_dir.display());
            continue;
        }
        let target = RenderTarget::for_images_dir(images_dir, output_name);
        info!(
            "[{}] Rendering {:?} labels into {}",
            role,
            target.layout,
            target.output_dir.display()
        );
        let stats = render_role(codec, &target, &summary.names, role.dir_name())?;
        reports.push((role, stats));
    }
    Ok(reports)
}
