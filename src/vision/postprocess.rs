// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pre- and post-processing for YOLO-family ONNX exports
//!
//! The exported graph takes a letterboxed `[1, 3, S, S]` tensor and emits raw
//! candidates. Two output layouts are recognized:
//! - YOLOv5: `[1, N, 5 + C]` rows of `cx, cy, w, h, objectness, class scores...`
//! - YOLOv8: `[1, 4 + C, N]` columns of `cx, cy, w, h, class scores...`
//!
//! Candidates are filtered by score, suppressed per class, mapped back to
//! source pixels and clamped to the image.

use image::{imageops, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array4, ArrayView2, ArrayViewD, Axis, Ix2};

use super::detector::DetectorError;
use super::labels::class_name;
use super::types::{BoundingBox, Detection};

/// Padding colour used by the reference YOLO letterbox
pub const LETTERBOX_FILL: u8 = 114;

/// Geometry of a letterbox resize, used to map boxes back to the source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Source image width
    pub source_width: u32,
    /// Source image height
    pub source_height: u32,
    /// Square target size
    pub target_size: u32,
    /// Scale applied to the source image
    pub scale: f32,
    /// Horizontal padding (left side)
    pub pad_x: u32,
    /// Vertical padding (top side)
    pub pad_y: u32,
}

impl Letterbox {
    pub fn new(source_width: u32, source_height: u32, target_size: u32) -> Self {
        let scale_w = target_size as f32 / source_width.max(1) as f32;
        let scale_h = target_size as f32 / source_height.max(1) as f32;
        let scale = scale_w.min(scale_h);

        let new_w = ((source_width as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((source_height as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            source_width,
            source_height,
            target_size,
            scale,
            pad_x: (target_size - new_w) / 2,
            pad_y: (target_size - new_h) / 2,
        }
    }

    /// Resized content size inside the padded square
    pub fn content_size(&self) -> (u32, u32) {
        (
            ((self.source_width as f32 * self.scale).round() as u32).clamp(1, self.target_size),
            ((self.source_height as f32 * self.scale).round() as u32).clamp(1, self.target_size),
        )
    }

    /// Resize `image` into a padded square canvas
    pub fn apply(&self, image: &DynamicImage) -> RgbImage {
        let (new_w, new_h) = self.content_size();
        let resized = imageops::resize(
            &image.to_rgb8(),
            new_w,
            new_h,
            imageops::FilterType::Triangle,
        );

        let mut canvas = RgbImage::from_pixel(
            self.target_size,
            self.target_size,
            Rgb([LETTERBOX_FILL; 3]),
        );
        imageops::replace(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);
        canvas
    }

    /// Map a box from model input space back to source pixels, clamped to the image
    pub fn unmap(&self, bbox: &BoundingBox) -> BoundingBox {
        let (px, py) = (self.pad_x as f32, self.pad_y as f32);
        BoundingBox::new(
            (bbox.xmin - px) / self.scale,
            (bbox.ymin - py) / self.scale,
            (bbox.xmax - px) / self.scale,
            (bbox.ymax - py) / self.scale,
        )
        .clamp_to(self.source_width, self.source_height)
    }
}

/// Letterbox an image and convert it to a normalized NCHW tensor
pub fn preprocess(image: &DynamicImage, target_size: u32) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::new(width, height, target_size);
    let canvas = letterbox.apply(image);

    let size = target_size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, letterbox)
}

/// Highest-scoring class from an iterator of per-class scores
fn best_class(scores: impl Iterator<Item = f32>) -> Option<(u32, f32)> {
    scores
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(u32, f32)>, (idx, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((idx as u32, score)),
        })
}

/// Decode a YOLOv5 output matrix (`N` rows of `5 + C` values)
pub fn decode_yolov5(output: ArrayView2<'_, f32>, confidence_threshold: f32) -> Vec<Detection> {
    output
        .outer_iter()
        .filter_map(|row| {
            let objectness = row[4];
            if !objectness.is_finite() || objectness < confidence_threshold {
                return None;
            }
            let (class_id, class_score) = best_class(row.iter().skip(5).copied())?;
            let confidence = objectness * class_score;
            if confidence < confidence_threshold {
                return None;
            }
            Some(Detection::new(
                class_id,
                class_name(class_id),
                confidence,
                BoundingBox::from_center(row[0], row[1], row[2], row[3]),
            ))
        })
        .collect()
}

/// Decode a YOLOv8 output matrix (`4 + C` rows by `N` columns)
pub fn decode_yolov8(output: ArrayView2<'_, f32>, confidence_threshold: f32) -> Vec<Detection> {
    output
        .axis_iter(Axis(1))
        .filter_map(|col| {
            let (class_id, confidence) = best_class(col.iter().skip(4).copied())?;
            if confidence < confidence_threshold {
                return None;
            }
            Some(Detection::new(
                class_id,
                class_name(class_id),
                confidence,
                BoundingBox::from_center(col[0], col[1], col[2], col[3]),
            ))
        })
        .collect()
}

/// Decode a raw output tensor, picking the layout from the channel count
///
/// A YOLOv5 export carries `5 + num_classes` channels per candidate along its
/// last axis, a YOLOv8 export carries `4 + num_classes` along its first. The
/// candidate count depends on the input size and can match either axis, so
/// the shape alone only decides when both channel counts fit.
pub fn decode_output(
    output: ArrayViewD<'_, f32>,
    num_classes: usize,
    confidence_threshold: f32,
) -> Result<Vec<Detection>, DetectorError> {
    let shape = output.shape().to_vec();
    let matrix = match shape.len() {
        3 if shape[0] == 1 => output.index_axis_move(Axis(0), 0),
        2 => output,
        _ => return Err(DetectorError::UnexpectedOutput(shape)),
    };
    let matrix = matrix
        .into_dimensionality::<Ix2>()
        .map_err(|_| DetectorError::UnexpectedOutput(shape.clone()))?;

    let (rows, cols) = matrix.dim();
    let v5_channels = cols == num_classes + 5;
    let v8_channels = rows == num_classes + 4;
    let rows_are_candidates = match (v5_channels, v8_channels) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => rows >= cols,
        (false, false) => return Err(DetectorError::UnexpectedOutput(shape)),
    };

    if rows_are_candidates {
        Ok(decode_yolov5(matrix, confidence_threshold))
    } else {
        Ok(decode_yolov8(matrix, confidence_threshold))
    }
}

/// Greedy per-class non-maximum suppression
///
/// Returns at most `max_detections` boxes, highest confidence first. A box is
/// dropped when it overlaps an already kept box of the same class by more
/// than `iou_threshold`.
pub fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len().min(max_detections));
    for det in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

/// Suppress overlaps, map to source pixels and drop anything that ends up degenerate
pub fn finalize(
    candidates: Vec<Detection>,
    letterbox: &Letterbox,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    non_max_suppression(candidates, iou_threshold, max_detections)
        .into_iter()
        .filter_map(|mut det| {
            det.bbox = letterbox.unmap(&det.bbox);
            det.confidence = det.confidence.clamp(0.0, 1.0);
            det.is_valid().then_some(det)
        })
        .collect()
}
