// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Render detections over the source image

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::labels::COCO_CLASS_COUNT;
use super::types::Detection;

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Padding around label text, in pixels
const LABEL_PADDING: u32 = 2;

/// Draws bounding boxes and `"<class> <confidence>"` tags
#[derive(Clone)]
pub struct Annotator {
    font: FontArc,
    font_scale: PxScale,
    /// One colour per COCO class, reused cyclically for larger ids
    palette: Vec<Rgb<u8>>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("font_scale", &self.font_scale)
            .field("palette_len", &self.palette.len())
            .finish_non_exhaustive()
    }
}

impl Annotator {
    /// Create an annotator using the embedded DejaVu Sans font
    pub fn new() -> Result<Self> {
        let font =
            FontArc::try_from_slice(FONT_DATA).context("Failed to load embedded label font")?;

        let palette = (0..COCO_CLASS_COUNT)
            .map(|i| {
                let hue = (i as f32 / COCO_CLASS_COUNT as f32) * 360.0;
                hsv_to_rgb(hue, 0.8, 0.9)
            })
            .collect();

        Ok(Self {
            font,
            font_scale: PxScale::from(16.0),
            palette,
        })
    }

    /// Stable colour for a class id
    pub fn color_for(&self, class_id: u32) -> Rgb<u8> {
        self.palette[class_id as usize % self.palette.len()]
    }

    /// Return a copy of `image` with every detection drawn on it
    pub fn annotate(&self, image: &DynamicImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.to_rgb8();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        canvas
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let color = self.color_for(detection.class_id);
        let bbox = detection.bbox.clamp_to(canvas.width(), canvas.height());

        let x = bbox.xmin.round() as i32;
        let y = bbox.ymin.round() as i32;
        let width = bbox.width().round().max(0.0) as u32;
        let height = bbox.height().round().max(0.0) as u32;

        if width == 0 || height == 0 {
            return;
        }

        draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(width, height), color);
        // Second, inset border for a 2px outline
        if width > 2 && height > 2 {
            draw_hollow_rect_mut(
                canvas,
                Rect::at(x + 1, y + 1).of_size(width - 2, height - 2),
                color,
            );
        }

        let label = format!("{} {:.2}", detection.class_name, detection.confidence);
        let (text_w, text_h) = text_size(self.font_scale, &self.font, &label);
        let tag_w = text_w + 2 * LABEL_PADDING;
        let tag_h = text_h.max(1) + 2 * LABEL_PADDING;

        // Above the box when there is room, otherwise inside its top edge
        let tag_y = if y >= tag_h as i32 { y - tag_h as i32 } else { y };

        draw_filled_rect_mut(canvas, Rect::at(x, tag_y).of_size(tag_w, tag_h), color);
        draw_text_mut(
            canvas,
            contrast_color(color),
            x + LABEL_PADDING as i32,
            tag_y + LABEL_PADDING as i32,
            self.font_scale,
            &self.font,
            &label,
        );
    }
}

/// HSV to RGB, `h` in degrees
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

/// Black or white, whichever reads better on `background`
fn contrast_color(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luma > 150.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}
