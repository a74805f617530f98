// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection result types shared by the detector, the HTTP API and the relay

use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Build from a center point and size (the YOLO head's native layout)
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Non-degenerate, finite box (`xmin < xmax` and `ymin < ymax`)
    pub fn is_valid(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.xmin < self.xmax
            && self.ymin < self.ymax
    }

    /// Clamp the box to `[0, width] x [0, height]`
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self::new(
            self.xmin.clamp(0.0, w),
            self.ymin.clamp(0.0, h),
            self.xmax.clamp(0.0, w),
            self.ymax.clamp(0.0, h),
        )
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = self.xmax.min(other.xmax);
        let y2 = self.ymax.min(other.ymax);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One recognized object instance
///
/// Serialized with the field names clients of the predict endpoint expect:
/// `{"class_id", "class", "confidence", "bbox": {xmin, ymin, xmax, ymax}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    #[serde(rename = "class", alias = "class_name")]
    pub class_name: String,
    /// Score in `[0, 1]`
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: u32, class_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }

    /// Whether this detection satisfies the box and score invariants
    pub fn is_valid(&self) -> bool {
        self.bbox.is_valid() && (0.0..=1.0).contains(&self.confidence)
    }
}
