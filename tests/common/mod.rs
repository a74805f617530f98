// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared helpers for integration tests
#![allow(dead_code)]

use detection_node::{
    detection::DetectionService,
    storage::OutputStore,
    vision::{Annotator, BoundingBox, Detection, DetectorError, ObjectDetector},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BOUNDARY: &str = "----detection-node-test-boundary";

/// Detector returning a fixed result and counting invocations
pub struct FakeDetector {
    detections: Vec<Detection>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeDetector {
    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            detections: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ObjectDetector for FakeDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DetectorError::Inference("model exploded".to_string()));
        }

        // Keep boxes inside the image like a real detector would
        Ok(self
            .detections
            .iter()
            .map(|d| {
                let mut d = d.clone();
                d.bbox = d.bbox.clamp_to(image.width(), image.height());
                d
            })
            .collect())
    }

    fn name(&self) -> &str {
        "fake-detector"
    }
}

pub fn sample_detections() -> Vec<Detection> {
    vec![
        Detection::new(16, "dog", 0.91, BoundingBox::new(10.0, 12.0, 60.0, 70.0)),
        Detection::new(0, "person", 0.55, BoundingBox::new(40.0, 5.0, 95.0, 75.0)),
    ]
}

pub fn build_service(detector: Arc<FakeDetector>, root: &Path) -> Arc<DetectionService> {
    let store = OutputStore::new(root.join("outputs")).unwrap();
    let annotator = Annotator::new().unwrap();
    std::fs::create_dir_all(root.join("staging")).unwrap();

    Arc::new(DetectionService::new(detector, store, annotator).with_temp_dir(root.join("staging")))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 120, 200])));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// One multipart part: field name, optional filename, content
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn file_part<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name: "file",
        filename: Some(filename),
        data,
    }
}
