// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for object detection
//!
//! This module provides:
//! - The [`ObjectDetector`] capability and its ONNX YOLO implementation
//! - Letterbox pre-processing and YOLO output post-processing
//! - Annotated image rendering

pub mod annotate;
pub mod detector;
pub mod image_utils;
pub mod labels;
pub mod postprocess;
pub mod types;
pub mod yolo;

pub use annotate::Annotator;
pub use detector::{DetectorError, ObjectDetector};
pub use image_utils::{decode_image_bytes, detect_format, load_image_file, ImageError, ImageInfo};
pub use labels::{class_name, COCO_CLASSES, COCO_CLASS_COUNT};
pub use types::{BoundingBox, Detection};
pub use yolo::YoloDetector;
