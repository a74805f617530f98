// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detector abstraction
//!
//! The detection service only depends on this trait; the ONNX-backed
//! [`YoloDetector`](super::yolo::YoloDetector) is the production
//! implementation.

use image::DynamicImage;
use thiserror::Error;

use super::types::Detection;

/// Errors raised while running a detector
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Unexpected model output shape: {0:?}")]
    UnexpectedOutput(Vec<usize>),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Detector session lock poisoned")]
    LockPoisoned,
}

/// Something that finds objects in an image
///
/// Implementations must be callable from several threads; inference is
/// invoked from the blocking thread pool.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectDetector: Send + Sync {
    /// Detect objects in `image`
    ///
    /// Returned boxes are in source pixel coordinates with
    /// `xmin < xmax`, `ymin < ymax` and confidence in `[0, 1]`.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;

    /// Model name reported by the liveness endpoint
    fn name(&self) -> &str;
}
