// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-instance detection service
//!
//! Owns the loaded detector, the annotator and the output store. One
//! instance is built at startup and shared with every request handler.

use anyhow::Context;
use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DetectionConfig;
use crate::storage::{OutputStore, StorageError};
use crate::utils::secure_filename;
use crate::vision::image_utils::{format_to_extension, MAX_IMAGE_SIZE};
use crate::vision::{
    decode_image_bytes, detect_format, load_image_file, Annotator, Detection, DetectorError,
    ImageError, ObjectDetector, YoloDetector,
};

/// Result of one inference, returned to callers of the predict endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub detections: Vec<Detection>,
    /// Annotated image, `<output_dir>/images/<uuid>.jpg`
    pub image_path: String,
    /// Detection sidecar, `<output_dir>/json/<uuid>.json`
    pub json_path: String,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImageError),

    #[error("Detection failed: {0}")]
    Detector(#[from] DetectorError),

    #[error("Failed to store outputs: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to stage upload: {0}")]
    Upload(#[from] std::io::Error),

    #[error("Inference task failed: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Whether the failure was caused by the client's input
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServiceError::InvalidImage(_))
    }
}

/// Detection service shared by all requests
pub struct DetectionService {
    detector: Arc<dyn ObjectDetector>,
    store: OutputStore,
    annotator: Annotator,
    temp_dir: PathBuf,
    max_image_bytes: usize,
}

impl std::fmt::Debug for DetectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionService")
            .field("model", &self.detector.name())
            .field("store", &self.store)
            .field("temp_dir", &self.temp_dir)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish_non_exhaustive()
    }
}

impl DetectionService {
    pub fn new(detector: Arc<dyn ObjectDetector>, store: OutputStore, annotator: Annotator) -> Self {
        Self {
            detector,
            store,
            annotator,
            temp_dir: std::env::temp_dir(),
            max_image_bytes: MAX_IMAGE_SIZE,
        }
    }

    /// Load the ONNX detector and prepare output directories
    pub fn from_config(config: &DetectionConfig) -> anyhow::Result<Self> {
        let detector = YoloDetector::new(&config.detector)?;
        let store = OutputStore::new(&config.output_dir).with_context(|| {
            format!(
                "Failed to create output directories under {}",
                config.output_dir.display()
            )
        })?;
        let annotator = Annotator::new()?;

        let mut service = Self::new(Arc::new(detector), store, annotator)
            .with_max_image_bytes(config.max_image_bytes);
        if let Some(temp_dir) = &config.temp_dir {
            std::fs::create_dir_all(temp_dir)
                .with_context(|| format!("Failed to create temp dir {}", temp_dir.display()))?;
            service = service.with_temp_dir(temp_dir.clone());
        }
        Ok(service)
    }

    /// Directory for transient upload files
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn model_name(&self) -> &str {
        self.detector.name()
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Detect, annotate and persist under a fresh identifier
    ///
    /// Blocking; async callers should use [`run_inference`](Self::run_inference).
    pub fn infer_blocking(&self, image: &DynamicImage) -> Result<InferenceResult, ServiceError> {
        let start = Instant::now();
        let detections = self.detector.detect(image)?;

        let id = Uuid::new_v4().to_string();
        let annotated = self.annotator.annotate(image, &detections);
        let stored = self.store.persist(&id, &annotated, &detections)?;

        info!(
            "Inference {} complete: {} detections in {}ms",
            id,
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(InferenceResult {
            detections,
            image_path: stored.image_path,
            json_path: stored.json_path,
        })
    }

    /// Run inference on the blocking thread pool
    pub async fn run_inference(
        self: &Arc<Self>,
        image: DynamicImage,
    ) -> Result<InferenceResult, ServiceError> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.infer_blocking(&image))
            .await
            .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
    }

    /// Stage an uploaded file on disk, run inference on it, then remove it
    ///
    /// The staged file is named `temp_<sanitized filename>_<random>.<ext>` and
    /// is deleted when this call returns, whatever the outcome.
    pub async fn run_inference_on_upload(
        self: &Arc<Self>,
        filename: Option<&str>,
        data: Bytes,
    ) -> Result<InferenceResult, ServiceError> {
        let service = Arc::clone(self);
        let prefix = format!(
            "temp_{}_",
            filename.map(secure_filename).unwrap_or_default()
        );

        tokio::task::spawn_blocking(move || -> Result<InferenceResult, ServiceError> {
            if data.len() > service.max_image_bytes {
                return Err(ImageError::TooLarge(data.len(), service.max_image_bytes).into());
            }

            let suffix = detect_format(&data)
                .map(|format| format!(".{}", format_to_extension(format)))
                .unwrap_or_default();
            let mut staged = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .tempfile_in(&service.temp_dir)?;
            staged.write_all(&data)?;
            staged.flush()?;
            debug!("Staged upload at {}", staged.path().display());

            let bytes = std::fs::read(staged.path())?;
            let (image, image_info) = decode_image_bytes(&bytes, service.max_image_bytes)?;
            debug!(
                "Decoded upload: {}x{}, {} bytes",
                image_info.width, image_info.height, image_info.size_bytes
            );

            service.infer_blocking(&image)
        })
        .await
        .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
    }

    /// Load an image file from disk and run inference on it
    pub async fn run_inference_on_path(
        self: &Arc<Self>,
        path: &Path,
    ) -> Result<InferenceResult, ServiceError> {
        let (image, _) = load_image_file(path, self.max_image_bytes).await?;
        self.run_inference(image).await
    }
}
