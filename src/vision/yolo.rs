// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO object detector backed by ONNX Runtime
//!
//! Loads a YOLOv5/YOLOv8 ONNX export once and serves every request from the
//! same session. The session is guarded by a mutex, so inference is
//! serialized per process.

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::detector::{DetectorError, ObjectDetector};
use super::postprocess::{decode_output, finalize, preprocess};
use super::types::Detection;
use crate::config::DetectorConfig;

/// ONNX YOLO detector
#[derive(Clone)]
pub struct YoloDetector {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Display name derived from the model file
    name: String,
    input_size: u32,
    num_classes: usize,
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("num_classes", &self.num_classes)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load the detector from the configured model file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let model_path = config.model_path.as_path();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = if config.use_cuda {
            info!("   Attempting CUDA execution provider...");
            match Self::build_session(model_path, true) {
                Ok(s) => {
                    info!("✅ CUDA execution provider initialized successfully!");
                    s
                }
                Err(e) => {
                    warn!("⚠️  CUDA execution provider failed: {}", e);
                    warn!("   Falling back to CPU execution provider");
                    Self::build_session(model_path, false)?
                }
            }
        } else {
            Self::build_session(model_path, false)?
        };

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("Detection model input type: {:?}", input.input_type);
        }

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        info!("✅ Detection model '{}' loaded (input: {})", name, input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            name,
            input_size: config.input_size,
            num_classes: config.num_classes,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        })
    }

    fn build_session(model_path: &Path, cuda: bool) -> Result<Session> {
        let builder = Session::builder().context("Failed to create session builder")?;
        let builder = if cuda {
            builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .context("Failed to set CUDA execution provider")?
        } else {
            builder
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .context("Failed to set CPU execution provider")?
        };

        builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detection model from {}",
                model_path.display()
            ))
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let start = Instant::now();
        let (tensor, letterbox) = preprocess(image, self.input_size);

        let input_value =
            Value::from_array(tensor).map_err(|e| DetectorError::Inference(e.to_string()))?;

        let candidates = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| DetectorError::LockPoisoned)?;

            let outputs = session
                .run(ort::inputs![&self.input_name => input_value])
                .map_err(|e| DetectorError::Inference(e.to_string()))?;

            let output_tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| DetectorError::Inference(e.to_string()))?;

            debug!("Detection output shape: {:?}", output_tensor.shape());
            decode_output(
                output_tensor.view(),
                self.num_classes,
                self.confidence_threshold,
            )?
        };

        let detections = finalize(
            candidates,
            &letterbox,
            self.iou_threshold,
            self.max_detections,
        );

        debug!(
            "Detected {} objects in {}ms",
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
