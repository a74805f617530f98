// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the detection service

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::retention_from_env;
use crate::storage::RetentionPolicy;
use crate::vision::COCO_CLASS_COUNT;

/// Default upload cap for images (20MB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for the detection service and its model
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Detector settings
    pub detector: DetectorConfig,
    /// Root of the `images/` and `json/` output directories
    pub output_dir: PathBuf,
    /// Directory for transient upload files (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// Largest accepted upload in bytes
    pub max_image_bytes: usize,
    /// Retention applied to generated outputs
    pub retention: RetentionPolicy,
    /// How often the retention sweeper runs
    pub sweep_interval: Duration,
}

/// Settings for the ONNX object detector
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path to the exported YOLO model
    pub model_path: PathBuf,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Number of classes the model was trained on
    pub num_classes: usize,
    /// Minimum score for a detection to be kept
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes of the same class are suppressed
    pub iou_threshold: f32,
    /// Upper bound on detections returned per image
    pub max_detections: usize,
    /// Try the CUDA execution provider before CPU
    pub use_cuda: bool,
}

impl DetectionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env::var("DETECTION_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            detector: DetectorConfig::from_env(),
            output_dir: env::var("DETECTION_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            temp_dir: env::var("DETECTION_TEMP_DIR").ok().map(PathBuf::from),
            max_image_bytes: env::var("DETECTION_MAX_IMAGE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_image_bytes),
            retention: retention_from_env(""),
            sweep_interval: env::var("RETENTION_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.trim().is_empty() {
            return Err("Listen address must not be empty".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }
        if self.max_image_bytes == 0 {
            return Err("Max image size must be greater than 0".to_string());
        }
        if self.sweep_interval.is_zero() {
            return Err("Retention sweep interval must be greater than 0".to_string());
        }
        self.detector.validate()
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            detector: DetectorConfig::default(),
            output_dir: PathBuf::from("outputs"),
            temp_dir: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            retention: RetentionPolicy::default(),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl DetectorConfig {
    /// Load detector settings from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: env::var("DETECTION_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            input_size: env::var("DETECTION_INPUT_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.input_size),
            num_classes: env::var("DETECTION_NUM_CLASSES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.num_classes),
            confidence_threshold: env::var("DETECTION_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: env::var("DETECTION_IOU")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.iou_threshold),
            max_detections: env::var("DETECTION_MAX_DETECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_detections),
            use_cuda: env::var("DETECTION_USE_CUDA")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.use_cuda),
        }
    }

    /// Validate detector settings
    pub fn validate(&self) -> Result<(), String> {
        if self.model_path.as_os_str().is_empty() {
            return Err("Model path must not be empty".to_string());
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(format!(
                "Input size must be a positive multiple of 32, got {}",
                self.input_size
            ));
        }
        if self.num_classes == 0 {
            return Err("Number of classes must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "Confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "IoU threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        if self.max_detections == 0 {
            return Err("Max detections must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/yolov5s.onnx"),
            input_size: 640,
            num_classes: COCO_CLASS_COUNT,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            use_cuda: false,
        }
    }
}
