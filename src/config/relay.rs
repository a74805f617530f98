// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the relay/UI service

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::retention_from_env;
use crate::storage::RetentionPolicy;

/// Configuration for the browser-facing relay service
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Full URL of the detection service's predict endpoint
    pub detection_url: String,
    /// Directory the detection service's relative output paths resolve against
    pub detection_output_root: PathBuf,
    /// Where uploaded files are kept
    pub upload_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Timeout for a single forwarding attempt
    pub request_timeout: Duration,
    /// Extra attempts after a transport failure (0 = single attempt)
    pub max_retries: u32,
    /// Delay added per retry attempt
    pub retry_backoff: Duration,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
    /// Retention applied to uploads and copied static images
    pub retention: RetentionPolicy,
    /// How often the retention sweeper runs
    pub sweep_interval: Duration,
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env::var("RELAY_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            detection_url: env::var("DETECTION_URL").unwrap_or(defaults.detection_url),
            detection_output_root: env::var("DETECTION_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.detection_output_root),
            upload_dir: env::var("RELAY_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            static_dir: env::var("RELAY_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            request_timeout: env::var("RELAY_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_retries: env::var("RELAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: env::var("RELAY_RETRY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            max_upload_bytes: env::var("RELAY_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            retention: retention_from_env("RELAY_"),
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
        let url = url::Url::parse(&self.detection_url)
            .map_err(|e| format!("Invalid detection URL '{}': {}", self.detection_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!(
                "Detection URL must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.upload_dir.as_os_str().is_empty() || self.static_dir.as_os_str().is_empty() {
            return Err("Upload and static directories must not be empty".to_string());
        }
        if self.request_timeout.is_zero() {
            return Err("Request timeout must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Max upload size must be greater than 0".to_string());
        }
        if self.sweep_interval.is_zero() {
            return Err("Retention sweep interval must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            detection_url: "http://127.0.0.1:8000/predict/".to_string(),
            detection_output_root: PathBuf::from("."),
            upload_dir: PathBuf::from("ui_uploads"),
            static_dir: PathBuf::from("static"),
            request_timeout: Duration::from_secs(60),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            max_upload_bytes: super::detection::DEFAULT_MAX_IMAGE_BYTES,
            retention: RetentionPolicy::default(),
            sweep_interval: Duration::from_secs(300),
        }
    }
}
