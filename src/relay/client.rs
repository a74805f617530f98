// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for forwarding uploads to the detection service

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::predict::{PredictResponse, FILE_FIELD};
use crate::config::RelayConfig;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The detection service answered with a non-success status
    #[error("AI backend error: {body}")]
    Upstream { status: u16, body: String },

    /// No usable response (connect failure, timeout, reset)
    #[error("AI backend unreachable: {0}")]
    Transport(String),

    #[error("AI backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Client for the detection service's predict endpoint
pub struct DetectionClient {
    client: Client,
    endpoint: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl std::fmt::Debug for DetectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionClient")
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl DetectionClient {
    /// Create a new DetectionClient
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::Client(e.to_string()))?;

        info!(
            "Detection client configured: endpoint={}, timeout={:?}, retries={}",
            config.detection_url, config.request_timeout, config.max_retries
        );

        Ok(Self {
            client,
            endpoint: config.detection_url.clone(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Forward `data` as multipart field `file` and parse the detection result
    ///
    /// Transport failures are retried up to `max_retries` times with a
    /// linearly growing delay. Non-success responses are returned as-is.
    pub async fn predict(&self, filename: &str, data: Bytes) -> Result<PredictResponse, RelayError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(filename, data.clone()).await {
                Err(RelayError::Transport(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt;
                    warn!(
                        "Detection request failed ({}), retry {}/{} in {:?}",
                        reason, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once(&self, filename: &str, data: Bytes) -> Result<PredictResponse, RelayError> {
        let part = Part::bytes(data.to_vec()).file_name(filename.to_string());
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Detection service returned {}: {}", status, body);
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<PredictResponse>()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))
    }

    /// Check if the detection service answers on its root endpoint
    pub async fn health_check(&self) -> bool {
        let root = match url::Url::parse(&self.endpoint).and_then(|u| u.join("/")) {
            Ok(url) => url,
            Err(e) => {
                debug!("Invalid detection endpoint {}: {}", self.endpoint, e);
                return false;
            }
        };

        match self.client.get(root).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Detection health check failed: {}", e);
                false
            }
        }
    }
}
