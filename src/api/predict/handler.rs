// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict endpoint handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, warn};

use super::response::PredictResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// POST /predict/ - Detect objects in an uploaded image
///
/// Runs the detector over the image, writes the annotated image and a JSON
/// sidecar under a fresh UUID, and returns the detections with both paths.
///
/// # Request
/// - `multipart/form-data` with the image in a field named `file`
///
/// # Response
/// - `detections`: `[{class_id, class, confidence, bbox: {xmin, ymin, xmax, ymax}}]`
/// - `image_path`: `<output_dir>/images/<uuid>.jpg`
/// - `json_path`: `<output_dir>/json/<uuid>.json`
///
/// # Errors
/// - 400 Bad Request: missing `file` field, empty or undecodable image
/// - 413 Payload Too Large: image exceeds the configured limit
/// - 500 Internal Server Error: detector or storage failure
pub async fn predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut upload: Option<(Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge {
                size: 0,
                max: state.service.max_image_bytes(),
            }
        } else {
            ApiError::InvalidRequest(e.body_text())
        }
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| {
        warn!("Predict request without a '{}' field", FILE_FIELD);
        ApiError::ValidationError {
            field: FILE_FIELD.to_string(),
            message: "No file part".to_string(),
        }
    })?;

    if data.is_empty() {
        return Err(ApiError::InvalidRequest("Uploaded file is empty".to_string()));
    }

    debug!(
        "Predict request: file={:?}, {} bytes",
        filename.as_deref(),
        data.len()
    );

    let result = state
        .service
        .run_inference_on_upload(filename.as_deref(), data)
        .await?;

    Ok(Json(result))
}
