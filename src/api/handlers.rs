// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::http_server::AppState;
use crate::version::VERSION_NUMBER;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub status: String,
    pub endpoints: Vec<String>,
    pub model: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET / - Liveness banner listing the available endpoints
pub async fn root_handler(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "Detection service is running".to_string(),
        endpoints: vec!["/predict/".to_string()],
        model: state.service.model_name().to_string(),
        version: VERSION_NUMBER.to_string(),
    })
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
