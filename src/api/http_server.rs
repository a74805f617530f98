// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection service HTTP server

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, root_handler};
use super::predict::predict_handler;
use crate::detection::DetectionService;

/// Allowance for multipart boundaries and headers on top of the image itself
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DetectionService>,
}

impl AppState {
    pub fn new(service: Arc<DetectionService>) -> Self {
        Self { service }
    }
}

/// Build the detection service router
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.service.max_image_bytes() + MULTIPART_OVERHEAD;

    Router::new()
        // Liveness banner
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        // Inference endpoint (with and without trailing slash)
        .route("/predict/", post(predict_handler))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the detection API on `listener` until `shutdown` resolves
pub async fn start_server<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);

    tracing::info!("Detection API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
