// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Liveness endpoint tests for GET / and GET /health

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use detection_node::api::{create_app, AppState, HealthResponse, RootResponse};
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::{build_service, sample_detections, FakeDetector};

#[tokio::test]
async fn test_root_reports_running_service() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = create_app(AppState::new(build_service(detector.clone(), dir.path())));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let root: RootResponse = serde_json::from_slice(&body).unwrap();

    assert_eq!(root.status, "Detection service is running");
    assert!(root.endpoints.contains(&"/predict/".to_string()));
    assert_eq!(root.model, "fake-detector");
    assert!(!root.version.is_empty());

    // Liveness never touches the model
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(Vec::new()));
    let app = create_app(AppState::new(build_service(detector, dir.path())));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_predict_rejects_get() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(Vec::new()));
    let app = create_app(AppState::new(build_service(detector, dir.path())));

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/predict/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
