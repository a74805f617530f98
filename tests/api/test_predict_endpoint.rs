// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Predict endpoint tests for POST /predict/
//!
//! These tests verify that the predict handler:
//! - Persists an annotated JPEG and a JSON sidecar per request
//! - Returns detections whose boxes lie inside the source image
//! - Rejects missing, empty, undecodable and oversized uploads
//! - Uses a fresh identifier for every request, including concurrent ones

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use detection_node::{
    api::{create_app, AppState, ErrorResponse, PredictResponse},
    detection::DetectionService,
    vision::Detection,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::{
    build_service, file_part, multipart_body, multipart_content_type, png_bytes,
    sample_detections, FakeDetector, Part,
};

const WIDTH: u32 = 100;
const HEIGHT: u32 = 80;

fn predict_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, uri: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(predict_request(uri, body)).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn app_for(service: Arc<DetectionService>) -> Router {
    create_app(AppState::new(service))
}

/// Test 1: A valid image yields detections and both output files
#[tokio::test]
async fn test_predict_persists_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector.clone(), dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    let body = multipart_body(&[file_part("street.png", &image)]);
    let (status, bytes) = send(app, "/predict/", body).await;

    assert_eq!(status, StatusCode::OK);
    let result: PredictResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(result.detections.len(), 2);
    assert_eq!(result.detections[0].class_name, "dog");
    assert_eq!(detector.calls(), 1);

    let image_path = Path::new(&result.image_path);
    let json_path = Path::new(&result.json_path);
    assert!(image_path.is_file(), "annotated image should exist");
    assert!(json_path.is_file(), "json sidecar should exist");

    // Both files share the generated identifier
    assert_eq!(image_path.extension().unwrap(), "jpg");
    assert_eq!(json_path.extension().unwrap(), "json");
    assert_eq!(image_path.file_stem(), json_path.file_stem());
    let stem = image_path.file_stem().unwrap().to_string_lossy();
    assert!(uuid::Uuid::parse_str(&stem).is_ok());

    // Annotated image keeps the source dimensions
    let annotated = image::open(image_path).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (WIDTH, HEIGHT));

    // Sidecar holds exactly the returned detections, pretty-printed
    let sidecar = std::fs::read_to_string(json_path).unwrap();
    assert!(sidecar.contains("\n    {"));
    let stored: Vec<Detection> = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(stored, result.detections);
}

/// Test 2: Returned boxes satisfy the geometry invariants
#[tokio::test]
async fn test_predict_bbox_invariants() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector, dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    let (status, bytes) = send(app, "/predict/", multipart_body(&[file_part("a.png", &image)])).await;
    assert_eq!(status, StatusCode::OK);

    let result: PredictResponse = serde_json::from_slice(&bytes).unwrap();
    for d in &result.detections {
        assert!(d.bbox.xmin < d.bbox.xmax);
        assert!(d.bbox.ymin < d.bbox.ymax);
        assert!(d.bbox.xmin >= 0.0 && d.bbox.xmax <= WIDTH as f32);
        assert!(d.bbox.ymin >= 0.0 && d.bbox.ymax <= HEIGHT as f32);
        assert!((0.0..=1.0).contains(&d.confidence));
    }
}

/// Test 3: Wire format uses `class` for the class name
#[tokio::test]
async fn test_predict_wire_format() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector, dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    let (_, bytes) = send(app, "/predict/", multipart_body(&[file_part("a.png", &image)])).await;

    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let first = &json["detections"][0];
    assert_eq!(first["class"], "dog");
    assert_eq!(first["class_id"], 16);
    assert!(first["bbox"]["xmin"].is_number());
    assert!(json["image_path"].is_string());
    assert!(json["json_path"].is_string());
}

/// Test 4: No detections still writes both files
#[tokio::test]
async fn test_predict_without_detections() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(Vec::new()));
    let app = app_for(build_service(detector, dir.path()));

    let image = png_bytes(32, 32);
    let (status, bytes) = send(app, "/predict/", multipart_body(&[file_part("a.png", &image)])).await;
    assert_eq!(status, StatusCode::OK);

    let result: PredictResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(result.detections.is_empty());
    assert!(Path::new(&result.image_path).is_file());
    let stored: Vec<Detection> =
        serde_json::from_str(&std::fs::read_to_string(&result.json_path).unwrap()).unwrap();
    assert!(stored.is_empty());
}

/// Test 5: Route also answers without the trailing slash
#[tokio::test]
async fn test_predict_without_trailing_slash() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector, dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    let (status, _) = send(app, "/predict", multipart_body(&[file_part("a.png", &image)])).await;
    assert_eq!(status, StatusCode::OK);
}

/// Test 6: Missing `file` field is a validation error and skips the model
#[tokio::test]
async fn test_predict_missing_file_field() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector.clone(), dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    let body = multipart_body(&[Part {
        name: "image",
        filename: Some("a.png"),
        data: &image,
    }]);
    let (status, bytes) = send(app, "/predict/", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error.error_type, "validation_error");
    assert_eq!(error.message, "No file part");
    assert!(error.request_id.is_some());
    assert_eq!(detector.calls(), 0);
}

/// Test 7: Empty and undecodable uploads are client errors
#[tokio::test]
async fn test_predict_rejects_bad_images() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let service = build_service(detector.clone(), dir.path());

    let (status, _) = send(
        app_for(service.clone()),
        "/predict/",
        multipart_body(&[file_part("empty.png", b"")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, bytes) = send(
        app_for(service),
        "/predict/",
        multipart_body(&[file_part("notes.txt", b"definitely not an image")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error.error_type, "invalid_request");

    assert_eq!(detector.calls(), 0);
}

/// Test 8: Uploads above the configured limit are rejected with 413
#[tokio::test]
async fn test_predict_payload_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let service = Arc::new(
        Arc::try_unwrap(build_service(detector.clone(), dir.path()))
            .unwrap()
            .with_max_image_bytes(1024),
    );

    let oversized = vec![0u8; 4096];
    let (status, bytes) = send(
        app_for(service),
        "/predict/",
        multipart_body(&[file_part("big.png", &oversized)]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error.error_type, "payload_too_large");
    assert_eq!(detector.calls(), 0);
}

/// Test 9: Detector failure maps to 500 and writes nothing
#[tokio::test]
async fn test_predict_detector_failure() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::failing());
    let service = build_service(detector, dir.path());
    let images_dir = service.store().images_dir().to_path_buf();

    let image = png_bytes(WIDTH, HEIGHT);
    let (status, bytes) = send(
        app_for(service),
        "/predict/",
        multipart_body(&[file_part("a.png", &image)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error.error_type, "internal_error");
    assert_eq!(std::fs::read_dir(images_dir).unwrap().count(), 0);
}

/// Test 10: Staged upload files are removed after each request
#[tokio::test]
async fn test_predict_cleans_staged_upload() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector, dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    send(app.clone(), "/predict/", multipart_body(&[file_part("a.png", &image)])).await;
    send(app, "/predict/", multipart_body(&[file_part("broken.png", b"nope")])).await;

    let staged = std::fs::read_dir(dir.path().join("staging")).unwrap().count();
    assert_eq!(staged, 0);
}

/// Test 11: Concurrent requests with the same filename never collide
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_predict_concurrent_requests_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(FakeDetector::with_detections(sample_detections()));
    let app = app_for(build_service(detector.clone(), dir.path()));

    let image = png_bytes(WIDTH, HEIGHT);
    let requests = (0..8).map(|_| {
        let app = app.clone();
        let body = multipart_body(&[file_part("same.png", &image)]);
        async move { send(app, "/predict/", body).await }
    });
    let responses = futures_util::future::join_all(requests).await;

    let mut image_paths = HashSet::new();
    let mut json_paths = HashSet::new();
    for (status, bytes) in responses {
        assert_eq!(status, StatusCode::OK);
        let result: PredictResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(Path::new(&result.image_path).is_file());
        image_paths.insert(result.image_path);
        json_paths.insert(result.json_path);
    }

    assert_eq!(image_paths.len(), 8);
    assert_eq!(json_paths.len(), 8);
    assert_eq!(detector.calls(), 8);
}
