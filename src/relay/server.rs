// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relay/UI HTTP server
//!
//! Serves the upload form, forwards submitted files to the detection
//! service and renders the annotated result.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::client::DetectionClient;
use super::pages::{render_index, render_results};
use crate::api::http_server::MULTIPART_OVERHEAD;
use crate::api::predict::FILE_FIELD;
use crate::config::RelayConfig;
use crate::utils::secure_filename;

#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub client: Arc<DetectionClient>,
}

impl RelayState {
    pub fn new(config: RelayConfig, client: DetectionClient) -> Self {
        Self {
            config: Arc::new(config),
            client: Arc::new(client),
        }
    }
}

/// Build the relay router
pub fn create_relay_app(state: RelayState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay UI on `listener` until `shutdown` resolves
pub async fn start_relay_server<F>(
    listener: TcpListener,
    state: RelayState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_relay_app(state);

    info!("Relay UI listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// GET / - Upload form
pub async fn index_handler() -> Html<String> {
    Html(render_index())
}

/// POST /upload - Forward an uploaded image and render the detections
///
/// # Request
/// - `multipart/form-data` with the image in a field named `file`
///
/// # Response
/// - HTML page embedding `/static/<uuid>.jpg` and the detection list
///
/// # Errors
/// Plain-text bodies:
/// - 400 `No file part`: no `file` field (nothing is forwarded)
/// - 400 `No selected file`: `file` field without a filename
/// - 500 `AI backend error: <body>`: the detection service rejected the upload
/// - 500 `AI backend unreachable: <reason>`: the detection service could not be reached
pub async fn upload_handler(
    State(state): State<RelayState>,
    mut multipart: Multipart,
) -> Result<Html<String>, (StatusCode, String)> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| (e.status(), e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        warn!("Upload without a '{}' field", FILE_FIELD);
        return Err((StatusCode::BAD_REQUEST, "No file part".to_string()));
    };

    if filename.is_empty() {
        warn!("Upload with an empty filename");
        return Err((StatusCode::BAD_REQUEST, "No selected file".to_string()));
    }

    let safe_name = secure_filename(&filename);
    if safe_name.is_empty() {
        warn!("Upload filename '{}' sanitized to nothing", filename);
        return Err((StatusCode::BAD_REQUEST, "Invalid file name".to_string()));
    }

    let local_path = save_upload(&state.config.upload_dir, &safe_name, data.clone())
        .await
        .map_err(|e| {
            warn!("Failed to save upload {}: {}", safe_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save upload: {}", e),
            )
        })?;
    debug!("Saved upload to {}", local_path.display());

    let result = state
        .client
        .predict(&safe_name, data)
        .await
        .map_err(|e| {
            warn!("Detection request for {} failed: {}", safe_name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let source = resolve_output_path(&state.config.detection_output_root, &result.image_path);
    let static_name = source
        .file_name()
        .map(|n| secure_filename(&n.to_string_lossy()))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("AI backend error: invalid image path '{}'", result.image_path),
            )
        })?;

    tokio::fs::create_dir_all(&state.config.static_dir)
        .await
        .map_err(internal_error("Failed to prepare static directory"))?;
    tokio::fs::copy(&source, state.config.static_dir.join(&static_name))
        .await
        .map_err(internal_error("Failed to copy annotated image"))?;

    info!(
        "Relayed {}: {} detections, image /static/{}",
        safe_name,
        result.detections.len(),
        static_name
    );

    Ok(Html(render_results(
        &format!("/static/{}", static_name),
        &result.detections,
    )))
}

/// Resolve a path reported by the detection service on the local filesystem
///
/// Relative paths are interpreted against `root`; absolute paths are used as-is.
pub fn resolve_output_path(root: &Path, reported: &str) -> PathBuf {
    let reported = Path::new(reported);
    if reported.is_absolute() {
        reported.to_path_buf()
    } else {
        root.join(reported)
    }
}

/// Write `data` to `dir/name`, replacing any previous file atomically
async fn save_upload(dir: &Path, name: &str, data: Bytes) -> std::io::Result<PathBuf> {
    let dir = dir.to_path_buf();
    let target = dir.join(name);
    let target_clone = target.clone();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        staged.write_all(&data)?;
        staged.flush()?;
        staged.persist(&target_clone).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

    Ok(target)
}

fn internal_error(context: &'static str) -> impl Fn(std::io::Error) -> (StatusCode, String) {
    move |e| {
        warn!("{}: {}", context, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}: {}", context, e),
        )
    }
}
