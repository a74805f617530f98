// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! On-disk storage for generated outputs
//!
//! Annotated images and JSON sidecars live under a single output root;
//! an optional retention policy bounds how much of it accumulates.

pub mod output_store;
pub mod retention;

pub use output_store::{OutputStore, StoredOutput};
pub use retention::{spawn_sweeper, sweep_dir, RetentionPolicy};

use thiserror::Error;

/// Errors raised while persisting outputs
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to serialize detections: {0}")]
    Serialization(#[from] serde_json::Error),
}
