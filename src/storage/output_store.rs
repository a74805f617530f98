// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated image and JSON sidecar persistence
//!
//! Layout under the output root:
//! - `images/<id>.jpg`: annotated image
//! - `json/<id>.json`: detections, pretty printed with 4-space indent

use image::{ImageFormat, RgbImage};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StorageError;
use crate::vision::Detection;

/// Paths of one persisted inference, as reported to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub image_path: String,
    pub json_path: String,
}

/// Writes inference outputs under a fixed root directory
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
    images_dir: PathBuf,
    json_dir: PathBuf,
}

impl OutputStore {
    /// Create the store, making `root/images` and `root/json` if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let images_dir = root.join("images");
        let json_dir = root.join("json");

        fs::create_dir_all(&images_dir)?;
        fs::create_dir_all(&json_dir)?;

        Ok(Self {
            root,
            images_dir,
            json_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn json_dir(&self) -> &Path {
        &self.json_dir
    }

    pub fn image_path(&self, id: &str) -> PathBuf {
        self.images_dir.join(format!("{}.jpg", id))
    }

    pub fn json_path(&self, id: &str) -> PathBuf {
        self.json_dir.join(format!("{}.json", id))
    }

    /// Write the annotated image and detection sidecar for `id`
    ///
    /// Blocking; call from the blocking thread pool.
    pub fn persist(
        &self,
        id: &str,
        annotated: &RgbImage,
        detections: &[Detection],
    ) -> Result<StoredOutput, StorageError> {
        let image_path = self.image_path(id);
        let json_path = self.json_path(id);

        annotated.save_with_format(&image_path, ImageFormat::Jpeg)?;
        write_json_pretty(&json_path, detections)?;

        debug!(
            "Persisted {} detections to {} and {}",
            detections.len(),
            image_path.display(),
            json_path.display()
        );

        Ok(StoredOutput {
            image_path: image_path.to_string_lossy().into_owned(),
            json_path: json_path.to_string_lossy().into_owned(),
        })
    }
}

fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    writer.flush()?;
    Ok(())
}
