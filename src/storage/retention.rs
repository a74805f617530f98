// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retention policy for generated files
//!
//! Files are evicted by age (TTL) first, then oldest-first until the
//! directory is within its file count limit. Only regular files directly
//! inside a swept directory are considered.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Limits applied to a directory of generated files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Delete files whose modification time is older than this
    pub max_age: Option<Duration>,
    /// Keep at most this many files per directory
    pub max_files: Option<usize>,
}

impl RetentionPolicy {
    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some() || self.max_files.is_some()
    }
}

/// Apply `policy` to `dir`, returning the number of files deleted
///
/// A missing directory is treated as empty.
pub fn sweep_dir(dir: &Path, policy: &RetentionPolicy) -> io::Result<usize> {
    if !policy.is_enabled() {
        return Ok(0);
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let metadata = match entry.metadata() {
            Ok(m) => m,
            // Removed concurrently
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((entry.path(), modified));
    }

    // Oldest first
    files.sort_by(|a, b| a.1.cmp(&b.1));

    let now = SystemTime::now();
    let mut doomed: Vec<PathBuf> = Vec::new();
    let mut remaining = Vec::with_capacity(files.len());

    for (path, modified) in files {
        let expired = policy.max_age.is_some_and(|max_age| {
            now.duration_since(modified)
                .map(|age| age > max_age)
                .unwrap_or(false)
        });
        if expired {
            doomed.push(path);
        } else {
            remaining.push(path);
        }
    }

    if let Some(max_files) = policy.max_files {
        let excess = remaining.len().saturating_sub(max_files);
        doomed.extend(remaining.into_iter().take(excess));
    }

    let mut deleted = 0;
    for path in doomed {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Retention removed {}", path.display());
                deleted += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Retention failed to remove {}: {}", path.display(), e),
        }
    }

    Ok(deleted)
}

/// Periodically sweep `dirs` in the background
///
/// Returns `None` when the policy is disabled.
pub fn spawn_sweeper(
    dirs: Vec<PathBuf>,
    policy: RetentionPolicy,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if !policy.is_enabled() {
        return None;
    }

    info!(
        "Retention enabled for {:?} (max_age: {:?}, max_files: {:?}, every {:?})",
        dirs, policy.max_age, policy.max_files, interval
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            for dir in &dirs {
                let dir_owned = dir.clone();
                let policy = policy.clone();
                let result =
                    tokio::task::spawn_blocking(move || sweep_dir(&dir_owned, &policy)).await;

                match result {
                    Ok(Ok(0)) => {}
                    Ok(Ok(n)) => info!("Retention removed {} files from {}", n, dir.display()),
                    Ok(Err(e)) => warn!("Retention sweep of {} failed: {}", dir.display(), e),
                    Err(e) => warn!("Retention sweep task failed: {}", e),
                }
            }
        }
    }))
}
