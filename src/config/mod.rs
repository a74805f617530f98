// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven configuration for both services
//!
//! Each service reads its settings with `from_env()`, falls back to the
//! values in `Default`, and is checked with `validate()` before startup.

pub mod detection;
pub mod relay;

pub use detection::{DetectionConfig, DetectorConfig};
pub use relay::RelayConfig;

use std::env;
use std::time::Duration;

use crate::storage::RetentionPolicy;

/// Read a retention policy from `<prefix>OUTPUT_MAX_AGE_SECS` and
/// `<prefix>OUTPUT_MAX_FILES`. Both unset means retention is disabled.
pub(crate) fn retention_from_env(prefix: &str) -> RetentionPolicy {
    RetentionPolicy {
        max_age: env::var(format!("{}OUTPUT_MAX_AGE_SECS", prefix))
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        max_files: env::var(format!("{}OUTPUT_MAX_FILES", prefix))
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0),
    }
}
