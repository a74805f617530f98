// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod detection;
pub mod relay;
pub mod storage;
pub mod utils;
pub mod version;
pub mod vision;

// Re-export the types most callers need
pub use api::{create_app, start_server, AppState};
pub use config::{DetectionConfig, DetectorConfig, RelayConfig};
pub use detection::{DetectionService, InferenceResult, ServiceError};
pub use relay::{create_relay_app, start_relay_server, DetectionClient, RelayState};
pub use vision::{BoundingBox, Detection, ObjectDetector};
