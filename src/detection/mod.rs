// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection pipeline: detector + annotation + persistence

pub mod service;

pub use service::{DetectionService, InferenceResult, ServiceError};
