// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict response types

/// Body of a successful `/predict/` call
///
/// Identical to the service-level result, so the relay can deserialize it
/// with the same type.
pub use crate::detection::InferenceResult as PredictResponse;
