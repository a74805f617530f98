// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict API endpoint module
//!
//! Provides POST /predict/ for running object detection on an uploaded image.

pub mod handler;
pub mod response;

pub use handler::{predict_handler, FILE_FIELD};
pub use response::PredictResponse;
