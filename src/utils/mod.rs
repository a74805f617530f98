// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod sanitize;

pub use sanitize::secure_filename;
