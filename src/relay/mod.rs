// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod client;
pub mod pages;
pub mod server;

pub use client::{DetectionClient, RelayError};
pub use pages::{render_index, render_results};
pub use server::{create_relay_app, start_relay_server, RelayState};
