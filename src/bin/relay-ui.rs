// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use detection_node::{
    config::RelayConfig,
    relay::{start_relay_server, DetectionClient, RelayState},
    storage::spawn_sweeper,
    version,
};
use std::env;
use tokio::{net::TcpListener, signal};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Relay UI...");
    println!("📦 BUILD VERSION: {}\n", version::get_version_string());

    let config = RelayConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    for dir in [&config.upload_dir, &config.static_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let client = DetectionClient::new(&config)?;
    if client.health_check().await {
        println!("✅ Detection service reachable at {}", client.endpoint());
    } else {
        // Not fatal; the service may come up later
        println!("⚠️  Detection service not reachable at {}", client.endpoint());
    }

    let sweeper = spawn_sweeper(
        vec![config.upload_dir.clone(), config.static_dir.clone()],
        config.retention.clone(),
        config.sweep_interval,
    );

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    println!("🌐 Relay UI on http://{}", listener.local_addr()?);
    println!("Press Ctrl+C to shutdown...\n");

    start_relay_server(listener, RelayState::new(config, client), async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        println!("\n⏹️  Shutting down...");
    })
    .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    Ok(())
}
