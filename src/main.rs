// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use detection_node::{
    api::{start_server, AppState},
    config::DetectionConfig,
    detection::DetectionService,
    storage::spawn_sweeper,
    version,
};
use std::{env, sync::Arc};
use tokio::{net::TcpListener, signal};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Detection Service...\n");
    println!("📦 BUILD VERSION: {}", version::get_version_string());
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();
    tracing::debug!("Version info: {}", version::get_version_info());

    let config = DetectionConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    println!("🧠 Loading detector from {}...", config.detector.model_path.display());
    let service = DetectionService::from_config(&config)
        .context("Failed to initialize detection service")?;
    println!("✅ Detector ready: {}", service.model_name());

    let sweeper = spawn_sweeper(
        vec![
            service.store().images_dir().to_path_buf(),
            service.store().json_dir().to_path_buf(),
        ],
        config.retention.clone(),
        config.sweep_interval,
    );

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("Detection service listening on http://{}", local_addr);
    println!("  Status:     GET  http://{}/", local_addr);
    println!("  Predict:    POST http://{}/predict/", local_addr);
    println!("  Outputs:    {}", service.store().root().display());
    println!("\nTest with curl:");
    println!("  curl -F 'file=@image.jpg' http://{}/predict/", local_addr);
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    let state = AppState::new(Arc::new(service));
    start_server(listener, state, async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        println!("\n⏹️  Shutting down...");
    })
    .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    println!("👋 Goodbye!");
    Ok(())
}
