// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use detection_node::{
    config::{DetectionConfig, DetectorConfig},
    detection::{DetectionService, InferenceResult},
};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Run object detection on a single image without starting a server
#[derive(Parser, Debug)]
#[command(name = "detect-cli")]
#[command(version)]
#[command(about = "One-shot object detection on a local file or http(s) URL", long_about = None)]
struct Args {
    /// Image path or http(s) URL
    input: String,

    /// Directory receiving images/ and json/
    #[arg(short, long, env = "DETECTION_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Path to the ONNX model
    #[arg(short, long, env = "DETECTION_MODEL_PATH", default_value = "./models/yolov5s.onnx")]
    model: PathBuf,

    /// Model input size in pixels
    #[arg(long, env = "DETECTION_INPUT_SIZE", default_value_t = 640)]
    input_size: u32,

    /// Minimum confidence for reported detections
    #[arg(long, env = "DETECTION_CONFIDENCE", default_value_t = 0.25)]
    confidence: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long, env = "DETECTION_IOU", default_value_t = 0.45)]
    iou: f32,

    /// Try CUDA before falling back to CPU
    #[arg(long, env = "DETECTION_USE_CUDA")]
    cuda: bool,

    /// Timeout in seconds when downloading a URL
    #[arg(long, default_value_t = 30)]
    download_timeout: u64,
}

impl Args {
    fn config(&self) -> DetectionConfig {
        DetectionConfig {
            detector: DetectorConfig {
                model_path: self.model.clone(),
                input_size: self.input_size,
                confidence_threshold: self.confidence,
                iou_threshold: self.iou,
                use_cuda: self.cuda,
                ..DetectorConfig::default()
            },
            output_dir: self.output_dir.clone(),
            ..DetectionConfig::default()
        }
    }

    fn is_url(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }
}

async fn download(url: &str, timeout: Duration) -> Result<(String, Bytes)> {
    let parsed = url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let filename = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
        .to_string();

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client
        .get(parsed)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?
        .error_for_status()?;
    let data = response.bytes().await?;

    tracing::info!("Downloaded {} ({} bytes)", url, data.len());
    Ok((filename, data))
}

async fn run(args: Args) -> Result<InferenceResult> {
    let config = args.config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let service = Arc::new(DetectionService::from_config(&config)?);

    let result = if args.is_url() {
        let (filename, data) =
            download(&args.input, Duration::from_secs(args.download_timeout)).await?;
        service.run_inference_on_upload(Some(&filename), data).await?
    } else {
        service
            .run_inference_on_path(&PathBuf::from(&args.input))
            .await?
    };

    Ok(result)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match run(args).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
