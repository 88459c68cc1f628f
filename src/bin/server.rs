//! Streaming recognition server entry point
//!
//! Loads the TOML configuration, applies CLI overrides, and runs the
//! server with the drill backend. Real engines embed [`StreamingServer`]
//! with their own `Recognizer` implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use streaming_asr_server::logging::{init_logging, LogConfig};
use streaming_asr_server::recognizer::drill::DrillRecognizer;
use streaming_asr_server::{ServerConfig, StreamingServer};

#[derive(Parser, Debug)]
#[command(name = "server", about = "Streaming speech-recognition WebSocket server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// TCP listen port
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding index.html and the rest of the web UI
    #[arg(long)]
    doc_root: Option<PathBuf>,

    /// Append logs to this file in addition to stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Sample rate the recognizer expects
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Refuse connections beyond this limit
    #[arg(long)]
    max_active_connections: Option<usize>,

    /// Simulated model latency per decode step, in milliseconds
    #[arg(long, default_value_t = 0)]
    step_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(doc_root) = args.doc_root {
        config.doc_root = doc_root;
    }
    if let Some(log_file) = args.log_file {
        config.log_file = Some(log_file);
    }
    if let Some(sample_rate) = args.sample_rate {
        config.recognizer.sample_rate = sample_rate;
    }
    if let Some(max_active) = args.max_active_connections {
        config.max_active_connections = max_active;
    }

    init_logging(&LogConfig {
        level: args.log_level.clone(),
        log_file: config.log_file.clone(),
    })?;

    let recognizer = Arc::new(
        DrillRecognizer::new(&config.recognizer)
            .with_step_delay(Duration::from_millis(args.step_delay_ms)),
    );
    info!(
        "Drill backend: {} Hz, {} frames per chunk",
        config.recognizer.sample_rate, config.recognizer.frames_per_chunk
    );

    let port = config.port;
    let server = StreamingServer::new(config, recognizer)
        .context("invalid configuration")?;

    let listener = server.bind().context("failed to bind listen socket")?;
    info!("Please visit http://127.0.0.1:{}/", port);

    server.serve(listener).await?;
    Ok(())
}
