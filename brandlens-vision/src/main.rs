//! brandlens-vision - Visual brand analysis over extracted frames
//!
//! Reads an analysis manifest (frames, timestamps, duration, target brand,
//! reference images), runs the vision engine and writes the `VisualSummary`
//! JSON to stdout or `--output`. Logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use brandlens_vision::workflow::load_request;
use brandlens_vision::{VisionConfig, VisionEngine};

/// Log level used until the configuration is loaded
const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments for brandlens-vision
#[derive(Parser, Debug)]
#[command(name = "brandlens-vision")]
#[command(about = "Detect a target brand in extracted video frames")]
#[command(version)]
struct Args {
    /// JSON analysis manifest
    #[arg(short, long, required_unless_present = "write_config")]
    manifest: Option<PathBuf>,

    /// TOML config file (falls back to BRANDLENS_CONFIG, then the platform config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run identifier for the persisted artifact (overrides the manifest)
    #[arg(long, env = "BRANDLENS_RUN_ID")]
    run_id: Option<String>,

    /// Write the summary here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the resolved configuration as TOML to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing before config loading so its messages are kept;
    // stdout is reserved for the summary
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config =
        VisionConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins; otherwise switch to the configured level
    if !from_env {
        filter_handle
            .reload(EnvFilter::new(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    if let Some(path) = args.write_config {
        config
            .save(&path)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    info!("Starting brandlens-vision {}", env!("CARGO_PKG_VERSION"));

    let manifest = args.manifest.context("--manifest is required")?;
    let mut request = load_request(&manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;
    if let Some(run_id) = args.run_id {
        request.run_id = Some(run_id);
    }

    let engine = VisionEngine::from_config(&config);
    let summary = engine.analyze(request).await;

    let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
    match args.output {
        Some(path) => {
            brandlens_common::config::write_atomic(&path, json.as_bytes())
                .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            info!("Summary written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
