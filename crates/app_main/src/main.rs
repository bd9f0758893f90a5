//! Lumen - image viewer pipeline, driven from the terminal
//!
//! Opens a file or directory and steps through it, decoding, caching and
//! preloading exactly as the viewer does, and reports what each image
//! turned into.

mod app;

use anyhow::{Context, Result};
use app_core::{AppConfig, AppError, Navigator, ViewerSession};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lumen", about = "Inspect images through the Lumen loading pipeline")]
struct Cli {
    /// Image file or directory to open
    path: PathBuf,

    /// Configuration file (defaults to the per-user config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of neighbours preloaded on each side
    #[arg(long)]
    preload_depth: Option<usize>,

    /// Override the number of neighbours kept cached on each side
    #[arg(long)]
    safe_range: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging and panic hook first
    let _log_guard = app_log::init()?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!("Falling back to default configuration: {}", e);
            AppConfig::default()
        }),
    };

    if let Err(e) = app_log::cleanup_old_logs(config.general.log_retention_days) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    if let Some(depth) = cli.preload_depth {
        config.imaging.preload_depth = depth;
    }
    if let Some(range) = cli.safe_range {
        config.imaging.cleanup_safe_range = range;
    }
    let config = config.validated();

    tracing::info!("Lumen starting on {}", cli.path.display());

    let navigator = Navigator::open(&cli.path).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if navigator.is_empty() {
        let err = AppError::NoImages(cli.path.display().to_string());
        anyhow::bail!(err.user_message());
    }
    let mut session = ViewerSession::new(&config, navigator)?;

    let result = app::run(&mut session);
    session.shutdown();
    result
}
