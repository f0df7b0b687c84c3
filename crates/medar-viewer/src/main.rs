//! MedAR Viewer - Main entry point
//!
//! Opens the interactive anatomy viewer, or inspects one catalog model and
//! exits when `--inspect` is given.

mod app;
mod inspect;
mod setup;

use anyhow::{bail, Context, Result};
use clap::Parser;
use medar_core::ViewerConfig;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "medar-viewer")]
#[command(about = "Interactive 3D anatomy viewer")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "medar.toml")]
    config: PathBuf,

    /// Model to open at start-up
    #[arg(short, long)]
    model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Load one model, print its summary and exit
    #[arg(long, value_name = "MODEL")]
    inspect: Option<String>,

    /// Write a default configuration file to the config path and exit
    #[arg(long)]
    init_config: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("MedAR viewer v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        ViewerConfig::save_default(&args.config)
            .with_context(|| format!("writing {}", args.config.display()))?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let config = ViewerConfig::load(&args.config)?;
    info!(
        assets = %config.assets.base,
        preload = config.assets.preload.len(),
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("medar-io")
        .build()
        .context("starting async runtime")?;

    let viewer = setup::build_orchestrator(config)?;

    if let Some(model_id) = args.inspect {
        let report = runtime.block_on(inspect::inspect(viewer, &model_id))?;
        print!("{report}");
        return Ok(());
    }

    match app::run(viewer, runtime.handle().clone(), args.model) {
        bevy::app::AppExit::Success => Ok(()),
        bevy::app::AppExit::Error(code) => bail!("viewer exited with code {code}"),
    }
}
