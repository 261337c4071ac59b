pub mod config;
pub mod controller;
pub mod output;
pub mod touchpad;

use crate::config::AppConfig;
use crate::controller::{LogHaptics, StaticPermission, Trace, TraceSource};
use crate::output::VirtualDesktop;
use crate::touchpad::{Collaborators, TouchpadService};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Drive the system pointer from a game controller touchpad
#[derive(Parser, Debug)]
#[command(name = "padmouse", version, about)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Touch trace replayed as the controller
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup(args.verbose)?;

    let config = setup_config(args.config.as_deref()).await?;

    let source = match &args.trace {
        Some(path) => {
            let trace =
                Trace::load(path).map_err(|e| eyre!("Failed to load touch trace: {}", e))?;
            info!(
                "Replaying {} touch samples from {}",
                trace.total_polls(),
                path.display()
            );
            TraceSource::new(trace)
        }
        None => {
            info!("No touch trace given, controller stays idle");
            TraceSource::idle()
        }
    };

    let (settings_tx, settings_rx) = watch::channel(config.touchpad);
    let collaborators = Collaborators {
        source: Some(Arc::new(source)),
        backend: Some(Arc::new(VirtualDesktop::new(config.desktop.bounds()))),
        haptics: Arc::new(LogHaptics::new()),
        permissions: Arc::new(StaticPermission(true)),
    };
    let service = Arc::new(TouchpadService::new(
        collaborators,
        config.tuning(),
        settings_rx,
    ));

    let token = CancellationToken::new();
    let supervisor = {
        let service = service.clone();
        let token = token.clone();
        tokio::spawn(async move { service.supervise(token).await })
    };

    let mut status = service.subscribe();
    let _status_logger = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            info!("Touchpad engine status: {:?}", current);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for shutdown signal: {}", e))?;
    info!("Shutdown requested");

    token.cancel();
    supervisor
        .await
        .map_err(|e| eyre!("Supervisor task failed: {}", e))?;
    service
        .disable()
        .await
        .map_err(|e| eyre!("Failed to disable touchpad engine: {}", e))?;
    drop(settings_tx);

    Ok(())
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", if verbose { "debug" } else { "info" })
    }
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::default_path()?,
    };

    AppConfig::ensure_default_config(&path).await?;
    AppConfig::load(&path).await
}
