//! Listener CLI.
//!
//! Usage:
//!   listener                          Listen on port 6969
//!   listener --port 7000              Listen on another port
//!   listener --config listener.json   Load settings from a JSON file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{self, EnvFilter};

use ::listener::console::{self, Console};
use ::listener::listener::{render_events, Listener};
use ::listener::GlobalConfig;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "listener")]
#[command(about = "TCP listener with an interactive operator console")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Directory where received files are saved
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Maximum number of concurrent sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

//--------------------------------------------------------------------------------------------------
// Functions: Main
//--------------------------------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut listener = Listener::bind(&config, events_tx.clone())
        .await
        .with_context(|| format!("Could not start listener on {}", config.bind_addr()))?;

    println!(
        "TCP Server is running on port {}.",
        listener.local_addr().port()
    );

    let renderer = tokio::spawn(render_events(events_rx, std::io::stdout()));

    let mut input = console::spawn_stdin_reader();
    let mut console = Console::new(listener.registry().clone(), events_tx, std::io::stdout());

    tokio::select! {
        result = console.run(&mut input) => result.context("Console output failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            println!();
            println!("Exiting server...");
        }
    }

    // The renderer ends once every event sender is gone, after the final
    // close notices have been printed.
    listener.shutdown().await;
    drop(console);
    let _ = renderer.await;

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Setup
//--------------------------------------------------------------------------------------------------

fn init_logging(verbose: bool) {
    // Logging to stderr only (stdout is the operator console)
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<GlobalConfig> {
    let mut config = match &cli.config {
        Some(path) => GlobalConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GlobalConfig::default(),
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = &cli.bind {
        config.bind_host = bind.clone();
    }
    if let Some(dir) = &cli.download_dir {
        config.download_dir = dir.clone();
    }
    if let Some(max) = cli.max_sessions {
        config.max_sessions = max;
    }

    config.validate()?;
    Ok(config)
}
