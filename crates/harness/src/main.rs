//! index-soak binary.
//!
//! Drives mutation load at a store cluster while watching for a background
//! index build on one attribute to complete.
//!
//! # Usage
//!
//! ```bash
//! # Run against the default local six-member cluster
//! index-soak --attribute name --flag indexed --mutations 50000
//!
//! # Environment variables
//! INDEX_SOAK__ENDPOINTS=http://10.0.0.1:9180,http://10.0.0.2:9180 \
//! INDEX_SOAK__MUTATIONS=50000 \
//! index-soak
//!
//! # CLI arguments override environment variables
//! INDEX_SOAK__MUTATIONS=50000 index-soak --mutations 1000
//! ```

mod config;

use std::io::IsTerminal;

use clap::Parser;
use config::{Cli, Config, ConfigError, LogFormat};
use index_soak_harness::{HarnessError, Orchestrator};
use tokio::signal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level error type for the binary, wrapping config and run failures.
#[derive(Debug)]
enum MainError {
    Config(ConfigError),
    Run(HarnessError),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Config(e) => write!(f, "config error: {}", e),
            MainError::Run(e) => write!(f, "run error: {}", e),
        }
    }
}

impl std::error::Error for MainError {}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    // Parse CLI args (clap handles --help and --version)
    let cli = Cli::parse();
    let config = Config::load(&cli).map_err(MainError::Config)?;

    init_logging(&config);

    tracing::info!(
        endpoints = ?config.endpoints,
        attribute = %config.attribute,
        flag = %config.flag,
        mutations = config.mutations,
        workers = config.workers,
        "starting index-soak"
    );

    let client_config = config.client_config().map_err(MainError::Config)?;
    let orchestrator = Orchestrator::new(client_config, config.run_options());

    // Ctrl-C / SIGTERM stops the workload and tears the run down cleanly.
    let quit = orchestrator.quit_signal();
    tokio::spawn(async move {
        shutdown_signal().await;
        quit.signal();
    });

    let report = orchestrator.run().await.map_err(MainError::Run)?;

    println!(
        "run complete: {} mutations committed in {:.1?}, index on <{}> ready",
        report.mutations, report.elapsed, report.attribute
    );
    Ok(())
}

/// Initializes the logging system based on configuration.
///
/// Supports three formats:
/// - `Text`: Human-readable format (development)
/// - `Json`: JSON structured logging (production)
/// - `Auto`: JSON for non-TTY stdout, text otherwise
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match config.log_format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    }
}

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
///
/// On Unix systems, SIGTERM is handled for container environments.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        // If signal handlers can't be installed, the run can't be stopped
        // cleanly; panicking here is the only sane response.
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping run");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping run");
        }
    }
}
