//! stemsplit-api - Stem separation microservice
//!
//! Accepts an audio upload, runs the separation engine (Demucs) on it and
//! serves the resulting stems.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stemsplit_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use stemsplit_common::logging::init_tracing;
use tokio::signal;
use tracing::info;

use stemsplit_api::{build_router, AppState};

/// Command-line arguments for stemsplit-api
///
/// Each flag may also be given through the named environment variable.
#[derive(Parser, Debug)]
#[command(name = "stemsplit-api")]
#[command(about = "Audio stem separation microservice")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "STEMSPLIT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for uploaded inputs
    #[arg(long, env = "UPLOAD_FOLDER")]
    upload_folder: Option<PathBuf>,

    /// Directory for separated stems
    #[arg(long, env = "SEPARATED_FOLDER")]
    separated_folder: Option<PathBuf>,

    /// Maximum upload size in bytes
    #[arg(long, env = "MAX_CONTENT_LENGTH")]
    max_content_length: Option<u64>,

    #[arg(long, env = "HOST")]
    host: Option<String>,

    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Engine command, repeatable for leading arguments (e.g. --engine python --engine -m --engine demucs)
    #[arg(long = "engine", env = "STEMSPLIT_ENGINE", value_delimiter = ' ', allow_hyphen_values = true)]
    engine: Vec<String>,

    /// Separation model name
    #[arg(long, env = "STEMSPLIT_MODEL")]
    model: Option<String>,

    /// Wall-clock bound on one separation, in seconds
    #[arg(long, env = "STEMSPLIT_SEPARATION_TIMEOUT")]
    separation_timeout: Option<u64>,

    /// Log level or filter directives
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Append logs to this file in addition to stderr
    #[arg(long, env = "STEMSPLIT_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            upload_folder: self.upload_folder.clone(),
            separated_folder: self.separated_folder.clone(),
            max_content_length: self.max_content_length,
            host: self.host.clone(),
            port: self.port,
            engine_command: if self.engine.is_empty() {
                None
            } else {
                Some(self.engine.clone())
            },
            model: self.model.clone(),
            separation_timeout_secs: self.separation_timeout,
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config must resolve before tracing so the log settings apply
    let file = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), file).context("Invalid configuration")?;

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting stemsplit-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config
        .ensure_directories()
        .context("Failed to create storage directories")?;

    info!(
        upload_folder = %config.upload_dir.display(),
        separated_folder = %config.output_dir.display(),
        max_file_size_mb = config.max_file_size_mb(),
        engine = ?config.engine.command,
        model = %config.engine.model,
        "Configuration resolved"
    );

    let addr = config.bind_address();
    let app = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
