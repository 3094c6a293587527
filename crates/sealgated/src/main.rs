//! sealgated: encrypting record gateway daemon
//!
//! Usage:
//!   sealgated [--config /etc/sealgate/config.toml] [--mode frontend|backend]
//!
//! Modes:
//!   frontend - Line protocol (and optional REST) gateway that seals records [default]
//!   backend  - Backend line protocol over a local store, for `kind = "remote"` gateways

mod daemon;
mod http;
mod metrics;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use sealgate_core::config::SealgateConfig;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sealgated", version, about = "Encrypting record gateway daemon")]
struct Cli {
    /// Path to sealgate configuration file
    #[arg(
        long,
        short = 'c',
        env = "SEALGATE_CONFIG",
        default_value = "/etc/sealgate/config.toml"
    )]
    config: PathBuf,

    /// Daemon mode
    #[arg(long, default_value = "frontend")]
    mode: Mode,

    /// Log level (trace, debug, info, warn, error); overrides daemon.log_level
    #[arg(long, env = "SEALGATE_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides daemon.log_format
    #[arg(long, env = "SEALGATE_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum Mode {
    /// Record gateway in front of the configured backend (default)
    Frontend,
    /// Storage server for remote gateways
    Backend,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is read before logging so the file can choose the log level
    let loaded = load_config(&cli.config).await?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    config.apply_env_overrides(|name| std::env::var(name).ok());

    let level = cli.log.clone().unwrap_or_else(|| config.daemon.log_level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        match config.daemon.log_format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?cli.mode,
        config = %cli.config.display(),
        "sealgated starting"
    );
    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }

    match cli.mode {
        Mode::Frontend => daemon::run_frontend(config).await,
        Mode::Backend => daemon::run_backend(config).await,
    }
}

/// Read and parse the config file; `None` if it does not exist.
async fn load_config(path: &Path) -> Result<Option<SealgateConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
