//! ccfsd: ccfs HTTP server
//!
//! Usage:
//!   ccfsd [--config /etc/ccfs/config.toml] [--listen 0.0.0.0:5000] [--storage s3|memory]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use ccfs_core::CcfsConfig;
use ccfs_envelope::{Envelope, EnvelopeConfig};
use ccfs_storage::AnyStore;
use ccfsd::AppState;

#[derive(Parser, Debug)]
#[command(name = "ccfsd", version, about = "ccfs sealed file server")]
struct Cli {
    /// Path to ccfs.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "CCFS_CONFIG",
        default_value = "/etc/ccfs/config.toml"
    )]
    config: PathBuf,

    /// Override server.listen
    #[arg(long, env = "CCFS_LISTEN")]
    listen: Option<String>,

    /// Override storage.backend ("s3" or "memory")
    #[arg(long)]
    storage: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CCFS_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "CCFS_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "ccfsd starting"
    );

    let mut config = CcfsConfig::from_file(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(backend) = cli.storage {
        config.storage.backend = backend;
    }

    let store = AnyStore::from_config(&config.storage, s3_credentials).context("building storage backend")?;
    let envelope_config = EnvelopeConfig::from_core(&config).context("resolving envelope config")?;
    info!(
        backend = store.describe(),
        bucket = %config.storage.bucket,
        kdf = %envelope_config.kdf,
        "storage ready"
    );

    let envelope = Envelope::new(store, envelope_config);
    let floor = envelope.denial_floor().await;
    info!(floor_ms = floor.as_millis() as u64, "denial floor calibrated");

    let state = AppState::new(envelope, config.crypto.min_password_len);
    let app = ccfsd::router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding {}", config.server.listen))?;
    info!(addr = %config.server.listen, public_url = %config.server.public_url, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")
}

fn s3_credentials() -> Result<(String, String)> {
    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("CCFS_ACCESS_KEY_ID"))
        .context("S3 credentials not set: export AWS_ACCESS_KEY_ID")?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("CCFS_SECRET_ACCESS_KEY"))
        .context("AWS_SECRET_ACCESS_KEY not set")?;
    Ok((access_key, secret_key))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
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
