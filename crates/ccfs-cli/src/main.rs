//! ccfs: sealed file storage CLI
//!
//! Commands:
//!   upload <file>                       - seal with a password and store in the bucket
//!   download <key> [--output DIR] [--yes] - verify password, then fetch and open
//!   info <key>                          - size, KDF and expiry, no password needed
//!   config show                         - display current configuration
//!
//! Sealing happens locally; only ciphertext and the sealed filename leave
//! this machine. With `--server <url>` upload and download go through a ccfsd
//! instance's presigned URLs and no bucket credentials are needed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ccfs_core::CcfsConfig;
use ccfs_crypto::KdfSpec;
use ccfs_envelope::{
    check_password, sanitize_filename, Envelope, EnvelopeConfig, EnvelopeError, EnvelopeResult,
    PendingDownload,
};
use ccfs_storage::AnyStore;

mod remote;

use remote::{RemoteClient, RemoteObject};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ccfs",
    version,
    about = "Password-sealed file storage",
    long_about = "ccfs: seal files with a password and keep them in S3 under a random key"
)]
struct Cli {
    /// Path to ccfs.toml configuration file
    #[arg(long, short = 'c', env = "CCFS_CONFIG", default_value = "/etc/ccfs/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CCFS_LOG", default_value = "warn")]
    log: String,

    /// Transfer through a ccfsd server's presigned URLs instead of the bucket
    #[arg(long, env = "CCFS_SERVER", global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal a local file and store it
    ///
    /// Credentials are read from AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY
    /// environment variables.
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Store under this name instead of the local file name
        #[arg(long)]
        name: Option<String>,
        /// Password (prompted when omitted)
        #[arg(long, env = "CCFS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Fetch and open a stored file
    Download {
        /// Object key printed by `ccfs upload`
        key: String,
        /// Directory to write the file into
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
        /// Write without asking, replacing an existing file
        #[arg(long, short = 'y')]
        yes: bool,
        /// Password (prompted when omitted)
        #[arg(long, env = "CCFS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show what is known about an object without its password
    Info {
        key: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = CcfsConfig::from_file(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Upload { file, name, password } => {
            cmd_upload(&config, cli.server.as_deref(), &file, name.as_deref(), password).await
        }
        Commands::Download { key, output, yes, password } => {
            cmd_download(&config, cli.server.as_deref(), &key, &output, yes, password).await
        }
        Commands::Info { key } => {
            if cli.server.is_some() {
                anyhow::bail!("`ccfs info` reads object metadata from the bucket; run it without --server");
            }
            cmd_info(&config, &key).await
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ── Storage + envelope from environment credentials ───────────────────────────

/// Reads AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY (standard S3 env vars).
fn s3_credentials() -> Result<(String, String)> {
    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("CCFS_ACCESS_KEY_ID"))
        .context(
            "S3 credentials not set\n\
             Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.\n\
             Example:\n\
             \texport AWS_ACCESS_KEY_ID=your-key\n\
             \texport AWS_SECRET_ACCESS_KEY=your-secret",
        )?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("CCFS_SECRET_ACCESS_KEY"))
        .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
    Ok((access_key, secret_key))
}

fn build_envelope(config: &CcfsConfig) -> Result<Envelope<AnyStore>> {
    let store = AnyStore::from_config(&config.storage, s3_credentials).context("building storage backend")?;
    let envelope_config = EnvelopeConfig::from_core(config).context("resolving envelope config")?;
    Ok(Envelope::new(store, envelope_config))
}

// ── Prompts ───────────────────────────────────────────────────────────────────

fn read_password(given: Option<String>, confirm: bool) -> Result<SecretString> {
    if let Some(p) = given {
        return Ok(SecretString::from(p));
    }
    let first = SecretString::from(rpassword::prompt_password("Password: ").context("reading password")?);
    if confirm {
        let second = SecretString::from(
            rpassword::prompt_password("Confirm password: ").context("reading password")?,
        );
        if first.expose_secret() != second.expose_secret() {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(first)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer).context("reading answer")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Denials get one message, whichever of key or password was wrong.
fn explain(e: EnvelopeError) -> anyhow::Error {
    if e.is_denial() {
        anyhow::anyhow!("access denied: unknown key or incorrect password")
    } else {
        anyhow::Error::new(e)
    }
}

// ── `ccfs upload` ─────────────────────────────────────────────────────────────

async fn cmd_upload(
    config: &CcfsConfig,
    server: Option<&str>,
    file: &Path,
    name: Option<&str>,
    password: Option<String>,
) -> Result<()> {
    let raw_name = match name {
        Some(n) => n.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", file.display()))?,
    };
    let filename = sanitize_filename(&raw_name)?;
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let password = read_password(password, true)?;
    check_password(&password, config.crypto.min_password_len)?;

    let pb = make_spinner("upload");
    pb.set_message(format!("sealing {} ({})", filename, fmt_bytes(content.len() as u64)));

    if let Some(server) = server {
        let cfg = EnvelopeConfig::from_core(config).context("resolving envelope config")?;
        let client = RemoteClient::new(server)?;
        let kdf = KdfSpec::generate(cfg.kdf, cfg.kdf_params);
        let upload = client.upload(&password, kdf, &filename, &content).await;
        pb.finish_and_clear();
        let upload = upload.context("upload failed")?;

        println!("Uploaded {} as {}", filename, upload.key);
        println!("  url:     {}", upload.locator);
        println!();
        println!("Keep the key and the password: neither can be recovered.");
        return Ok(());
    }

    let envelope = build_envelope(config)?;
    let receipt = envelope.upload(&password, &filename, &content).await;
    pb.finish_and_clear();
    let receipt = receipt.context("upload failed")?;

    println!("Uploaded {} as {}", filename, receipt.key);
    println!("  url:     {}", receipt.locator);
    println!("  expires: {}", fmt_expiry(receipt.expires_at));
    println!();
    println!("Keep the key and the password: neither can be recovered.");
    Ok(())
}

// ── `ccfs download` ───────────────────────────────────────────────────────────

/// A verified download from either transport.
enum Pending {
    Bucket(PendingDownload<AnyStore>),
    Remote(RemoteObject),
}

impl Pending {
    fn filename(&self) -> &str {
        match self {
            Pending::Bucket(p) => p.filename(),
            Pending::Remote(r) => r.filename(),
        }
    }

    fn content_length(&self) -> u64 {
        match self {
            Pending::Bucket(p) => p.content_length(),
            Pending::Remote(r) => r.content_length(),
        }
    }

    async fn fetch(self) -> EnvelopeResult<Vec<u8>> {
        match self {
            Pending::Bucket(p) => p.fetch().await.map(|d| d.content),
            Pending::Remote(r) => r.open(),
        }
    }
}

async fn cmd_download(
    config: &CcfsConfig,
    server: Option<&str>,
    key: &str,
    output: &Path,
    yes: bool,
    password: Option<String>,
) -> Result<()> {
    let password = read_password(password, false)?;

    let pb = make_spinner("download");
    pb.set_message("verifying password".to_string());
    let pending = match server {
        Some(server) => {
            let client = RemoteClient::new(server)?;
            client.open_filename(key, &password).await.map(Pending::Remote)
        }
        None => {
            let envelope = build_envelope(config)?;
            envelope.open_filename(key, &password).await.map(Pending::Bucket)
        }
    };
    pb.finish_and_clear();
    let pending = pending.map_err(explain)?;

    let filename = sanitize_filename(pending.filename()).context("stored filename is unusable")?;
    let target = output.join(&filename);
    let exists = target.exists();

    if !yes {
        let question = if exists {
            format!(
                "{} already exists. Replace it with {} ({})?",
                target.display(),
                filename,
                fmt_bytes(pending.content_length())
            )
        } else {
            format!(
                "Save {} ({}) to {}?",
                filename,
                fmt_bytes(pending.content_length()),
                target.display()
            )
        };
        if !confirm(&question)? {
            println!("Skipped.");
            return Ok(());
        }
    }

    let pb = make_spinner("download");
    pb.set_message(format!("fetching {filename}"));
    let content = pending.fetch().await;
    pb.finish_and_clear();
    let content = content.map_err(explain)?;

    write_output(&target, &content, yes || exists)?;
    println!("Downloaded {} ({})", target.display(), fmt_bytes(content.len() as u64));
    Ok(())
}

/// Write the decrypted file. Without `overwrite` an existing file is an error.
fn write_output(target: &Path, content: &[u8], overwrite: bool) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(target)
        .with_context(|| format!("creating {}", target.display()))?;
    file.write_all(content)
        .with_context(|| format!("writing {}", target.display()))?;
    Ok(())
}

// ── `ccfs info` ───────────────────────────────────────────────────────────────

async fn cmd_info(config: &CcfsConfig, key: &str) -> Result<()> {
    let envelope = build_envelope(config)?;
    let info = envelope.inspect(key).await.map_err(explain)?;

    println!("key:     {}", info.key);
    println!("size:    {} (sealed)", fmt_bytes(info.content_length));
    println!("kdf:     {}", info.kdf);
    println!("expires: {}", fmt_expiry(info.expires_at));
    Ok(())
}

// ── `ccfs config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &CcfsConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_expiry(at: Option<SystemTime>) -> String {
    let Some(at) = at else {
        return "never".to_string();
    };
    let secs = at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    match at.duration_since(SystemTime::now()) {
        Ok(left) => format!("in {} (unix {secs})", fmt_duration(left)),
        Err(_) => format!("expired (unix {secs})"),
    }
}

fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 86400 {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    } else if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "ccfs",
            "download",
            "0b8f6a55-0b1d-4c3e-9f5a-2d7f3e4c5b6a",
            "-o",
            "/tmp/out",
            "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Download { key, output, yes, .. } => {
                assert_eq!(key, "0b8f6a55-0b1d-4c3e-9f5a-2d7f3e4c5b6a");
                assert_eq!(output, PathBuf::from("/tmp/out"));
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_server_after_subcommand() {
        let cli = Cli::try_parse_from(["ccfs", "upload", "a.txt", "--server", "https://files.example.com"]).unwrap();
        assert_eq!(cli.server.as_deref(), Some("https://files.example.com"));
        assert!(matches!(cli.command, Commands::Upload { .. }));

    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_fmt_expiry() {
        assert_eq!(fmt_expiry(None), "never");
        let past = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(fmt_expiry(Some(past)), "expired (unix 1000)");
        let soon = SystemTime::now() + Duration::from_secs(3 * 3600 + 120);
        assert!(fmt_expiry(Some(soon)).starts_with("in 3h"));
    }

    #[test]
    fn test_write_output_refuses_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");

        write_output(&target, b"first", false).unwrap();
        assert!(write_output(&target, b"second", false).is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"first");

        write_output(&target, b"third", true).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"third");
    }

    #[test]
    fn test_explain_hides_which_denial() {
        let wrong = explain(EnvelopeError::WrongPassword).to_string();
        let missing = explain(EnvelopeError::NotFound).to_string();
        assert_eq!(wrong, missing);
        assert!(explain(EnvelopeError::CorruptContent).to_string().contains("failed authentication"));
    }
}
