use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CcfsError, CcfsResult};

/// Top-level configuration (loaded from ccfs.toml)
///
/// Built once at process start and handed to the storage gateway and the
/// envelope constructors; nothing below the binaries reads the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CcfsConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub transfer: TransferConfig,
}

impl CcfsConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> CcfsResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| CcfsError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> CcfsResult<Self> {
        toml::from_str(content).map_err(|e| CcfsError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address (default: 127.0.0.1:5000)
    pub listen: String,
    /// Externally visible base URL used to build download locators
    pub public_url: String,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
    /// Maximum accepted request body for server-side uploads
    pub max_upload_bytes: usize,
    /// Serve Prometheus metrics on /metrics
    pub metrics: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend: "s3" or "memory" (memory is for local development only)
    pub backend: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket holding sealed objects
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (warn/error on HTTP endpoints)
    pub enforce_tls: bool,
    /// Per-call timeout for storage round trips
    pub timeout_secs: u64,
}

/// Password-to-key derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// KDF used for new uploads: "sha256" (legacy, unsalted) or "argon2id"
    pub kdf: String,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Minimum accepted password length at the transport boundary
    pub min_password_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Expiry hint attached to stored objects (None = keep)
    pub object_ttl_secs: Option<u64>,
    /// Lifetime of presigned upload URLs
    pub presign_put_ttl_secs: u64,
    /// Lifetime of presigned download URLs
    pub presign_get_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:5000".into(),
            public_url: "http://localhost:5000".into(),
            log_level: "info".into(),
            log_format: "text".into(),
            max_upload_bytes: 64 * 1024 * 1024,
            metrics: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "s3".into(),
            endpoint: "https://s3.amazonaws.com".into(),
            region: "us-east-1".into(),
            bucket: "ccfs".into(),
            enforce_tls: false,
            timeout_secs: 30,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf: "sha256".into(),
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            min_password_len: 1,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            object_ttl_secs: Some(3600),
            presign_put_ttl_secs: 3600,
            presign_get_ttl_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
listen = "0.0.0.0:8080"
public_url = "https://files.example.com"
log_level = "debug"
log_format = "json"
max_upload_bytes = 1048576
metrics = false

[storage]
backend = "s3"
endpoint = "https://s3.eu-west-1.amazonaws.com"
region = "eu-west-1"
bucket = "sealed-files"
enforce_tls = true
timeout_secs = 5

[crypto]
kdf = "argon2id"
argon2_mem_cost_kib = 131072
argon2_time_cost = 4
argon2_parallelism = 2
min_password_len = 12

[transfer]
object_ttl_secs = 7200
presign_put_ttl_secs = 900
presign_get_ttl_secs = 30
"#;
        let config = CcfsConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.public_url, "https://files.example.com");
        assert_eq!(config.server.max_upload_bytes, 1048576);
        assert!(!config.server.metrics);
        assert_eq!(config.storage.bucket, "sealed-files");
        assert!(config.storage.enforce_tls);
        assert_eq!(config.storage.timeout_secs, 5);
        assert_eq!(config.crypto.kdf, "argon2id");
        assert_eq!(config.crypto.argon2_mem_cost_kib, 131072);
        assert_eq!(config.crypto.min_password_len, 12);
        assert_eq!(config.transfer.object_ttl_secs, Some(7200));
        assert_eq!(config.transfer.presign_get_ttl_secs, 30);
    }

    #[test]
    fn test_parse_defaults() {
        let config = CcfsConfig::from_toml("").unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:5000");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.backend, "s3");
        assert_eq!(config.storage.region, "us-east-1");
        assert!(!config.storage.enforce_tls);
        assert_eq!(config.crypto.kdf, "sha256");
        assert_eq!(config.crypto.min_password_len, 1);
        assert_eq!(config.transfer.object_ttl_secs, Some(3600));
        assert_eq!(config.transfer.presign_put_ttl_secs, 3600);
        assert_eq!(config.transfer.presign_get_ttl_secs, 60);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage]
bucket = "other"
"#;
        let config = CcfsConfig::from_toml(toml_str).unwrap();

        // Overridden
        assert_eq!(config.storage.bucket, "other");
        // Defaults
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.crypto.kdf, "sha256");
        assert_eq!(config.server.log_format, "text");
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let result = CcfsConfig::from_toml("[storage]\ntimeout_secs = \"soon\"\n");
        assert!(matches!(result, Err(CcfsError::Config(_))));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = CcfsConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = CcfsConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.server.listen, parsed.server.listen);
        assert_eq!(config.storage.endpoint, parsed.storage.endpoint);
        assert_eq!(config.transfer.object_ttl_secs, parsed.transfer.object_ttl_secs);
    }

    #[test]
    fn test_from_file_missing_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = CcfsConfig::from_file(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.bucket, "ccfs");
    }

    #[test]
    fn test_from_file_reads_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ccfs.toml");
        std::fs::write(&path, "[crypto]\nkdf = \"argon2id\"\n").unwrap();

        let config = CcfsConfig::from_file(&path).unwrap();
        assert_eq!(config.crypto.kdf, "argon2id");
    }
}
