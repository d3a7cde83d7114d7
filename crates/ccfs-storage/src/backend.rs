//! Runtime-selected backend

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::operator::{build_from_core_config, OpendalStore};
use crate::store::{ObjectMeta, ObjectStore, PresignedRequest};

/// Either backend, chosen by `storage.backend` in the config.
#[derive(Clone)]
pub enum AnyStore {
    S3(OpendalStore),
    Memory(MemoryStore),
}

impl AnyStore {
    /// Build the configured backend. S3 credentials are only consulted for "s3".
    pub fn from_config(
        storage: &ccfs_core::config::StorageConfig,
        credentials: impl FnOnce() -> anyhow::Result<(String, String)>,
    ) -> anyhow::Result<Self> {
        match storage.backend.as_str() {
            "s3" => {
                let (access_key_id, secret_access_key) = credentials()?;
                let op = build_from_core_config(storage, &access_key_id, &secret_access_key)?;
                Ok(AnyStore::S3(OpendalStore::new(op)))
            }
            "memory" => {
                tracing::warn!("using in-memory storage: objects are lost on exit");
                Ok(AnyStore::Memory(MemoryStore::new()))
            }
            other => anyhow::bail!("unknown storage backend {other:?} (expected \"s3\" or \"memory\")"),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AnyStore::S3(_) => "s3",
            AnyStore::Memory(_) => "memory",
        }
    }
}

impl ObjectStore for AnyStore {
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
        expires: Option<SystemTime>,
    ) -> Result<(), StorageError> {
        match self {
            AnyStore::S3(s) => s.put(key, body, metadata, expires).await,
            AnyStore::Memory(s) => s.put(key, body, metadata, expires).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match self {
            AnyStore::S3(s) => s.get(key).await,
            AnyStore::Memory(s) => s.get(key).await,
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        match self {
            AnyStore::S3(s) => s.head(key).await,
            AnyStore::Memory(s) => s.head(key).await,
        }
    }

    async fn presign_put(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
        ttl: Duration,
    ) -> Result<PresignedRequest, StorageError> {
        match self {
            AnyStore::S3(s) => s.presign_put(key, metadata, ttl).await,
            AnyStore::Memory(s) => s.presign_put(key, metadata, ttl).await,
        }
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<PresignedRequest, StorageError> {
        match self {
            AnyStore::S3(s) => s.presign_get(key, ttl).await,
            AnyStore::Memory(s) => s.presign_get(key, ttl).await,
        }
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        match self {
            AnyStore::S3(s) => s.check_health().await,
            AnyStore::Memory(s) => s.check_health().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_skips_credentials() {
        let storage = ccfs_core::config::StorageConfig {
            backend: "memory".into(),
            ..Default::default()
        };
        let store = AnyStore::from_config(&storage, || anyhow::bail!("must not be called")).unwrap();
        assert_eq!(store.describe(), "memory");
    }

    #[test]
    fn test_s3_backend_requires_credentials() {
        let storage = ccfs_core::config::StorageConfig::default();
        let result = AnyStore::from_config(&storage, || anyhow::bail!("no credentials"));
        assert!(result.is_err());

        let store = AnyStore::from_config(&storage, || Ok(("id".into(), "secret".into()))).unwrap();
        assert_eq!(store.describe(), "s3");
    }

    #[test]
    fn test_unknown_backend() {
        let storage = ccfs_core::config::StorageConfig {
            backend: "ftp".into(),
            ..Default::default()
        };
        let result = AnyStore::from_config(&storage, || Ok((String::new(), String::new())));
        assert!(result.is_err());
    }
}
