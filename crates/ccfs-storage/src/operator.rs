//! OpenDAL-backed S3 gateway

use anyhow::{Context, Result};
use opendal::Operator;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime};

use crate::error::StorageError;
use crate::store::{
    decode_expiry, encode_expiry, metadata_headers, ObjectMeta, ObjectStore, PresignedRequest,
    EXPIRES_AT_FIELD,
};

/// Minimal config needed to build an operator
/// (full config lives in ccfs-core's StorageConfig)
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub timeout: Duration,
}

/// Build an OpenDAL Operator for S3 (or any S3-compatible endpoint)
///
/// Uses path-style addressing (default in opendal 0.55), which MinIO and
/// other self-hosted endpoints require.
pub fn build_operator(cfg: &StorageConfig) -> Result<Operator> {
    // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&cfg.access_key_id)
        .secret_access_key(&cfg.secret_access_key);

    // Timeout sits inside retry so each attempt gets its own deadline
    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(opendal::layers::TimeoutLayer::new().with_timeout(cfg.timeout))
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build an operator from ccfs-core config + loaded credentials.
///
/// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_from_core_config(
    storage: &ccfs_core::config::StorageConfig,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<Operator> {
    if storage.endpoint.starts_with("http://") {
        if storage.enforce_tls {
            anyhow::bail!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            );
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP: sealed objects and credentials travel unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }

    build_operator(&StorageConfig {
        endpoint: storage.endpoint.clone(),
        region: storage.region.clone(),
        bucket: storage.bucket.clone(),
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        timeout: Duration::from_secs(storage.timeout_secs.max(1)),
    })
}

/// [`ObjectStore`] over an OpenDAL operator.
///
/// OpenDAL has no S3 `Expires` option, so the expiry hint is written as the
/// `expires-at` user-metadata field; bucket lifecycle rules do the purging.
#[derive(Clone)]
pub struct OpendalStore {
    op: Operator,
}

impl OpendalStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

impl ObjectStore for OpendalStore {
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        mut metadata: HashMap<String, String>,
        expires: Option<SystemTime>,
    ) -> Result<(), StorageError> {
        if let Some(at) = expires {
            metadata.insert(EXPIRES_AT_FIELD.to_string(), encode_expiry(at));
        }
        let len = body.len();
        self.op
            .write_with(key, body)
            .user_metadata(metadata)
            .await
            .map_err(|e| StorageError::from_opendal(key, e))?;
        tracing::debug!(key, bytes = len, "object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let buf = self
            .op
            .read(key)
            .await
            .map_err(|e| StorageError::from_opendal(key, e))?;
        Ok(buf.to_vec())
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        let meta = self
            .op
            .stat(key)
            .await
            .map_err(|e| StorageError::from_opendal(key, e))?;
        let user_metadata = meta.user_metadata().cloned().unwrap_or_default();
        Ok(ObjectMeta {
            content_length: meta.content_length(),
            expires_at: decode_expiry(&user_metadata),
            user_metadata,
        })
    }

    async fn presign_put(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
        ttl: Duration,
    ) -> Result<PresignedRequest, StorageError> {
        let req = self
            .op
            .presign_write(key, ttl)
            .await
            .map_err(|e| StorageError::from_opendal(key, e))?;

        let mut headers = collect_headers(req.header().iter().map(|(k, v)| (k.as_str(), v.to_str())));
        headers.extend(metadata_headers(metadata));
        Ok(PresignedRequest {
            method: req.method().to_string(),
            url: req.uri().to_string(),
            headers,
        })
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<PresignedRequest, StorageError> {
        let req = self
            .op
            .presign_read(key, ttl)
            .await
            .map_err(|e| StorageError::from_opendal(key, e))?;

        Ok(PresignedRequest {
            method: req.method().to_string(),
            url: req.uri().to_string(),
            headers: collect_headers(req.header().iter().map(|(k, v)| (k.as_str(), v.to_str()))),
        })
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        crate::health::check_health(&self.op)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))
    }
}

/// Keep only headers representable as text; non-ASCII values are dropped.
fn collect_headers<'a, E>(
    headers: impl Iterator<Item = (&'a str, Result<&'a str, E>)>,
) -> BTreeMap<String, String> {
    headers
        .filter_map(|(k, v)| v.ok().map(|v| (k.to_string(), v.to_string())))
        .collect()
}
