//! The storage gateway contract

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::StorageError;

/// User-metadata field carrying the expiry hint (unix seconds).
pub const EXPIRES_AT_FIELD: &str = "expires-at";

/// What a head-style lookup returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_length: u64,
    pub user_metadata: HashMap<String, String>,
    pub expires_at: Option<SystemTime>,
}

/// A pre-authorized request a client can perform directly against the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedRequest {
    pub method: String,
    pub url: String,
    /// Headers the client must send verbatim (signed headers and metadata).
    pub headers: BTreeMap<String, String>,
}

/// Object storage as seen by the envelope protocol.
///
/// Keys are write-once: every upload mints a fresh key, so no method needs
/// to resolve concurrent writers.
pub trait ObjectStore: Clone + Send + Sync + 'static {
    fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
        expires: Option<SystemTime>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    fn head(&self, key: &str) -> impl Future<Output = Result<ObjectMeta, StorageError>> + Send;

    fn presign_put(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
        ttl: Duration,
    ) -> impl Future<Output = Result<PresignedRequest, StorageError>> + Send;

    fn presign_get(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<PresignedRequest, StorageError>> + Send;

    /// Cheap reachability check for readiness.
    fn check_health(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub(crate) fn encode_expiry(at: SystemTime) -> String {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

pub(crate) fn decode_expiry(metadata: &HashMap<String, String>) -> Option<SystemTime> {
    metadata
        .get(EXPIRES_AT_FIELD)
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
}

/// S3 user metadata travels as `x-amz-meta-<name>` headers.
pub(crate) fn metadata_headers(metadata: &HashMap<String, String>) -> BTreeMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| (format!("x-amz-meta-{}", k.to_ascii_lowercase()), v.clone()))
        .collect()
}
