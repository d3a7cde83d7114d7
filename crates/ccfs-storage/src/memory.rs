//! In-process object store
//!
//! Behaves like a bucket with a lifecycle rule: objects past their expiry
//! hint read as not found and are dropped on the next write. Presigned URLs
//! use a `memory://` scheme unless a base URL is set with
//! [`MemoryStore::with_url_base`]; either way they are only meaningful to
//! tests.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::error::StorageError;
use crate::store::{metadata_headers, ObjectMeta, ObjectStore, PresignedRequest};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    metadata: HashMap<String, String>,
    expires_at: Option<SystemTime>,
}

impl StoredObject {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    body_reads: Arc<AtomicUsize>,
    url_base: Option<Arc<str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presign URLs as `<base>/<key>` so a test server can stand in for the
    /// bucket.
    pub fn with_url_base(mut self, base: &str) -> Self {
        self.url_base = Some(Arc::from(base.trim_end_matches('/')));
        self
    }

    fn url(&self, key: &str, ttl: Duration) -> String {
        let base = self.url_base.as_deref().unwrap_or("memory://");
        format!("{base}/{key}?expires_in={}", ttl.as_secs())
    }

    /// Number of `get` calls served so far (successful or not).
    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite one metadata field of an existing object.
    pub fn set_metadata(&self, key: &str, field: &str, value: Option<&str>) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        match value {
            Some(v) => obj.metadata.insert(field.to_string(), v.to_string()),
            None => obj.metadata.remove(field),
        };
        Ok(())
    }

    /// Replace the body of an existing object, keeping its metadata.
    pub fn set_body(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        obj.body = Bytes::from(body);
        Ok(())
    }

    fn live(&self, key: &str) -> Result<StoredObject, StorageError> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        match objects.get(key) {
            Some(obj) if !obj.is_expired(SystemTime::now()) => Ok(obj.clone()),
            _ => Err(StorageError::NotFound(key.to_string())),
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Io("memory store lock poisoned".into())
}

impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
        expires: Option<SystemTime>,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let now = SystemTime::now();
        objects.retain(|_, obj| !obj.is_expired(now));
        objects.insert(
            key.to_string(),
            StoredObject {
                body: Bytes::from(body),
                metadata,
                expires_at: expires,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.body_reads.fetch_add(1, Ordering::SeqCst);
        self.live(key).map(|obj| obj.body.to_vec())
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        self.live(key).map(|obj| ObjectMeta {
            content_length: obj.body.len() as u64,
            user_metadata: obj.metadata,
            expires_at: obj.expires_at,
        })
    }

    async fn presign_put(
        &self,
        key: &str,
        metadata: &HashMap<String, String>,
        ttl: Duration,
    ) -> Result<PresignedRequest, StorageError> {
        Ok(PresignedRequest {
            method: "PUT".into(),
            url: self.url(key, ttl),
            headers: metadata_headers(metadata),
        })
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<PresignedRequest, StorageError> {
        Ok(PresignedRequest {
            method: "GET".into(),
            url: self.url(key, ttl),
            headers: Default::default(),
        })
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        self.objects.read().map(|_| ()).map_err(|_| poisoned())
    }
}
