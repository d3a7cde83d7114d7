//! Upload and download flows over an [`ObjectStore`]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ccfs_core::{CcfsConfig, ObjectKey};
use ccfs_crypto::{codec, CipherBox, CryptoError, DerivedKey, KdfKind, KdfParams, KdfSpec, MIN_SEALED_LEN};
use ccfs_storage::{ObjectStore, PresignedRequest};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::metadata::{ObjectMetadata, MAX_FIELD_LEN};
use crate::phase::Phase;
use crate::policy::MAX_FILENAME_BYTES;

/// Everything the envelope needs to know, resolved once at startup.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Base URL download locators are built from, without trailing slash
    pub public_url: String,
    /// KDF for new uploads
    pub kdf: KdfKind,
    pub kdf_params: KdfParams,
    /// Expiry hint attached to new objects
    pub object_ttl: Option<Duration>,
    pub presign_put_ttl: Duration,
    pub presign_get_ttl: Duration,
}

impl EnvelopeConfig {
    pub fn from_core(cfg: &CcfsConfig) -> EnvelopeResult<Self> {
        let kdf = cfg
            .crypto
            .kdf
            .parse::<KdfKind>()
            .map_err(|e| EnvelopeError::Config(format!("crypto.kdf: {e}")))?;
        Ok(Self {
            public_url: cfg.server.public_url.trim_end_matches('/').to_string(),
            kdf,
            kdf_params: KdfParams {
                mem_cost_kib: cfg.crypto.argon2_mem_cost_kib,
                time_cost: cfg.crypto.argon2_time_cost,
                parallelism: cfg.crypto.argon2_parallelism,
            },
            object_ttl: cfg.transfer.object_ttl_secs.map(Duration::from_secs),
            presign_put_ttl: Duration::from_secs(cfg.transfer.presign_put_ttl_secs),
            presign_get_ttl: Duration::from_secs(cfg.transfer.presign_get_ttl_secs),
        })
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:5000".into(),
            kdf: KdfKind::Sha256,
            kdf_params: KdfParams::default(),
            object_ttl: Some(Duration::from_secs(3600)),
            presign_put_ttl: Duration::from_secs(3600),
            presign_get_ttl: Duration::from_secs(60),
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub key: ObjectKey,
    /// `<public_url>/download/<key>`
    pub locator: String,
    pub expires_at: Option<SystemTime>,
}

/// A decrypted object
pub struct Delivered {
    pub filename: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for Delivered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivered")
            .field("filename", &"[REDACTED]")
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// A presigned upload slot handed to a client that seals locally.
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUpload {
    pub key: ObjectKey,
    pub locator: String,
    #[serde(flatten)]
    pub request: PresignedRequest,
}

/// Password-free view of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: ObjectKey,
    pub content_length: u64,
    pub kdf: KdfKind,
    pub expires_at: Option<SystemTime>,
}

/// A download whose password has been verified against the sealed
/// filename. The body has not been fetched yet.
pub struct PendingDownload<S> {
    store: S,
    key: ObjectKey,
    filename: String,
    content_length: u64,
    cipher: CipherBox,
}

impl<S: ObjectStore> PendingDownload<S> {
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Fetch the body and open it with the already verified key.
    pub async fn fetch(self) -> EnvelopeResult<Delivered> {
        let key = self.key.to_string();
        let sealed = self.store.get(&key).await.map_err(EnvelopeError::from)?;
        let content = self.cipher.open(&sealed).map_err(|e| match e {
            CryptoError::Authentication => EnvelopeError::CorruptContent,
            other => other.into(),
        });
        let content = match content {
            Ok(c) => c,
            Err(e) => {
                warn!(key = %key, phase = %Phase::Failed(e.kind()), "stored content failed to open");
                return Err(e);
            }
        };
        info!(key = %key, phase = %Phase::Delivered, bytes = content.len(), "object delivered");
        Ok(Delivered {
            filename: self.filename,
            content,
        })
    }
}

/// Wall time every denial is padded to.
#[derive(Default)]
struct DenialFloor {
    calibrated: OnceCell<Duration>,
    slowest_nanos: AtomicU64,
}

impl DenialFloor {
    fn observe(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.slowest_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    fn slowest(&self) -> Duration {
        Duration::from_nanos(self.slowest_nanos.load(Ordering::Relaxed))
    }
}

/// The object envelope protocol bound to one store.
#[derive(Clone)]
pub struct Envelope<S> {
    store: S,
    config: Arc<EnvelopeConfig>,
    floor: Arc<DenialFloor>,
}

impl<S: ObjectStore> Envelope<S> {
    pub fn new(store: S, config: EnvelopeConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            floor: Arc::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    fn locator(&self, key: &ObjectKey) -> String {
        format!("{}/download/{key}", self.config.public_url)
    }

    /// Seal `filename` and `content` under `password` and store them under a
    /// fresh random key.
    ///
    /// Password policy is the caller's business; the empty password works.
    pub async fn upload(
        &self,
        password: &SecretString,
        filename: &str,
        content: &[u8],
    ) -> EnvelopeResult<UploadReceipt> {
        if filename.len() > MAX_FILENAME_BYTES {
            return Err(EnvelopeError::InvalidFilename(format!(
                "{} bytes (maximum {MAX_FILENAME_BYTES})",
                filename.len()
            )));
        }
        debug!(phase = %Phase::Sealing, bytes = content.len(), kdf = %self.config.kdf, "sealing upload");

        let spec = KdfSpec::generate(self.config.kdf, self.config.kdf_params);
        let derived = derive(&spec, password).await?;
        let cipher = CipherBox::from_key(&derived);
        drop(derived);

        let sealed_filename = cipher.seal(filename.as_bytes())?;
        let sealed_content = cipher.seal(content)?;
        let metadata = ObjectMetadata::new(codec::encode(&sealed_filename), spec);

        let key = ObjectKey::generate();
        let expires_at = self.config.object_ttl.map(|ttl| SystemTime::now() + ttl);
        self.store
            .put(&key.to_string(), sealed_content, metadata.to_map(), expires_at)
            .await?;

        info!(key = %key, phase = %Phase::Stored, bytes = content.len(), "object sealed and stored");
        Ok(UploadReceipt {
            locator: self.locator(&key),
            key,
            expires_at,
        })
    }

    /// Verify `password` against the sealed filename of `key`.
    ///
    /// Fails with [`EnvelopeError::WrongPassword`] without ever reading the
    /// object body. Unknown and malformed keys both yield
    /// [`EnvelopeError::NotFound`]. Every denial returns no sooner than
    /// [`Envelope::denial_floor`] after the call started.
    pub async fn open_filename(
        &self,
        key: &str,
        password: &SecretString,
    ) -> EnvelopeResult<PendingDownload<S>> {
        let started = Instant::now();
        let result = self.verify(key, password).await;
        if let Err(e) = &result {
            if e.is_denial() {
                let floor = self.denial_floor().await;
                tokio::time::sleep_until(started + floor).await;
            }
        }
        result
    }

    async fn verify(&self, key: &str, password: &SecretString) -> EnvelopeResult<PendingDownload<S>> {
        debug!(phase = %Phase::Opening, "opening object");

        let Ok(key) = key.parse::<ObjectKey>() else {
            return Err(self.failed(None, EnvelopeError::NotFound));
        };

        let head = self
            .store
            .head(&key.to_string())
            .await
            .map_err(|e| self.failed(Some(&key), e.into()))?;

        let metadata =
            ObjectMetadata::from_map(&head.user_metadata).map_err(|e| self.failed(Some(&key), e))?;
        self.check_kdf(&metadata.kdf)
            .map_err(|e| self.failed(Some(&key), EnvelopeError::CorruptMetadata(e)))?;
        let sealed_filename = codec::decode(&metadata.sealed_filename)
            .map_err(|e| self.failed(Some(&key), e.into()))?;

        let derive_started = Instant::now();
        let derived = derive(&metadata.kdf, password)
            .await
            .map_err(|e| self.failed(Some(&key), e))?;
        self.floor.observe(derive_started.elapsed());
        let cipher = CipherBox::from_key(&derived);
        drop(derived);

        let filename = cipher
            .open(&sealed_filename)
            .map_err(|e| match e {
                CryptoError::Authentication => EnvelopeError::WrongPassword,
                other => other.into(),
            })
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|_| EnvelopeError::CorruptMetadata("filename is not UTF-8".into()))
            })
            .map_err(|e| self.failed(Some(&key), e))?;

        debug!(key = %key, "password verified against sealed filename");
        Ok(PendingDownload {
            store: self.store.clone(),
            key,
            filename,
            content_length: head.content_length,
            cipher,
        })
    }

    /// Verify, fetch and open in one step.
    pub async fn download(&self, key: &str, password: &SecretString) -> EnvelopeResult<Delivered> {
        self.open_filename(key, password).await?.fetch().await
    }

    /// Mint a key and a presigned PUT for a client that sealed locally.
    ///
    /// `encoded_filename` must be base64 of at least an empty sealed blob,
    /// optionally percent-escaped once. `kdf` may not be heavier than the
    /// configured Argon2id parameters. The store cannot check what the
    /// client actually sends with the URL.
    pub async fn presign_upload(
        &self,
        encoded_filename: &str,
        kdf: KdfSpec,
    ) -> EnvelopeResult<PresignedUpload> {
        self.check_kdf(&kdf).map_err(EnvelopeError::KdfNotAccepted)?;
        let text = codec::unescape_transport(encoded_filename)?;
        if text.len() > MAX_FIELD_LEN {
            return Err(EnvelopeError::InvalidFilename(format!(
                "sealed filename is {} bytes encoded (maximum {MAX_FIELD_LEN})",
                text.len()
            )));
        }
        let sealed = codec::decode(&text)?;
        if sealed.len() < MIN_SEALED_LEN {
            return Err(EnvelopeError::InvalidFilename(format!(
                "sealed filename is {} bytes, shorter than any sealed blob",
                sealed.len()
            )));
        }

        let key = ObjectKey::generate();
        let metadata = ObjectMetadata::new(text, kdf).to_map();
        let request = self
            .store
            .presign_put(&key.to_string(), &metadata, self.config.presign_put_ttl)
            .await?;

        info!(key = %key, phase = %Phase::AwaitingInput, "presigned upload issued");
        Ok(PresignedUpload {
            locator: self.locator(&key),
            key,
            request,
        })
    }

    /// Presigned GET for any well-formed key. The client decrypts locally.
    ///
    /// No lookup happens here: whether the object exists shows only at the
    /// storage URL, the same way for everyone.
    pub async fn presign_download(&self, key: &str) -> EnvelopeResult<PresignedRequest> {
        let key = key.parse::<ObjectKey>().map_err(|_| EnvelopeError::NotFound)?;
        let request = self
            .store
            .presign_get(&key.to_string(), self.config.presign_get_ttl)
            .await?;
        debug!(key = %key, "presigned download issued");
        Ok(request)
    }

    /// Size, KDF and expiry of an object, without a password.
    pub async fn inspect(&self, key: &str) -> EnvelopeResult<ObjectInfo> {
        let key = key.parse::<ObjectKey>().map_err(|_| EnvelopeError::NotFound)?;
        let head = self.store.head(&key.to_string()).await?;
        let metadata = ObjectMetadata::from_map(&head.user_metadata)?;
        Ok(ObjectInfo {
            key,
            content_length: head.content_length,
            kdf: metadata.kdf.kind(),
            expires_at: head.expires_at,
        })
    }

    /// Minimum wall time of a denial.
    ///
    /// Calibrated on first use by timing one Argon2id derivation at the
    /// configured parameters, the heaviest KDF this envelope will run, and
    /// raised whenever an object derivation takes longer.
    pub async fn denial_floor(&self) -> Duration {
        let calibrated = *self.floor.calibrated.get_or_init(|| self.calibrate()).await;
        calibrated.max(self.floor.slowest())
    }

    async fn calibrate(&self) -> Duration {
        let ceiling = KdfSpec::generate(KdfKind::Argon2id, self.config.kdf_params);
        let started = Instant::now();
        if let Err(e) = derive(&ceiling, &SecretString::from("")).await {
            warn!("denial floor calibration failed: {e}");
        }
        let floor = started.elapsed();
        debug!(floor_ms = floor.as_millis() as u64, "denial floor calibrated");
        floor
    }

    /// Argon2id settings above the configured ones are refused.
    fn check_kdf(&self, kdf: &KdfSpec) -> Result<(), String> {
        match kdf {
            KdfSpec::Argon2id { params, .. } if !params.fits_within(&self.config.kdf_params) => Err(
                format!("argon2id {params} exceeds configured {}", self.config.kdf_params),
            ),
            _ => Ok(()),
        }
    }

    fn failed(&self, key: Option<&ObjectKey>, err: EnvelopeError) -> EnvelopeError {
        let phase = Phase::Failed(err.kind());
        match key {
            Some(key) => debug!(key = %key, phase = %phase, "download refused"),
            None => debug!(phase = %phase, "download refused: malformed key"),
        }
        err
    }
}

/// Argon2id runs on the blocking pool; SHA-256 is cheap enough to run inline.
pub async fn derive(spec: &KdfSpec, password: &SecretString) -> EnvelopeResult<DerivedKey> {
    match spec {
        KdfSpec::Sha256 => Ok(spec.derive(password)?),
        KdfSpec::Argon2id { .. } => {
            let spec = spec.clone();
            let password = SecretString::from(password.expose_secret().to_string());
            tokio::task::spawn_blocking(move || spec.derive(&password))
                .await
                .map_err(|e| EnvelopeError::Kdf(format!("KDF task failed: {e}")))?
                .map_err(EnvelopeError::from)
        }
    }
}
