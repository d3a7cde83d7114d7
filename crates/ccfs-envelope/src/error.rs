use ccfs_crypto::CryptoError;
use ccfs_storage::StorageError;
use thiserror::Error;

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Every way an upload or download can fail.
///
/// Wrong password and corrupt data are separate variants so callers can
/// branch on them. Transports must still render [`EnvelopeError::is_denial`]
/// cases identically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("invalid key length: {0} bytes")]
    InvalidKey(usize),

    /// The sealed filename did not authenticate under the supplied password.
    #[error("incorrect password")]
    WrongPassword,

    /// The filename opened but the body did not: the stored bytes are damaged.
    #[error("stored content failed authentication")]
    CorruptContent,

    #[error("corrupt object metadata: {0}")]
    CorruptMetadata(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("object does not exist")]
    NotFound,

    /// Transient storage fault. The only retryable kind.
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Client-chosen KDF settings heavier than this deployment accepts.
    #[error("KDF not accepted: {0}")]
    KdfNotAccepted(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("config error: {0}")]
    Config(String),
}

impl EnvelopeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnvelopeError::Io(_))
    }

    /// Failures that must look the same to an unauthenticated caller.
    pub fn is_denial(&self) -> bool {
        matches!(self, EnvelopeError::WrongPassword | EnvelopeError::NotFound)
    }

    /// Stable short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EnvelopeError::InvalidKey(_) => "invalid_key",
            EnvelopeError::WrongPassword => "wrong_password",
            EnvelopeError::CorruptContent => "corrupt_content",
            EnvelopeError::CorruptMetadata(_) => "corrupt_metadata",
            EnvelopeError::Decode(_) => "decode",
            EnvelopeError::NotFound => "not_found",
            EnvelopeError::Io(_) => "io",
            EnvelopeError::InvalidFilename(_) => "invalid_filename",
            EnvelopeError::EmptyPassword => "empty_password",
            EnvelopeError::WeakPassword { .. } => "weak_password",
            EnvelopeError::Kdf(_) => "kdf",
            EnvelopeError::KdfNotAccepted(_) => "kdf_not_accepted",
            EnvelopeError::Unsupported(_) => "unsupported",
            EnvelopeError::Config(_) => "config",
        }
    }
}

impl From<StorageError> for EnvelopeError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => EnvelopeError::NotFound,
            StorageError::Io(msg) => EnvelopeError::Io(msg),
            StorageError::Unsupported(msg) => EnvelopeError::Unsupported(msg),
            StorageError::Config(msg) => EnvelopeError::Config(msg),
        }
    }
}

/// Context-free mapping. `Authentication` is refined to `WrongPassword` or
/// `CorruptContent` at the call site, where the stage is known.
impl From<CryptoError> for EnvelopeError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKey(len) => EnvelopeError::InvalidKey(len),
            CryptoError::Authentication => EnvelopeError::CorruptContent,
            CryptoError::Decode(msg) => EnvelopeError::Decode(msg),
            CryptoError::Kdf(msg) => EnvelopeError::Kdf(msg),
            CryptoError::PayloadTooLarge => EnvelopeError::Unsupported("payload too large".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_io_is_retryable() {
        assert!(EnvelopeError::Io("timeout".into()).is_retryable());
        assert!(!EnvelopeError::WrongPassword.is_retryable());
        assert!(!EnvelopeError::NotFound.is_retryable());
        assert!(!EnvelopeError::CorruptContent.is_retryable());
    }

    #[test]
    fn test_denials() {
        assert!(EnvelopeError::WrongPassword.is_denial());
        assert!(EnvelopeError::NotFound.is_denial());
        assert!(!EnvelopeError::CorruptContent.is_denial());
        assert!(!EnvelopeError::CorruptMetadata("x".into()).is_denial());
    }

    #[test]
    fn test_storage_mapping() {
        assert_eq!(
            EnvelopeError::from(StorageError::NotFound("k".into())),
            EnvelopeError::NotFound
        );
        assert_eq!(
            EnvelopeError::from(StorageError::Io("reset".into())),
            EnvelopeError::Io("reset".into())
        );
    }

    #[test]
    fn test_crypto_mapping() {
        assert_eq!(EnvelopeError::from(CryptoError::InvalidKey(7)), EnvelopeError::InvalidKey(7));
        assert!(matches!(
            EnvelopeError::from(CryptoError::Decode("bad".into())),
            EnvelopeError::Decode(_)
        ));
    }
}
