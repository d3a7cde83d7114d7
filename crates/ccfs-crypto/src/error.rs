use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid key length: {0} bytes (expected {expected})", expected = crate::KEY_SIZE)]
    InvalidKey(usize),

    /// Tag mismatch: wrong key, or the sealed bytes were tampered with or truncated.
    #[error("authentication failed: wrong key or corrupted data")]
    Authentication,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("payload too large to seal")]
    PayloadTooLarge,
}
