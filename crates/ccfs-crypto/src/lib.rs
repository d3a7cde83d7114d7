//! ccfs-crypto: password-derived sealing for stored objects
//!
//! ```text
//! Password ──KDF──▶ Derived Key (256-bit)
//!                     ├── seal(filename) ─▶ nonce ‖ ct ‖ tag ─▶ base64 ─▶ metadata "filename"
//!                     └── seal(content)  ─▶ nonce ‖ ct ‖ tag ─▶ object body
//! ```
//!
//! KDF is SHA-256 (legacy, unsalted) or Argon2id with a per-object salt.
//! Every seal call draws a fresh 192-bit nonce, so the two blobs of one
//! object never share a nonce even though they share a key.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod kdf;

pub use cipher::CipherBox;
pub use error::CryptoError;
pub use kdf::{
    derive_key, Argon2id, DerivedKey, KdfKind, KdfParams, KdfSpec, KeyDerivation, LegacySha256,
};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a per-object Argon2id salt
pub const SALT_SIZE: usize = 16;

/// Smallest valid sealed blob (empty plaintext)
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE;
