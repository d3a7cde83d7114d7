//! Authenticated cipher box: XChaCha20-Poly1305 over arbitrary payloads
//!
//! Sealed blob format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! The blob is self-describing: given the right key, nothing else is needed
//! to authenticate and decrypt it.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::CryptoError;
use crate::kdf::DerivedKey;
use crate::{KEY_SIZE, MIN_SEALED_LEN, NONCE_SIZE};

/// Seals and opens payloads under one 256-bit key.
#[derive(Clone)]
pub struct CipherBox {
    cipher: XChaCha20Poly1305,
}

impl CipherBox {
    /// Build a box from raw key bytes. Anything but 32 bytes is rejected.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(key.len()));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKey(key.len()))?;
        Ok(Self { cipher })
    }

    pub fn from_key(key: &DerivedKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }

    /// Encrypt and authenticate `plaintext` under a fresh random nonce.
    ///
    /// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::PayloadTooLarge)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Verify and decrypt a blob produced by [`CipherBox::seal`].
    ///
    /// Truncated input fails the same way as a bad tag.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < MIN_SEALED_LEN {
            return Err(CryptoError::Authentication);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce = XNonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Authentication)
    }
}

impl std::fmt::Debug for CipherBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherBox").finish_non_exhaustive()
    }
}
