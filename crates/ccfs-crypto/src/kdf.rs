//! Key derivation: password → 256-bit key
//!
//! Two strategies sit behind [`KeyDerivation`]:
//! - [`LegacySha256`]: one SHA-256 over the raw password bytes, no salt.
//!   Objects written by older clients were sealed this way, so it stays the
//!   default for compatibility. It is fast to brute-force; prefer Argon2id.
//! - [`Argon2id`]: memory-hard, salted. The salt and parameters travel with
//!   the object as metadata so the key can be reproduced at download time.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a password.
///
/// Zeroized on drop; never cached across requests.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Legacy derivation: SHA-256 of the raw password bytes.
///
/// Total over any input, including the empty password. Whether an empty
/// password is acceptable is decided by the caller, not here.
pub fn derive_key(password: &[u8]) -> DerivedKey {
    let mut digest = Sha256::digest(password);
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&digest);
    digest.as_mut_slice().zeroize();
    DerivedKey::from_bytes(bytes)
}

/// Capability: turn a password (and optional salt) into a key.
pub trait KeyDerivation {
    fn derive(&self, password: &SecretString, salt: Option<&[u8]>) -> Result<DerivedKey, CryptoError>;
}

/// Unsalted SHA-256. Any salt passed in is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySha256;

impl KeyDerivation for LegacySha256 {
    fn derive(&self, password: &SecretString, _salt: Option<&[u8]>) -> Result<DerivedKey, CryptoError> {
        Ok(derive_key(password.expose_secret().as_bytes()))
    }
}

/// Argon2id parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl KdfParams {
    /// Hard upper bounds for parameters parsed from text. Metadata is
    /// client-writable in the direct upload mode; callers holding a
    /// configuration narrow this further with [`KdfParams::fits_within`].
    pub const MAX_MEM_COST_KIB: u32 = 256 * 1024;
    pub const MAX_TIME_COST: u32 = 8;
    pub const MAX_PARALLELISM: u32 = 8;

    fn within_limits(&self) -> bool {
        (1..=Self::MAX_MEM_COST_KIB).contains(&self.mem_cost_kib)
            && (1..=Self::MAX_TIME_COST).contains(&self.time_cost)
            && (1..=Self::MAX_PARALLELISM).contains(&self.parallelism)
    }

    /// True when no parameter exceeds the matching one in `ceiling`.
    pub fn fits_within(&self, ceiling: &KdfParams) -> bool {
        self.mem_cost_kib <= ceiling.mem_cost_kib
            && self.time_cost <= ceiling.time_cost
            && self.parallelism <= ceiling.parallelism
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Rendered as `m=<KiB>,t=<iterations>,p=<lanes>`
impl fmt::Display for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m={},t={},p={}",
            self.mem_cost_kib, self.time_cost, self.parallelism
        )
    }
}

impl FromStr for KdfParams {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mut m, mut t, mut p) = (None, None, None);
        for part in s.split(',') {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| CryptoError::Kdf(format!("malformed KDF params: {s:?}")))?;
            let value: u32 = value
                .trim()
                .parse()
                .map_err(|e| CryptoError::Kdf(format!("KDF param {name}: {e}")))?;
            match name.trim() {
                "m" => m = Some(value),
                "t" => t = Some(value),
                "p" => p = Some(value),
                other => return Err(CryptoError::Kdf(format!("unknown KDF param {other:?}"))),
            }
        }
        let params = match (m, t, p) {
            (Some(mem_cost_kib), Some(time_cost), Some(parallelism)) => KdfParams {
                mem_cost_kib,
                time_cost,
                parallelism,
            },
            _ => return Err(CryptoError::Kdf(format!("incomplete KDF params: {s:?}"))),
        };
        if !params.within_limits() {
            return Err(CryptoError::Kdf(format!("KDF params out of range: {params}")));
        }
        Ok(params)
    }
}

/// Salted Argon2id.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2id {
    pub params: KdfParams,
}

impl KeyDerivation for Argon2id {
    fn derive(&self, password: &SecretString, salt: Option<&[u8]>) -> Result<DerivedKey, CryptoError> {
        let salt = salt.ok_or_else(|| CryptoError::Kdf("Argon2id requires a salt".into()))?;

        let argon2_params = Params::new(
            self.params.mem_cost_kib,
            self.params.time_cost,
            self.params.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

        let mut key = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::Kdf(format!("Argon2id failed: {e}")))?;

        Ok(DerivedKey::from_bytes(key))
    }
}

/// Which KDF new uploads use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KdfKind {
    #[default]
    Sha256,
    Argon2id,
}

impl KdfKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfKind::Sha256 => "sha256",
            KdfKind::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for KdfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KdfKind {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(KdfKind::Sha256),
            "argon2id" => Ok(KdfKind::Argon2id),
            other => Err(CryptoError::Kdf(format!("unknown KDF {other:?}"))),
        }
    }
}

/// The KDF that sealed one particular object, with everything needed to
/// reproduce its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfSpec {
    Sha256,
    Argon2id {
        salt: [u8; SALT_SIZE],
        params: KdfParams,
    },
}

impl KdfSpec {
    /// KDF choice for a new upload. Argon2id gets a fresh random salt.
    pub fn generate(kind: KdfKind, params: KdfParams) -> Self {
        match kind {
            KdfKind::Sha256 => KdfSpec::Sha256,
            KdfKind::Argon2id => {
                let mut salt = [0u8; SALT_SIZE];
                rand::thread_rng().fill_bytes(&mut salt);
                KdfSpec::Argon2id { salt, params }
            }
        }
    }

    pub fn kind(&self) -> KdfKind {
        match self {
            KdfSpec::Sha256 => KdfKind::Sha256,
            KdfSpec::Argon2id { .. } => KdfKind::Argon2id,
        }
    }

    pub fn derive(&self, password: &SecretString) -> Result<DerivedKey, CryptoError> {
        match self {
            KdfSpec::Sha256 => LegacySha256.derive(password, None),
            KdfSpec::Argon2id { salt, params } => {
                Argon2id { params: *params }.derive(password, Some(salt.as_slice()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc")
        let key = derive_key(b"abc");
        assert_eq!(
            key.as_bytes()[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "legacy KDF must be plain SHA-256"
        );
    }

    #[test]
    fn test_sha256_deterministic() {
        let k1 = derive_key(b"correct-horse");
        let k2 = derive_key(b"correct-horse");
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_sha256_different_passwords() {
        let k1 = derive_key(b"password-a");
        let k2 = derive_key(b"password-b");
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_empty_password_accepted() {
        let key = derive_key(b"");
        assert_ne!(key.as_bytes(), &[0u8; KEY_SIZE]);
    }

    #[test]
    fn test_legacy_trait_matches_free_fn() {
        let password = SecretString::from("hunter2");
        let via_trait = LegacySha256.derive(&password, Some(&b"ignored-salt"[..])).unwrap();
        assert_eq!(via_trait.as_bytes(), derive_key(b"hunter2").as_bytes());
    }

    #[test]
    fn test_argon2id_requires_salt() {
        let kdf = Argon2id {
            params: fast_params(),
        };
        let result = kdf.derive(&SecretString::from("pw"), None);
        assert!(matches!(result, Err(CryptoError::Kdf(_))));
    }

    #[test]
    fn test_argon2id_deterministic_per_salt() {
        let kdf = Argon2id {
            params: fast_params(),
        };
        let password = SecretString::from("same-passphrase");

        let k1 = kdf.derive(&password, Some(&[1u8; SALT_SIZE][..])).unwrap();
        let k2 = kdf.derive(&password, Some(&[1u8; SALT_SIZE][..])).unwrap();
        let k3 = kdf.derive(&password, Some(&[2u8; SALT_SIZE][..])).unwrap();

        assert_eq!(k1.as_bytes(), k2.as_bytes(), "KDF must be deterministic");
        assert_ne!(k1.as_bytes(), k3.as_bytes(), "different salts must produce different keys");
    }

    #[test]
    fn test_argon2id_differs_from_legacy() {
        let password = SecretString::from("pw");
        let spec = KdfSpec::Argon2id {
            salt: [7u8; SALT_SIZE],
            params: fast_params(),
        };
        let argon = spec.derive(&password).unwrap();
        let legacy = KdfSpec::Sha256.derive(&password).unwrap();
        assert_ne!(argon.as_bytes(), legacy.as_bytes());
    }

    #[test]
    fn test_generate_fresh_salts() {
        let a = KdfSpec::generate(KdfKind::Argon2id, fast_params());
        let b = KdfSpec::generate(KdfKind::Argon2id, fast_params());
        assert_ne!(a, b, "each upload must get its own salt");
        assert_eq!(KdfSpec::generate(KdfKind::Sha256, fast_params()), KdfSpec::Sha256);
    }

    #[test]
    fn test_params_display_parse() {
        let params = KdfParams::default();
        assert_eq!(params.to_string(), "m=65536,t=3,p=4");
        assert_eq!("m=65536,t=3,p=4".parse::<KdfParams>().unwrap(), params);
        assert_eq!("p=4, t=3, m=65536".parse::<KdfParams>().unwrap(), params);
    }

    #[test]
    fn test_params_reject_malformed_and_oversized() {
        assert!("m=1,t=1".parse::<KdfParams>().is_err());
        assert!("m=x,t=1,p=1".parse::<KdfParams>().is_err());
        assert!("m=1,t=1,p=1,q=2".parse::<KdfParams>().is_err());
        assert!("garbage".parse::<KdfParams>().is_err());
        assert!("m=4294967295,t=1,p=1".parse::<KdfParams>().is_err());
        assert!("m=1024,t=0,p=1".parse::<KdfParams>().is_err());
        assert!("m=1048576,t=16,p=16".parse::<KdfParams>().is_err());
        assert!("m=262144,t=8,p=8".parse::<KdfParams>().is_ok());
    }

    #[test]
    fn test_params_fit_within_ceiling() {
        let ceiling = KdfParams::default();
        assert!(fast_params().fits_within(&ceiling));
        assert!(ceiling.fits_within(&ceiling));
        let heavier = KdfParams {
            mem_cost_kib: ceiling.mem_cost_kib * 2,
            ..ceiling
        };
        assert!(!heavier.fits_within(&ceiling));
        let longer = KdfParams {
            time_cost: ceiling.time_cost + 1,
            ..ceiling
        };
        assert!(!longer.fits_within(&ceiling));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("sha256".parse::<KdfKind>().unwrap(), KdfKind::Sha256);
        assert_eq!("Argon2id".parse::<KdfKind>().unwrap(), KdfKind::Argon2id);
        assert!("bcrypt".parse::<KdfKind>().is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let key = derive_key(b"secret");
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
