//! Object metadata layout
//!
//! | field        | value                                     |
//! |--------------|-------------------------------------------|
//! | `filename`   | base64 of the sealed filename blob        |
//! | `kdf`        | `sha256` or `argon2id` (absent = sha256)  |
//! | `kdf-salt`   | base64 of the 16-byte salt (argon2id)     |
//! | `kdf-params` | `m=..,t=..,p=..` (argon2id)               |

use std::collections::HashMap;

use ccfs_crypto::{codec, KdfKind, KdfParams, KdfSpec, SALT_SIZE};

use crate::error::{EnvelopeError, EnvelopeResult};

pub const FILENAME_FIELD: &str = "filename";
pub const KDF_FIELD: &str = "kdf";
pub const KDF_SALT_FIELD: &str = "kdf-salt";
pub const KDF_PARAMS_FIELD: &str = "kdf-params";

/// Longest accepted `filename` value. S3 caps all user metadata at 2 KiB.
pub const MAX_FIELD_LEN: usize = 2048;

/// The metadata the envelope reads and writes for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Base64 text, exactly as stored (transport escaping already removed).
    pub sealed_filename: String,
    pub kdf: KdfSpec,
}

impl ObjectMetadata {
    pub fn new(sealed_filename: String, kdf: KdfSpec) -> Self {
        Self { sealed_filename, kdf }
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(FILENAME_FIELD.to_string(), self.sealed_filename.clone());
        map.insert(KDF_FIELD.to_string(), self.kdf.kind().to_string());
        if let KdfSpec::Argon2id { salt, params } = &self.kdf {
            map.insert(KDF_SALT_FIELD.to_string(), codec::encode(salt));
            map.insert(KDF_PARAMS_FIELD.to_string(), params.to_string());
        }
        map
    }

    /// Parse the user metadata returned by a head lookup.
    ///
    /// The filename value may still carry one layer of percent-encoding when
    /// it arrived through a presigned upload; that layer is removed here.
    pub fn from_map(map: &HashMap<String, String>) -> EnvelopeResult<Self> {
        let raw = map
            .get(FILENAME_FIELD)
            .ok_or_else(|| EnvelopeError::CorruptMetadata("missing filename field".into()))?;
        let sealed_filename = codec::unescape_transport(raw)
            .map_err(|e| EnvelopeError::CorruptMetadata(e.to_string()))?;
        if sealed_filename.len() > MAX_FIELD_LEN {
            return Err(EnvelopeError::CorruptMetadata(format!(
                "filename field is {} bytes (maximum {MAX_FIELD_LEN})",
                sealed_filename.len()
            )));
        }

        let kind = match map.get(KDF_FIELD) {
            None => KdfKind::Sha256,
            Some(v) => v
                .parse::<KdfKind>()
                .map_err(|e| EnvelopeError::CorruptMetadata(e.to_string()))?,
        };

        let kdf = match kind {
            KdfKind::Sha256 => KdfSpec::Sha256,
            KdfKind::Argon2id => KdfSpec::Argon2id {
                salt: parse_salt(map.get(KDF_SALT_FIELD))?,
                params: map
                    .get(KDF_PARAMS_FIELD)
                    .ok_or_else(|| EnvelopeError::CorruptMetadata("missing kdf-params field".into()))?
                    .parse::<KdfParams>()
                    .map_err(|e| EnvelopeError::CorruptMetadata(e.to_string()))?,
            },
        };

        Ok(Self { sealed_filename, kdf })
    }
}

fn parse_salt(value: Option<&String>) -> EnvelopeResult<[u8; SALT_SIZE]> {
    let value = value.ok_or_else(|| EnvelopeError::CorruptMetadata("missing kdf-salt field".into()))?;
    let bytes = codec::decode(value).map_err(|e| EnvelopeError::CorruptMetadata(e.to_string()))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        EnvelopeError::CorruptMetadata(format!("kdf-salt is {} bytes, expected {SALT_SIZE}", b.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argon_spec() -> KdfSpec {
        KdfSpec::Argon2id {
            salt: [9u8; SALT_SIZE],
            params: KdfParams {
                mem_cost_kib: 1024,
                time_cost: 1,
                parallelism: 1,
            },
        }
    }

    #[test]
    fn test_sha256_layout() {
        let meta = ObjectMetadata::new("QUJD".into(), KdfSpec::Sha256);
        let map = meta.to_map();
        assert_eq!(map[FILENAME_FIELD], "QUJD");
        assert_eq!(map[KDF_FIELD], "sha256");
        assert!(!map.contains_key(KDF_SALT_FIELD));
        assert_eq!(ObjectMetadata::from_map(&map).unwrap(), meta);
    }

    #[test]
    fn test_argon2id_layout() {
        let meta = ObjectMetadata::new("QUJD".into(), argon_spec());
        let map = meta.to_map();
        assert_eq!(map[KDF_FIELD], "argon2id");
        assert_eq!(map[KDF_PARAMS_FIELD], "m=1024,t=1,p=1");
        assert_eq!(ObjectMetadata::from_map(&map).unwrap(), meta);
    }

    #[test]
    fn test_absent_kdf_means_sha256() {
        let mut map = HashMap::new();
        map.insert(FILENAME_FIELD.to_string(), "QUJD".to_string());
        assert_eq!(ObjectMetadata::from_map(&map).unwrap().kdf, KdfSpec::Sha256);
    }

    #[test]
    fn test_missing_filename_is_corrupt() {
        let map = HashMap::new();
        assert!(matches!(
            ObjectMetadata::from_map(&map),
            Err(EnvelopeError::CorruptMetadata(_))
        ));
    }

    #[test]
    fn test_percent_escaped_filename_unescaped() {
        let mut map = HashMap::new();
        map.insert(FILENAME_FIELD.to_string(), "%2B%2F8%3D".to_string());
        assert_eq!(ObjectMetadata::from_map(&map).unwrap().sealed_filename, "+/8=");
    }

    #[test]
    fn test_oversized_filename_field_is_corrupt() {
        let mut map = HashMap::new();
        map.insert(FILENAME_FIELD.to_string(), "A".repeat(MAX_FIELD_LEN + 4));
        assert!(matches!(
            ObjectMetadata::from_map(&map),
            Err(EnvelopeError::CorruptMetadata(_))
        ));

        map.insert(FILENAME_FIELD.to_string(), "A".repeat(MAX_FIELD_LEN));
        assert!(ObjectMetadata::from_map(&map).is_ok());
    }

    #[test]
    fn test_bad_kdf_fields_are_corrupt() {
        let mut map = ObjectMetadata::new("QUJD".into(), argon_spec()).to_map();
        map.insert(KDF_SALT_FIELD.to_string(), codec::encode(&[1, 2, 3]));
        assert!(matches!(
            ObjectMetadata::from_map(&map),
            Err(EnvelopeError::CorruptMetadata(_))
        ));

        let mut map = ObjectMetadata::new("QUJD".into(), argon_spec()).to_map();
        map.remove(KDF_PARAMS_FIELD);
        assert!(ObjectMetadata::from_map(&map).is_err());

        let mut map = ObjectMetadata::new("QUJD".into(), KdfSpec::Sha256).to_map();
        map.insert(KDF_FIELD.to_string(), "scrypt".to_string());
        assert!(ObjectMetadata::from_map(&map).is_err());
    }
}
