use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CcfsError;

/// Random identifier naming one stored object.
///
/// Always a UUID v4 rendered in lowercase hyphenated form. It is used both as
/// the storage key and as the path segment of the public download locator, so
/// parsing rejects anything that is not a well-formed v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(Uuid);

impl ObjectKey {
    /// Mint a fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ObjectKey {
    type Err = CcfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::try_parse(s.trim())
            .map_err(|e| CcfsError::InvalidObjectKey(format!("{s:?}: {e}")))?;
        if uuid.get_version_num() != 4 {
            return Err(CcfsError::InvalidObjectKey(format!(
                "{s:?}: expected a v4 UUID, got version {}",
                uuid.get_version_num()
            )));
        }
        Ok(Self(uuid))
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = CcfsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.to_string()
    }
}
