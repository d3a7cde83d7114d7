use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// Transient storage or network fault. Callers may retry.
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("operation not supported by backend: {0}")]
    Unsupported(String),

    #[error("storage config error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }

    pub(crate) fn from_opendal(key: &str, e: opendal::Error) -> Self {
        match e.kind() {
            opendal::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            opendal::ErrorKind::Unsupported => StorageError::Unsupported(e.to_string()),
            opendal::ErrorKind::ConfigInvalid => StorageError::Config(e.to_string()),
            _ => StorageError::Io(format!("{key}: {e}")),
        }
    }
}
