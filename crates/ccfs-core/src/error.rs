use thiserror::Error;

pub type CcfsResult<T> = Result<T, CcfsError>;

#[derive(Debug, Error)]
pub enum CcfsError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
