//! Mapping envelope failures onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ccfs_envelope::EnvelopeError;
use thiserror::Error;

/// Body of every denial. Wrong password, unknown key and malformed key all
/// produce exactly these bytes.
pub const DENIED_BODY: &str = "Access denied: unknown file or incorrect password\n";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Rejections produced by axum extractors (oversized body, bad multipart)
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("unauthorized")]
    Unauthorized,
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ApiError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Envelope(e) => match e {
                _ if e.is_denial() => StatusCode::FORBIDDEN,
                EnvelopeError::InvalidFilename(_)
                | EnvelopeError::KdfNotAccepted(_)
                | EnvelopeError::EmptyPassword
                | EnvelopeError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
                EnvelopeError::Io(_) => StatusCode::SERVICE_UNAVAILABLE,
                EnvelopeError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Envelope(e) if e.is_denial() => DENIED_BODY.to_string(),
            ApiError::Envelope(EnvelopeError::Io(_)) => {
                "Storage temporarily unavailable, try again\n".to_string()
            }
            // Corrupt objects: say so, but keep internals out of the body
            ApiError::Envelope(_) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                "The stored file is damaged and cannot be decrypted\n".to_string()
            }
            other => format!("{other}\n"),
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "request failed: {self}");
        }
        (status, [("content-type", "text/plain; charset=utf-8")], body).into_response()
    }
}
