//! Router and request handlers
//!
//! ```text
//! GET  /                     upload form
//! POST /                     multipart {password, file} → seal + store → JSON {key, url}
//! GET  /download/{key}       password form
//! POST /download/{key}       form {password} → decrypted attachment
//! GET  /api/upload?filename= presigned PUT for a client that sealed locally
//! GET  /api/download?key=    presigned GET of the sealed object (no existence check)
//! GET  /healthz /readyz /metrics
//! ```

use std::collections::HashMap;
use std::time::UNIX_EPOCH;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use ccfs_core::config::ServerConfig;
use ccfs_envelope::{check_password, sanitize_filename, EnvelopeError, ObjectMetadata, PresignedUpload};
use ccfs_storage::PresignedRequest;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::metrics;
use crate::pages;
use crate::state::AppState;

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(pages::upload_form).post(upload))
        .route("/download/{key}", get(pages::download_form).post(download))
        .route("/api/upload", get(api_upload))
        .route("/api/download", get(api_download))
        .route("/healthz", get(metrics::healthz_handler))
        .route("/readyz", get(metrics::readyz_handler));
    if server.metrics {
        app = app.route("/metrics", get(metrics::metrics_handler));
    }

    app.layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
    /// Unix seconds after which the object may be purged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut password = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("password") => password = Some(SecretString::from(field.text().await?)),
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let data = field.bytes().await?;
                file = Some((filename, data));
            }
            _ => debug!(field = ?name, "ignoring unexpected form field"),
        }
    }

    let password = password.ok_or_else(|| ApiError::BadRequest("missing password field".into()))?;
    let (filename, data) = file.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    check_password(&password, state.min_password_len)?;
    let filename = sanitize_filename(&filename)?;

    let result = state.envelope.upload(&password, &filename, &data).await;
    match &result {
        Ok(_) => state.metrics.upload("ok"),
        Err(e) => {
            if e.is_retryable() {
                state.metrics.storage_error();
            }
            state.metrics.upload(e.kind());
        }
    }
    let receipt = result?;

    Ok(Json(UploadResponse {
        key: receipt.key.to_string(),
        url: receipt.locator,
        expires_at: receipt
            .expires_at
            .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs()),
    }))
}

#[derive(Deserialize)]
struct PasswordForm {
    #[serde(default)]
    password: String,
}

async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, ApiError> {
    let password = SecretString::from(form.password);
    if password.expose_secret().is_empty() {
        return Err(EnvelopeError::EmptyPassword.into());
    }

    let result = state.envelope.download(&key, &password).await;
    match &result {
        Ok(_) => state.metrics.download("ok"),
        Err(e) if e.is_denial() => {
            state.metrics.denial();
            state.metrics.download("denied");
        }
        Err(e) => {
            if e.is_retryable() {
                state.metrics.storage_error();
            }
            state.metrics.download(e.kind());
        }
    }
    let delivered = result?;

    info!(bytes = delivered.content.len(), "serving decrypted download");
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&delivered.filename)),
        ],
        delivered.content,
    )
        .into_response())
}

/// `attachment` header with an ASCII fallback and an RFC 5987 UTF-8 name.
///
/// The name was sealed by whoever uploaded, so it is reduced to a bare file
/// name before it reaches the header.
fn content_disposition(filename: &str) -> String {
    let name = sanitize_filename(filename).unwrap_or_else(|_| "download".to_string());
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        ccfs_crypto::codec::escape_for_url(&name)
    )
}

/// Query: `filename` (required), plus `kdf`, `kdf-salt`, `kdf-params` when
/// the client sealed with Argon2id.
async fn api_upload(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PresignedUpload>, ApiError> {
    let metadata = ObjectMetadata::from_map(&query).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let slot = state
        .envelope
        .presign_upload(&metadata.sealed_filename, metadata.kdf)
        .await
        .map_err(|e| match e {
            EnvelopeError::Decode(_) | EnvelopeError::InvalidFilename(_) => {
                ApiError::BadRequest(e.to_string())
            }
            other => other.into(),
        })?;
    state.metrics.presign("put");
    Ok(Json(slot))
}

#[derive(Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

async fn api_download(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<PresignedRequest>, ApiError> {
    let key = query.key.ok_or(ApiError::Unauthorized)?;
    let request = state
        .envelope
        .presign_download(&key)
        .await
        .map_err(|e| match e {
            EnvelopeError::NotFound => ApiError::Unauthorized,
            other => other.into(),
        })?;
    state.metrics.presign("get");
    Ok(Json(request))
}
