//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness check (always 200 if process is running)
//!   GET /readyz   - Readiness check (200 if storage is reachable)

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use ccfs_storage::ObjectStore;
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

use crate::state::AppState;

type Labels = Vec<(String, String)>;

/// Request counters, labelled by outcome.
///
/// Denials are counted without saying whether the key or the password was
/// wrong.
#[derive(Clone, Default)]
pub struct Metrics {
    uploads: Family<Labels, Counter>,
    downloads: Family<Labels, Counter>,
    presigns: Family<Labels, Counter>,
    denials: Counter,
    storage_errors: Counter,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "ccfs_uploads",
            "Server-side uploads by outcome",
            metrics.uploads.clone(),
        );
        registry.register(
            "ccfs_downloads",
            "Server-side downloads by outcome",
            metrics.downloads.clone(),
        );
        registry.register(
            "ccfs_presigned",
            "Presigned URLs issued by direction",
            metrics.presigns.clone(),
        );
        registry.register(
            "ccfs_denials",
            "Downloads refused for an unknown key or a wrong password",
            metrics.denials.clone(),
        );
        registry.register(
            "ccfs_storage_errors",
            "Storage round trips that failed with a transient error",
            metrics.storage_errors.clone(),
        );
        metrics
    }

    pub fn upload(&self, outcome: &str) {
        self.uploads.get_or_create(&labels("outcome", outcome)).inc();
    }

    pub fn download(&self, outcome: &str) {
        self.downloads.get_or_create(&labels("outcome", outcome)).inc();
    }

    pub fn presign(&self, direction: &str) {
        self.presigns.get_or_create(&labels("direction", direction)).inc();
    }

    pub fn denial(&self) {
        self.denials.inc();
    }

    pub fn storage_error(&self) {
        self.storage_errors.inc();
    }
}

fn labels(name: &str, value: &str) -> Labels {
    vec![(name.to_string(), value.to_string())]
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness check: returns 200 if the process is running.
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check: returns 200 if storage is reachable, 503 otherwise.
pub async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.envelope.store().check_health().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!("readiness check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable")
        }
    }
}
