use std::sync::Arc;

use ccfs_envelope::Envelope;
use ccfs_storage::AnyStore;
use prometheus_client::registry::Registry;

use crate::metrics::Metrics;

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub envelope: Envelope<AnyStore>,
    pub metrics: Metrics,
    pub registry: Arc<Registry>,
    pub min_password_len: usize,
}

impl AppState {
    pub fn new(envelope: Envelope<AnyStore>, min_password_len: usize) -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            envelope,
            metrics,
            registry: Arc::new(registry),
            min_password_len,
        }
    }
}
