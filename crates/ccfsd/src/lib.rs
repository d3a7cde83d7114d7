//! ccfsd: HTTP front end for the ccfs envelope protocol

pub mod app;
pub mod error;
pub mod metrics;
pub mod pages;
pub mod state;

pub use app::router;
pub use state::AppState;
