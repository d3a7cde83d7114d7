pub mod config;
pub mod error;
pub mod types;

pub use config::CcfsConfig;
pub use error::{CcfsError, CcfsResult};
pub use types::ObjectKey;
