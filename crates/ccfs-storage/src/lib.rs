//! ccfs-storage: object storage gateway
//!
//! [`ObjectStore`] is the narrow put/get/head/presign surface the envelope
//! protocol needs. [`OpendalStore`] serves it from S3 through OpenDAL;
//! [`MemoryStore`] keeps objects in process for tests and local runs.

pub mod backend;
pub mod error;
pub mod health;
pub mod memory;
pub mod operator;
pub mod store;

pub use backend::AnyStore;
pub use error::StorageError;
pub use health::check_health;
pub use memory::MemoryStore;
pub use operator::{build_operator, OpendalStore, StorageConfig};
pub use store::{ObjectMeta, ObjectStore, PresignedRequest, EXPIRES_AT_FIELD};
