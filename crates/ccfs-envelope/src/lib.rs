//! ccfs-envelope: binds password-derived sealing to object storage
//!
//! Upload: derive key → seal filename → seal content → store under a fresh
//! random key with the sealed filename as base64 metadata.
//!
//! Download: head → decode metadata → derive key → open filename (wrong
//! password stops here, before the body is fetched) → get body → open.

pub mod envelope;
pub mod error;
pub mod metadata;
pub mod phase;
pub mod policy;

pub use envelope::{derive, Delivered, Envelope, EnvelopeConfig, ObjectInfo, PendingDownload, PresignedUpload, UploadReceipt};
pub use error::{EnvelopeError, EnvelopeResult};
pub use metadata::ObjectMetadata;
pub use phase::Phase;
pub use policy::{check_password, sanitize_filename, MAX_FILENAME_BYTES};
