//! DataSentinel Storage Library
//!
//! Storage abstraction over S3 and the local filesystem. Datasets, reports and
//! engine outputs are addressed by plain object keys such as
//! `raw/sales.csv`, `profiling/sales_profile.json` or `converted/sales_converted.json`.
//!
//! Keys must not be empty, contain `..` or start with `/`. Validation lives in
//! the `keys` module so every backend enforces the same rules.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use datasentinel_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
