//! Tabular processing engines for DataSentinel
//!
//! Everything in this crate is synchronous and CPU-bound. Callers in async
//! contexts run it inside `tokio::task::spawn_blocking`.

pub mod codec;
mod columnar;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod format;
pub mod normalization;
pub mod prediction;
pub mod profiling;
pub mod stats;
pub mod validation;

pub use codec::{read_dataset, write_dataset};
pub use dataset::{Cell, Column, DType, Dataset};
pub use error::{ProcessingError, ProcessingResult};
pub use format::FileFormat;
