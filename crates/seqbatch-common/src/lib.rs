//! Seqbatch Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the seqbatch workspace.
//!
//! # Overview
//!
//! - **Types**: sequence records, metadata rows, batches and their lifecycle
//! - **Error Handling**: `CommonError` and its result alias
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```
//! use seqbatch_common::types::{BatchId, BatchStatus};
//!
//! let id: BatchId = "4r1".parse().unwrap();
//! assert_eq!(id.index, 4);
//! assert_eq!(id.revision, 1);
//! assert!(BatchStatus::Queued.is_submittable());
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
