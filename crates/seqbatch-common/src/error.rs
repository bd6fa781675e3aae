//! Error types for seqbatch domain values

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while interpreting domain values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid batch label: '{0}'")]
    InvalidBatchLabel(String),

    #[error("Invalid batch status: '{0}'")]
    InvalidStatus(String),
}
