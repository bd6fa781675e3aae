//! Error types for seqbatch CLI
//!
//! Every error is user-facing: the message says what went wrong and what to
//! do before the next run.

use seqbatch_common::types::BatchId;
use seqbatch_ingest::IngestError;
use thiserror::Error;

use crate::submit::machine::TransitionError;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Inputs or batch files are unusable; nothing was submitted
    #[error("{0}. Fix the input and rerun (add --reset if batch files must be regenerated).")]
    Input(#[from] IngestError),

    /// The endpoint rejected a batch for a reason that applies to every batch
    #[error("Batch {batch} stopped the run: {message}. Remaining batches were left queued.")]
    Fatal { batch: BatchId, message: String },

    /// The endpoint answered with something unexpected
    #[error("Endpoint error: {0}. Rerun to retry; a batch the endpoint already accepted is polled again, not resubmitted.")]
    Transport(String),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check your connection and the endpoint URL; rerun to retry.")]
    Http(#[from] reqwest::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Submission state machine was driven out of order
    #[error("Internal state error: {0}")]
    State(#[from] TransitionError),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn fatal(batch: BatchId, message: impl Into<String>) -> Self {
        Self::Fatal {
            batch,
            message: message.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error is one that a plain rerun may resolve
    pub fn is_retryable(&self) -> bool {
        matches!(self, CliError::Transport(_) | CliError::Http(_))
    }
}
