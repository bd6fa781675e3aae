//! Error types for reading inputs and maintaining batch files
//!
//! Every variant stops the run: they describe problems in the inputs or in
//! the output directory that would recur for every batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Input stream is structurally malformed
    #[error("Malformed input '{source_name}' at line {line}: {message}")]
    Parse {
        source_name: String,
        line: u64,
        message: String,
    },

    /// A FASTA record could not be read or fails validation
    #[error("Malformed sequence file '{source_name}' at record {record}: {message}")]
    Sequence {
        source_name: String,
        record: usize,
        message: String,
    },

    #[error("Duplicate sequence identifier '{id}' in '{source_name}' (record {record}); identifiers must be unique")]
    DuplicateRecord {
        source_name: String,
        id: String,
        record: usize,
    },

    /// A key value occurs more than once
    #[error("Duplicate key '{key}' in '{source_name}' (line {line}); keys must be unique")]
    DuplicateKey {
        source_name: String,
        key: String,
        line: u64,
    },

    /// The configured key column is absent from the table header
    #[error("Key column '{column}' not found in '{source_name}'. Available columns: {}", .available.join(", "))]
    MissingColumn {
        source_name: String,
        column: String,
        available: Vec<String>,
    },

    /// Output prefix does not name a file
    #[error("Invalid output prefix '{0}'. Give a file name prefix such as 'output' or 'runs/output'.")]
    InvalidPrefix(String),

    #[error("Batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    /// Batch files on disk do not pair up as written
    #[error("Inconsistent batch files for batch {label}: {message}")]
    BatchLayout { label: String, message: String },

    #[error("Tabular file error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("File operation failed on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub fn parse(source_name: impl Into<String>, line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    pub fn sequence(source_name: impl Into<String>, record: usize, message: impl Into<String>) -> Self {
        Self::Sequence {
            source_name: source_name.into(),
            record,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn batch_layout(label: impl ToString, message: impl Into<String>) -> Self {
        Self::BatchLayout {
            label: label.to_string(),
            message: message.into(),
        }
    }
}
