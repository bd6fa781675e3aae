//! Common types used across seqbatch

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Source Records
// ============================================================================

/// One record of the sequence file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// First whitespace-delimited token of the header line
    pub id: String,

    /// Remainder of the header line, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Residues with line breaks removed
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            sequence: sequence.into(),
        }
    }

    /// Full header text without the leading `>`
    pub fn header(&self) -> String {
        match &self.description {
            Some(description) => format!("{} {}", self.id, description),
            None => self.id.clone(),
        }
    }
}

/// One row of the metadata table.
///
/// `fields` keeps the table's column order so rows can be written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    /// Value of the configured key column
    pub key: String,

    /// Column name and value pairs in column order
    pub fields: Vec<(String, String)>,
}

impl MetadataRow {
    /// Look up the value of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Values in column order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }
}

/// A sequence record paired with the metadata row sharing its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub sequence: SequenceRecord,
    pub metadata: MetadataRow,
}

impl JoinedRecord {
    /// The join key, which is also the sequence identifier
    pub fn id(&self) -> &str {
        &self.sequence.id
    }
}

// ============================================================================
// Batches
// ============================================================================

/// Identity of a batch: its planner index plus the correction round.
///
/// Revision 0 is the batch written by the planner; each pass of the error
/// reviser derives revision `n + 1` from revision `n`. Rendered as `"7"` or
/// `"7r2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId {
    pub index: usize,
    pub revision: u32,
}

impl BatchId {
    pub fn new(index: usize) -> Self {
        Self { index, revision: 0 }
    }

    /// The id of the correction batch derived from this one
    pub fn next_revision(self) -> Self {
        Self {
            index: self.index,
            revision: self.revision + 1,
        }
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision == 0 {
            write!(f, "{}", self.index)
        } else {
            write!(f, "{}r{}", self.index, self.revision)
        }
    }
}

impl FromStr for BatchId {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || CommonError::InvalidBatchLabel(s.to_string());
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        let (index, revision) = match s.split_once('r') {
            Some((index, revision)) => (index, Some(revision)),
            None => (s, None),
        };

        if !all_digits(index) {
            return Err(invalid());
        }
        let index = index.parse().map_err(|_| invalid())?;

        let revision = match revision {
            Some(rev) if all_digits(rev) => rev.parse().map_err(|_| invalid())?,
            Some(_) => return Err(invalid()),
            None => 0,
        };

        Ok(Self { index, revision })
    }
}

/// Lifecycle of a batch against the submission endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Planned in memory, files not yet written
    Unsubmitted,
    /// Files written with the queued marker
    Queued,
    /// Accepted by the endpoint and not yet settled
    Processing,
    /// Every record accepted
    Success,
    /// Some records rejected; a correction batch exists or is due
    PartialError,
    /// Rejected for a reason that applies to every batch
    FatalError,
}

impl BatchStatus {
    /// Whether the endpoint has given its final word on the batch
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Success | BatchStatus::PartialError | BatchStatus::FatalError
        )
    }

    /// Whether a run may submit a batch in this state
    pub fn is_submittable(self) -> bool {
        matches!(self, BatchStatus::Unsubmitted | BatchStatus::Queued)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchStatus::Unsubmitted => "unsubmitted",
            BatchStatus::Queued => "queued",
            BatchStatus::Processing => "processing",
            BatchStatus::Success => "success",
            BatchStatus::PartialError => "partial_error",
            BatchStatus::FatalError => "fatal_error",
        };
        f.write_str(label)
    }
}

impl FromStr for BatchStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unsubmitted" => Ok(BatchStatus::Unsubmitted),
            "queued" => Ok(BatchStatus::Queued),
            "processing" => Ok(BatchStatus::Processing),
            "success" => Ok(BatchStatus::Success),
            "partial_error" => Ok(BatchStatus::PartialError),
            "fatal_error" => Ok(BatchStatus::FatalError),
            _ => Err(CommonError::InvalidStatus(s.to_string())),
        }
    }
}

/// A per-record problem reported by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub record_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub message: String,
}

impl ErrorEntry {
    pub fn new(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} \"{}\": {}", self.record_id, field, self.message),
            None => write!(f, "{}: {}", self.record_id, self.message),
        }
    }
}

/// An ordered group of joined records tracked through submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: BatchId,
    pub records: Vec<JoinedRecord>,
    pub status: BatchStatus,
    pub error_entries: Vec<ErrorEntry>,
}

impl Batch {
    pub fn new(id: BatchId, records: Vec<JoinedRecord>) -> Self {
        Self {
            id,
            records,
            status: BatchStatus::Unsubmitted,
            error_entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find a record by its identifier
    pub fn record(&self, id: &str) -> Option<&JoinedRecord> {
        self.records.iter().find(|record| record.id() == id)
    }
}
