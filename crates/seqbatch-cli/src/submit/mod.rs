//! Batch submission
//!
//! A [`SubmissionEndpoint`] is anything that accepts a batch and later
//! reports how it went. The [`machine`] module decides what each observation
//! means for the batch; the [`driver`] walks the ledger and applies those
//! decisions to the files on disk.

pub mod driver;
pub mod machine;

use crate::error::Result;
use async_trait::async_trait;
use seqbatch_common::types::{Batch, ErrorEntry};
use seqbatch_ingest::metadata::TableFormat;
use std::collections::HashMap;
use std::path::PathBuf;

pub use driver::{BatchReport, RunSummary, SubmitOptions, Submitter};

/// Job id recorded for a batch the endpoint refused before creating a job
pub const REJECTED_JOB_ID: &str = "rejected";

/// A queued batch ready to send
#[derive(Debug, Clone)]
pub struct BatchPayload {
    pub batch: Batch,
    pub columns: Vec<String>,
    pub format: TableFormat,
    pub sequence_path: PathBuf,
    pub table_path: PathBuf,
}

/// Handle to a job accepted by the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,

    /// Number of records sent with the job
    pub record_count: usize,

    /// Endpoint-side sample names mapped back to record ids
    pub aliases: HashMap<String, String>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, record_count: usize) -> Self {
        Self {
            job_id: job_id.into(),
            record_count,
            aliases: HashMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Record id for a name the endpoint reported
    pub fn resolve(&self, reported: &str) -> String {
        self.aliases
            .get(reported)
            .cloned()
            .unwrap_or_else(|| reported.to_string())
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// Every record was accepted
    Success,

    /// Some records were refused; each entry names one of them
    PartialError(Vec<ErrorEntry>),

    /// The whole batch was refused for a reason that will recur
    FatalError(String),
}

/// Answer to a submission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// A job was created and must be polled
    Accepted(JobHandle),

    /// The endpoint decided the outcome without creating a job
    Rejected(TerminalOutcome),
}

/// Answer to a status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Queued,
    Processing,
    Terminal(TerminalOutcome),
}

/// A remote service that takes batches
///
/// `Err` from either method means the endpoint could not be reached or gave
/// an answer that could not be understood; the batch is left as it was.
#[async_trait]
pub trait SubmissionEndpoint: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn submit(&self, payload: &BatchPayload) -> Result<SubmitResponse>;

    /// Rebuild the handle of a job submitted by an earlier run
    fn resume(&self, job_id: &str, payload: &BatchPayload) -> JobHandle {
        JobHandle::new(job_id, payload.batch.len())
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<PollStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_handle_resolves_aliases() {
        let mut aliases = HashMap::new();
        aliases.insert("QC-001".to_string(), "hCoV-19/1".to_string());
        let handle = JobHandle::new("J1", 2).with_aliases(aliases);

        assert_eq!(handle.resolve("QC-001"), "hCoV-19/1");
        assert_eq!(handle.resolve("hCoV-19/2"), "hCoV-19/2");
    }
}
