//! Run journal (`<stem>.journal.json`)
//!
//! Records what happened to each batch across runs: job ids, timestamps and
//! the error entries an endpoint reported. The file names in the output
//! directory stay the source of truth; the journal is for people.

use crate::error::Result;
use chrono::{DateTime, Utc};
use seqbatch_common::types::{BatchId, BatchStatus, ErrorEntry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

const JOURNAL_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journal {
    pub journal_version: u32,

    /// Last time any entry changed
    pub updated: DateTime<Utc>,

    #[serde(default)]
    pub batches: Vec<JournalEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub batch: BatchId,
    pub status: BatchStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Why the last attempt stopped, for fatal and transport failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,

    /// Correction batch derived from this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_as: Option<BatchId>,
}

impl JournalEntry {
    fn new(batch: BatchId) -> Self {
        Self {
            batch,
            status: BatchStatus::Queued,
            job_id: None,
            submitted_at: None,
            finished_at: None,
            message: None,
            errors: Vec::new(),
            revised_as: None,
        }
    }
}

impl Journal {
    pub fn new() -> Self {
        Self {
            journal_version: JOURNAL_VERSION,
            updated: Utc::now(),
            batches: Vec::new(),
        }
    }

    /// Load journal from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let journal: Journal = serde_json::from_str(&content)?;
        Ok(journal)
    }

    /// Load the journal, starting fresh when it is missing or unreadable
    pub fn load_or_new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::new();
        }
        match Self::load(path) {
            Ok(journal) => journal,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable journal");
                Self::new()
            }
        }
    }

    /// Save journal to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, batch: BatchId) -> Option<&JournalEntry> {
        self.batches.iter().find(|e| e.batch == batch)
    }

    fn entry_mut(&mut self, batch: BatchId) -> &mut JournalEntry {
        self.updated = Utc::now();
        match self.batches.iter().position(|e| e.batch == batch) {
            Some(i) => &mut self.batches[i],
            None => {
                self.batches.push(JournalEntry::new(batch));
                self.batches.sort_by_key(|e| e.batch);
                let i = self
                    .batches
                    .iter()
                    .position(|e| e.batch == batch)
                    .unwrap_or(self.batches.len() - 1);
                &mut self.batches[i]
            }
        }
    }

    /// A job was created for the batch
    pub fn submitted(&mut self, batch: BatchId, job_id: &str) {
        let entry = self.entry_mut(batch);
        entry.status = BatchStatus::Processing;
        entry.job_id = Some(job_id.to_string());
        entry.submitted_at = Some(Utc::now());
        entry.finished_at = None;
        entry.message = None;
        entry.errors.clear();
    }

    /// The batch reached a terminal state
    pub fn finished(&mut self, batch: BatchId, status: BatchStatus, errors: &[ErrorEntry], message: Option<String>) {
        let entry = self.entry_mut(batch);
        entry.status = status;
        entry.finished_at = Some(Utc::now());
        entry.errors = errors.to_vec();
        entry.message = message;
    }

    /// The attempt stopped before any outcome was known
    ///
    /// `status` is where the batch was left: queued when the submission
    /// itself failed, processing when its job was being polled.
    pub fn interrupted(&mut self, batch: BatchId, status: BatchStatus, message: String) {
        let entry = self.entry_mut(batch);
        entry.status = status;
        entry.message = Some(message);
    }

    /// Raw job id recorded for the batch, if any
    pub fn job_id(&self, batch: BatchId) -> Option<&str> {
        self.get(batch).and_then(|e| e.job_id.as_deref())
    }

    pub fn revised(&mut self, batch: BatchId, revision: BatchId) {
        self.entry_mut(batch).revised_as = Some(revision);
        self.entry_mut(revision);
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_journal_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.journal.json");

        let mut journal = Journal::new();
        journal.submitted(BatchId::new(1), "J9");
        journal.submitted(BatchId::new(0), "J8");
        journal.finished(
            BatchId::new(0),
            BatchStatus::PartialError,
            &[ErrorEntry::new("r3", "bad").with_field("host")],
            None,
        );
        journal.revised(BatchId::new(0), BatchId::new(0).next_revision());
        journal.save(&path).unwrap();

        let loaded = Journal::load(&path).unwrap();
        assert_eq!(loaded, journal);

        let order: Vec<String> = loaded.batches.iter().map(|e| e.batch.to_string()).collect();
        assert_eq!(order, vec!["0", "0r1", "1"]);

        let first = loaded.get(BatchId::new(0)).unwrap();
        assert_eq!(first.job_id.as_deref(), Some("J8"));
        assert_eq!(first.errors.len(), 1);
        assert_eq!(first.revised_as, Some(BatchId::new(0).next_revision()));
    }

    #[test]
    fn test_unreadable_journal_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.journal.json");
        std::fs::write(&path, "{ not json").unwrap();

        let journal = Journal::load_or_new(&path);
        assert!(journal.batches.is_empty());
    }

    #[test]
    fn test_resubmission_clears_previous_attempt() {
        let mut journal = Journal::new();
        let id = BatchId::new(2);
        journal.interrupted(id, BatchStatus::Queued, "timed out".to_string());
        journal.submitted(id, "J1");

        let entry = journal.get(id).unwrap();
        assert!(entry.message.is_none());
        assert_eq!(entry.status, BatchStatus::Processing);
        assert_eq!(journal.job_id(id), Some("J1"));
    }

    #[test]
    fn test_interrupted_poll_keeps_job() {
        let mut journal = Journal::new();
        let id = BatchId::new(0);
        journal.submitted(id, "J/1");
        journal.interrupted(id, BatchStatus::Processing, "connection reset".to_string());

        let entry = journal.get(id).unwrap();
        assert_eq!(entry.status, BatchStatus::Processing);
        assert_eq!(entry.job_id.as_deref(), Some("J/1"));
        assert_eq!(entry.message.as_deref(), Some("connection reset"));
    }
}
