//! Batch ledger
//!
//! The output directory is the durable state store. [`BatchLedger::scan`]
//! turns a directory listing into batch id -> (status, file pair), and every
//! state change goes back to disk as a rename of both files.

use crate::error::{IngestError, Result};
use crate::metadata::TableFormat;
use crate::naming::{BatchFileName, BatchMarker, FileKind, OutputPrefix};
use seqbatch_common::types::{BatchId, BatchStatus};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// One batch as found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: BatchId,
    pub marker: BatchMarker,
    pub format: TableFormat,
    pub sequence_path: PathBuf,
    pub table_path: PathBuf,
}

impl LedgerEntry {
    pub fn status(&self) -> BatchStatus {
        self.marker.status()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.marker.job_id()
    }
}

/// Batch state for one output prefix, ordered by batch id
#[derive(Debug, Clone)]
pub struct BatchLedger {
    prefix: OutputPrefix,
    entries: BTreeMap<BatchId, LedgerEntry>,
}

#[derive(Default)]
struct Halves {
    sequence: Vec<(BatchMarker, PathBuf)>,
    table: Vec<(BatchMarker, TableFormat, PathBuf)>,
}

impl BatchLedger {
    /// An empty ledger, as if the output directory held no batches
    pub fn empty(prefix: OutputPrefix) -> Self {
        Self {
            prefix,
            entries: BTreeMap::new(),
        }
    }

    /// Rebuild the ledger from the output directory
    ///
    /// Fails when a batch's two files disagree on their marker or one half is
    /// missing, since the batch's state would be ambiguous.
    pub fn scan(prefix: &OutputPrefix) -> Result<Self> {
        let mut ledger = Self::empty(prefix.clone());
        let dir = prefix.dir();

        if !dir.exists() {
            return Ok(ledger);
        }

        let mut found: BTreeMap<BatchId, Halves> = BTreeMap::new();
        for entry in fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))? {
            let entry = entry.map_err(|e| IngestError::io(dir, e))?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(name) = BatchFileName::parse(prefix, &file_name) else {
                if prefix.owns(&file_name) {
                    debug!(file = %file_name, "Skipping non-batch file");
                }
                continue;
            };

            let halves = found.entry(name.id).or_default();
            match name.kind {
                FileKind::Sequence => halves.sequence.push((name.marker, entry.path())),
                FileKind::Table(format) => halves.table.push((name.marker, format, entry.path())),
            }
        }

        for (id, mut halves) in found {
            if halves.sequence.len() != 1 || halves.table.len() != 1 {
                return Err(IngestError::batch_layout(
                    id,
                    format!(
                        "expected one sequence and one table file, found {} and {}",
                        halves.sequence.len(),
                        halves.table.len()
                    ),
                ));
            }

            let (marker, sequence_path) = halves.sequence.remove(0);
            let (table_marker, format, table_path) = halves.table.remove(0);
            if marker != table_marker {
                return Err(IngestError::batch_layout(
                    id,
                    format!("sequence file is '{}' but table file is '{}'", marker, table_marker),
                ));
            }

            ledger.entries.insert(
                id,
                LedgerEntry {
                    id,
                    marker,
                    format,
                    sequence_path,
                    table_path,
                },
            );
        }

        debug!(batches = ledger.entries.len(), dir = %dir.display(), "Scanned batch ledger");
        Ok(ledger)
    }

    pub fn prefix(&self) -> &OutputPrefix {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: BatchId) -> Option<&LedgerEntry> {
        self.entries.get(&id)
    }

    /// All batches in id order
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Whether any revision of a planner index exists
    pub fn has_index(&self, index: usize) -> bool {
        self.entries.keys().any(|id| id.index == index)
    }

    /// Batches a run may submit, in id order, optionally limited to one
    /// planner index
    pub fn submittable(&self, only: Option<usize>) -> Vec<LedgerEntry> {
        self.select(only, |status| status.is_submittable())
    }

    /// Batches a run still has to drive: queued ones to submit and
    /// submitted ones whose job has not settled yet
    pub fn pending(&self, only: Option<usize>) -> Vec<LedgerEntry> {
        self.select(only, |status| !status.is_terminal())
    }

    fn select(&self, only: Option<usize>, keep: impl Fn(BatchStatus) -> bool) -> Vec<LedgerEntry> {
        self.entries
            .values()
            .filter(|entry| keep(entry.status()))
            .filter(|entry| only.is_none_or(|index| entry.id.index == index))
            .cloned()
            .collect()
    }

    /// The id a new correction of `id` should receive
    pub fn next_revision(&self, id: BatchId) -> BatchId {
        let latest = self
            .entries
            .keys()
            .filter(|other| other.index == id.index)
            .map(|other| other.revision)
            .max()
            .unwrap_or(id.revision);

        BatchId {
            index: id.index,
            revision: latest.max(id.revision) + 1,
        }
    }

    /// Record a batch whose files were just written
    pub fn insert(&mut self, entry: LedgerEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Move a batch to a new marker by renaming both of its files
    ///
    /// File contents are never touched. If the second rename fails the first
    /// is undone so both halves keep agreeing.
    pub fn settle(&mut self, id: BatchId, marker: BatchMarker) -> Result<&LedgerEntry> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| IngestError::batch_layout(id, "batch is not in the ledger"))?;

        let table_target = self
            .prefix
            .batch_path(id, &marker, FileKind::Table(entry.format));
        let sequence_target = self.prefix.batch_path(id, &marker, FileKind::Sequence);

        fs::rename(&entry.table_path, &table_target)
            .map_err(|e| IngestError::io(&entry.table_path, e))?;

        if let Err(e) = fs::rename(&entry.sequence_path, &sequence_target) {
            if let Err(undo) = fs::rename(&table_target, &entry.table_path) {
                warn!(error = %undo, file = %table_target.display(), "Failed to restore table file name");
            }
            return Err(IngestError::io(&entry.sequence_path, e));
        }

        info!(batch = %id, from = %entry.marker, to = %marker, "Batch renamed");
        entry.marker = marker;
        entry.table_path = table_target;
        entry.sequence_path = sequence_target;
        Ok(entry)
    }
}

/// Delete every file seqbatch wrote for the prefix: batches, journal and
/// reports
///
/// Files of a longer prefix sharing the stem (`run.v2.*` for `run`) are
/// left alone. Returns the number of files removed.
pub fn reset(prefix: &OutputPrefix) -> Result<usize> {
    let dir = prefix.dir();
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))? {
        let entry = entry.map_err(|e| IngestError::io(dir, e))?;
        let owned = entry
            .file_name()
            .to_str()
            .is_some_and(|name| prefix.manages(name));
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);

        if owned && is_file {
            fs::remove_file(entry.path()).map_err(|e| IngestError::io(entry.path(), e))?;
            removed += 1;
        }
    }

    info!(removed, prefix = %prefix.stem(), "Reset output files");
    Ok(removed)
}
