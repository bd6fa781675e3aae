//! Batch planner
//!
//! Joins the sequence and metadata indexes on the key, cuts the joined
//! records into fixed-size batches in sequence-file order, and writes each
//! batch that does not already exist on disk as a queued file pair.

use crate::error::{IngestError, Result};
use crate::fasta::SequenceIndex;
use crate::ledger::{self, BatchLedger};
use crate::metadata::MetadataIndex;
use crate::naming::OutputPrefix;
use crate::store;
use seqbatch_common::types::{Batch, BatchId, BatchStatus, JoinedRecord};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Records per batch when none is given
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Planner settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub batch_size: usize,

    /// Discard every existing file of the prefix and regenerate
    pub reset: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            reset: false,
        }
    }
}

/// Identifiers present in only one of the two inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmatchedReport {
    /// Sequence ids with no metadata row, in sequence-file order
    pub sequences: Vec<String>,

    /// Metadata keys with no sequence, in table order
    pub metadata: Vec<String>,
}

impl UnmatchedReport {
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty() && self.metadata.is_empty()
    }

    pub fn total(&self) -> usize {
        self.sequences.len() + self.metadata.len()
    }

    fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        let sequences = self
            .sequences
            .iter()
            .map(|id| vec!["sequence".to_string(), id.clone()]);
        let metadata = self
            .metadata
            .iter()
            .map(|id| vec!["metadata".to_string(), id.clone()]);
        sequences.chain(metadata)
    }
}

/// Result of a planning pass
#[derive(Debug)]
pub struct PlanOutcome {
    /// Every batch of the current inputs, in index order
    pub batches: Vec<Batch>,

    /// Batches written by this pass
    pub written: Vec<BatchId>,

    /// Batches left alone because files for their index already existed
    pub skipped: Vec<BatchId>,

    pub unmatched: UnmatchedReport,

    /// Where the unmatched report was written, if this pass wrote one
    pub unmatched_path: Option<PathBuf>,

    /// Ledger after the pass
    pub ledger: BatchLedger,
}

/// Pair every sequence with the metadata row sharing its key
///
/// Joined records keep sequence-file order. Anything present on one side
/// only ends up in the report instead.
pub fn join(sequences: &SequenceIndex, metadata: &MetadataIndex) -> (Vec<JoinedRecord>, UnmatchedReport) {
    let mut joined = Vec::with_capacity(sequences.len().min(metadata.len()));
    let mut unmatched = UnmatchedReport::default();

    for sequence in sequences.iter() {
        match metadata.get(&sequence.id) {
            Some(row) => joined.push(JoinedRecord {
                sequence: sequence.clone(),
                metadata: row.clone(),
            }),
            None => unmatched.sequences.push(sequence.id.clone()),
        }
    }

    unmatched.metadata = metadata
        .iter()
        .filter(|row| !sequences.contains(&row.key))
        .map(|row| row.key.clone())
        .collect();

    (joined, unmatched)
}

/// Cut joined records into consecutive batches of at most `batch_size`
pub fn partition(records: Vec<JoinedRecord>, batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(IngestError::InvalidBatchSize(batch_size));
    }

    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut records = records.into_iter().peekable();

    while records.peek().is_some() {
        let chunk: Vec<JoinedRecord> = records.by_ref().take(batch_size).collect();
        batches.push(Batch::new(BatchId::new(batches.len()), chunk));
    }

    Ok(batches)
}

/// Plan and persist batches for the given inputs
///
/// Without `reset`, a batch whose index already has files under the prefix
/// (in any state) is skipped, so re-running after an interrupted run only
/// fills the gaps. With `reset`, every file seqbatch wrote for the prefix is
/// removed first.
/// If a write fails, the files written by this pass are removed again before
/// the error is returned.
pub fn plan(
    sequences: &SequenceIndex,
    metadata: &MetadataIndex,
    prefix: &OutputPrefix,
    options: PlanOptions,
) -> Result<PlanOutcome> {
    if options.batch_size == 0 {
        return Err(IngestError::InvalidBatchSize(options.batch_size));
    }

    if options.reset {
        let removed = ledger::reset(prefix)?;
        info!(removed, "Discarded existing batch files");
    }

    let mut ledger = BatchLedger::scan(prefix)?;
    let (joined, unmatched) = join(sequences, metadata);
    info!(
        sequences = sequences.len(),
        rows = metadata.len(),
        matched = joined.len(),
        unmatched = unmatched.total(),
        key = metadata.key_field(),
        "Joined inputs"
    );

    let mut batches = partition(joined, options.batch_size)?;
    let mut written = Vec::new();
    let mut skipped = Vec::new();

    for batch in &mut batches {
        if ledger.has_index(batch.id.index) {
            batch.status = ledger
                .get(batch.id)
                .map(|entry| entry.status())
                .unwrap_or(BatchStatus::Queued);
            debug!(batch = %batch.id, status = %batch.status, "Batch files exist, skipping");
            skipped.push(batch.id);
            continue;
        }

        match store::write_queued(prefix, batch, metadata.columns(), metadata.format()) {
            Ok(entry) => {
                info!(batch = %batch.id, records = batch.len(), "Wrote batch files");
                batch.status = BatchStatus::Queued;
                written.push(batch.id);
                ledger.insert(entry);
            },
            Err(e) => {
                roll_back(&ledger, &written);
                return Err(e);
            },
        }
    }

    if !skipped.is_empty() {
        info!(skipped = skipped.len(), "Kept existing batch files");
    }

    let unmatched_path = if written.is_empty() {
        None
    } else {
        let path = store::write_report(
            &prefix.unmatched_path(),
            &["source", "id"],
            unmatched.rows(),
        )?;
        Some(path)
    };

    if !unmatched.is_empty() {
        warn!(
            sequences = unmatched.sequences.len(),
            metadata = unmatched.metadata.len(),
            "Records without a counterpart were left out of batches"
        );
    }

    Ok(PlanOutcome {
        batches,
        written,
        skipped,
        unmatched,
        unmatched_path,
        ledger,
    })
}

fn roll_back(ledger: &BatchLedger, written: &[BatchId]) {
    for id in written {
        if let Some(entry) = ledger.get(*id) {
            for path in [&entry.sequence_path, &entry.table_path] {
                if let Err(e) = fs::remove_file(path) {
                    warn!(error = %e, file = %path.display(), "Failed to remove partial batch file");
                }
            }
        }
    }
}
