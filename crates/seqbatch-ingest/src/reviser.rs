//! Error reviser
//!
//! Turns a batch's per-record error report into a new queued correction
//! batch. When the endpoint processed the batch, the correction holds only
//! the offending records; when it refused the batch outright, it holds every
//! record so none is left behind. The failed batch's files are left as they
//! are.

use crate::error::Result;
use crate::ledger::{BatchLedger, LedgerEntry};
use crate::store::{self, StoredBatch};
use seqbatch_common::types::{Batch, BatchId, BatchStatus, ErrorEntry};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Which records a correction batch carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Records named by an error entry; the others were accepted
    Offending,

    /// Every record of the failed batch; none of them were accepted
    Whole,
}

/// In-memory correction batch derived from an error report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    /// Selected records in their original batch order
    pub batch: Batch,

    /// Entries that matched a record of the failed batch
    pub applied: Vec<ErrorEntry>,

    /// Entries naming a record the failed batch does not contain
    pub anomalies: Vec<ErrorEntry>,
}

/// A correction batch written to disk
#[derive(Debug, Clone)]
pub struct Revision {
    pub batch: Batch,
    pub entry: LedgerEntry,
    pub applied: Vec<ErrorEntry>,
    pub anomalies: Vec<ErrorEntry>,

    /// Side file listing what needs correcting
    pub notes_path: PathBuf,
}

/// Select the records of `failed` that need to go out again
///
/// Several entries may name the same record; it is included once.
pub fn derive(failed: &Batch, new_id: BatchId, errors: &[ErrorEntry], scope: Scope) -> Derived {
    let mut applied = Vec::new();
    let mut anomalies = Vec::new();
    let mut wanted = HashSet::new();

    for entry in errors {
        if failed.record(&entry.record_id).is_some() {
            wanted.insert(entry.record_id.as_str());
            applied.push(entry.clone());
        } else {
            anomalies.push(entry.clone());
        }
    }

    let records = failed
        .records
        .iter()
        .filter(|record| scope == Scope::Whole || wanted.contains(record.id()))
        .cloned()
        .collect();

    let mut batch = Batch::new(new_id, records);
    batch.error_entries = applied.clone();

    Derived {
        batch,
        applied,
        anomalies,
    }
}

/// Write a correction batch for `failed` and add it to the ledger
///
/// Returns `None` when nothing was selected, which with [`Scope::Offending`]
/// means no entry matched a record of the batch. Unmatched entries are
/// logged as anomalies and skipped.
pub fn revise(
    ledger: &mut BatchLedger,
    failed: &StoredBatch,
    errors: &[ErrorEntry],
    scope: Scope,
) -> Result<Option<Revision>> {
    let new_id = ledger.next_revision(failed.batch.id);
    let Derived {
        mut batch,
        applied,
        anomalies,
    } = derive(&failed.batch, new_id, errors, scope);

    for anomaly in &anomalies {
        warn!(
            batch = %failed.batch.id,
            record = %anomaly.record_id,
            message = %anomaly.message,
            "Error report names a record that is not in the batch"
        );
    }

    if batch.is_empty() {
        warn!(batch = %failed.batch.id, "No correctable records in error report");
        return Ok(None);
    }

    let prefix = ledger.prefix().clone();
    let entry = store::write_queued(&prefix, &batch, &failed.columns, failed.format)?;

    let notes_path = store::write_report(
        &prefix.errors_path(new_id),
        &["record_id", "field", "message"],
        applied.iter().map(|e| {
            vec![
                e.record_id.clone(),
                e.field.clone().unwrap_or_default(),
                e.message.clone(),
            ]
        }),
    )?;

    batch.status = BatchStatus::Queued;
    ledger.insert(entry.clone());

    info!(
        from = %failed.batch.id,
        to = %new_id,
        records = batch.len(),
        ?scope,
        "Wrote correction batch"
    );

    Ok(Some(Revision {
        batch,
        entry,
        applied,
        anomalies,
        notes_path,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metadata::TableFormat;
    use crate::naming::{BatchMarker, OutputPrefix};
    use seqbatch_common::types::{JoinedRecord, MetadataRow, SequenceRecord};
    use std::fs;
    use tempfile::TempDir;

    fn batch_of(n: usize) -> Batch {
        let records = (1..=n)
            .map(|i| {
                let id = format!("r{i}");
                JoinedRecord {
                    sequence: SequenceRecord::new(&id, "ACGT"),
                    metadata: MetadataRow {
                        key: id.clone(),
                        fields: vec![("sample".to_string(), id), ("host".to_string(), String::new())],
                    },
                }
            })
            .collect();
        Batch::new(BatchId::new(0), records)
    }

    #[test]
    fn test_derive_selects_offending_records() {
        let failed = batch_of(10);
        let errors = vec![
            ErrorEntry::new("r7", "NOT_ALLOWED_TO_BE_EMPTY").with_field("host"),
            ErrorEntry::new("r3", "INVALID_DATE").with_field("collection date"),
            ErrorEntry::new("r3", "NOT_ALLOWED_TO_BE_EMPTY").with_field("host"),
            ErrorEntry::new("ghost", "UNKNOWN"),
        ];

        let derived = derive(&failed, BatchId::new(0).next_revision(), &errors, Scope::Offending);
        let ids: Vec<&str> = derived.batch.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["r3", "r7"]);
        assert_eq!(derived.batch.id.to_string(), "0r1");
        assert_eq!(derived.applied.len(), 3);
        assert_eq!(derived.anomalies, vec![ErrorEntry::new("ghost", "UNKNOWN")]);
    }

    #[test]
    fn test_revise_writes_new_pair_and_keeps_original() {
        let dir = TempDir::new().unwrap();
        let prefix = OutputPrefix::new(dir.path().join("output")).unwrap();
        let columns = vec!["sample".to_string(), "host".to_string()];

        let original = batch_of(10);
        let written = store::write_queued(&prefix, &original, &columns, TableFormat::Tsv).unwrap();
        let mut ledger = BatchLedger::scan(&prefix).unwrap();
        ledger
            .settle(original.id, BatchMarker::partial_error("J1"))
            .unwrap();
        let settled = ledger.get(original.id).unwrap().clone();
        let before = fs::read(&settled.table_path).unwrap();
        assert_ne!(settled.table_path, written.table_path);

        let failed = store::load(&settled).unwrap();
        let errors = vec![
            ErrorEntry::new("r3", "NOT_ALLOWED_TO_BE_EMPTY").with_field("host"),
            ErrorEntry::new("r7", "NOT_ALLOWED_TO_BE_EMPTY").with_field("host"),
        ];

        let revision = revise(&mut ledger, &failed, &errors, Scope::Offending)
            .unwrap()
            .unwrap();
        let ids: Vec<&str> = revision.batch.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["r3", "r7"]);
        assert_eq!(revision.batch.status, BatchStatus::Queued);
        assert!(revision.entry.sequence_path.ends_with("output.0r1.queued.fasta"));

        let notes = fs::read_to_string(&revision.notes_path).unwrap();
        assert!(notes.starts_with("record_id\tfield\tmessage\n"));
        assert!(notes.contains("r3\thost\tNOT_ALLOWED_TO_BE_EMPTY"));

        assert_eq!(fs::read(&settled.table_path).unwrap(), before);

        let rescanned = BatchLedger::scan(&prefix).unwrap();
        assert_eq!(rescanned.get(original.id).unwrap().status(), BatchStatus::PartialError);
        let reloaded = store::load(rescanned.get(revision.batch.id).unwrap()).unwrap();
        assert_eq!(reloaded.batch.records, revision.batch.records);
    }

    #[test]
    fn test_revise_with_only_anomalies_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let prefix = OutputPrefix::new(dir.path().join("output")).unwrap();
        let mut ledger = BatchLedger::empty(prefix);
        let failed = StoredBatch {
            batch: batch_of(2),
            columns: vec!["sample".to_string(), "host".to_string()],
            format: TableFormat::Csv,
        };

        let revision = revise(&mut ledger, &failed, &[ErrorEntry::new("r9", "?")], Scope::Offending).unwrap();
        assert!(revision.is_none());
        assert!(ledger.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_whole_scope_keeps_every_record() {
        let failed = batch_of(4);
        let errors = vec![
            ErrorEntry::new("r2", "INVALID_DATE").with_field("collection date"),
            ErrorEntry::new("row 9", "UNKNOWN"),
        ];

        let derived = derive(&failed, BatchId::new(0).next_revision(), &errors, Scope::Whole);
        assert_eq!(derived.batch.records, failed.records);
        assert_eq!(derived.applied.len(), 1);
        assert_eq!(derived.anomalies.len(), 1);
    }

    #[test]
    fn test_whole_scope_writes_batch_even_without_matches() {
        let dir = TempDir::new().unwrap();
        let prefix = OutputPrefix::new(dir.path().join("output")).unwrap();
        let mut ledger = BatchLedger::empty(prefix);
        let failed = StoredBatch {
            batch: batch_of(3),
            columns: vec!["sample".to_string(), "host".to_string()],
            format: TableFormat::Csv,
        };

        let revision = revise(&mut ledger, &failed, &[ErrorEntry::new("r9", "?")], Scope::Whole)
            .unwrap()
            .unwrap();
        assert_eq!(revision.batch.len(), 3);
        assert_eq!(ledger.submittable(None).len(), 1);

        let notes = fs::read_to_string(&revision.notes_path).unwrap();
        assert_eq!(notes, "record_id\tfield\tmessage\n");
    }
}
