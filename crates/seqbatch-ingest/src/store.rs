//! Reading and writing batch file pairs

use crate::error::{IngestError, Result};
use crate::fasta::{self, SequenceIndex};
use crate::ledger::LedgerEntry;
use crate::metadata::{self, TableFormat};
use crate::naming::{BatchMarker, FileKind, OutputPrefix};
use seqbatch_common::types::{Batch, JoinedRecord, MetadataRow};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A batch read back from disk together with its table layout
#[derive(Debug, Clone)]
pub struct StoredBatch {
    pub batch: Batch,
    pub columns: Vec<String>,
    pub format: TableFormat,
}

/// Write a batch as a queued file pair
///
/// Both files are staged as temporaries in the output directory and only
/// renamed into place once both are complete, so an interrupted write never
/// leaves a half pair under a batch name.
pub fn write_queued(
    prefix: &OutputPrefix,
    batch: &Batch,
    columns: &[String],
    format: TableFormat,
) -> Result<LedgerEntry> {
    let dir = prefix.dir();
    fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;

    let marker = BatchMarker::Queued;
    let table_path = prefix.batch_path(batch.id, &marker, FileKind::Table(format));
    let sequence_path = prefix.batch_path(batch.id, &marker, FileKind::Sequence);

    let mut table_tmp = NamedTempFile::new_in(dir).map_err(|e| IngestError::io(dir, e))?;
    metadata::write_rows(
        BufWriter::new(table_tmp.as_file_mut()),
        format,
        columns,
        batch.records.iter().map(|r| &r.metadata),
    )
    .map_err(|e| IngestError::csv(&table_path, e))?;

    let mut sequence_tmp = NamedTempFile::new_in(dir).map_err(|e| IngestError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(sequence_tmp.as_file_mut());
        fasta::write_records(&mut writer, batch.records.iter().map(|r| &r.sequence))
            .map_err(|e| IngestError::io(&sequence_path, e))?;
    }

    table_tmp
        .persist(&table_path)
        .map_err(|e| IngestError::io(&table_path, e.error))?;
    if let Err(e) = sequence_tmp.persist(&sequence_path) {
        let _ = fs::remove_file(&table_path);
        return Err(IngestError::io(&sequence_path, e.error));
    }

    Ok(LedgerEntry {
        id: batch.id,
        marker,
        format,
        sequence_path,
        table_path,
    })
}

/// Load a batch's records from its file pair
///
/// Rows are paired with sequences by position, which is how
/// [`write_queued`] lays them out.
pub fn load(entry: &LedgerEntry) -> Result<StoredBatch> {
    let sequences = SequenceIndex::from_path(&entry.sequence_path)?;
    let table = metadata::read_table(&entry.table_path, entry.format)?;

    if sequences.len() != table.rows.len() {
        return Err(IngestError::batch_layout(
            entry.id,
            format!(
                "{} sequences but {} table rows",
                sequences.len(),
                table.rows.len()
            ),
        ));
    }

    let records = sequences
        .into_records()
        .into_iter()
        .zip(table.rows)
        .map(|(sequence, values)| JoinedRecord {
            metadata: MetadataRow {
                key: sequence.id.clone(),
                fields: table.columns.iter().cloned().zip(values).collect(),
            },
            sequence,
        })
        .collect();

    let mut batch = Batch::new(entry.id, records);
    batch.status = entry.status();

    Ok(StoredBatch {
        batch,
        columns: table.columns,
        format: entry.format,
    })
}

/// Write a tab-separated side file, staged like the batch files
pub(crate) fn write_report<I>(path: &Path, header: &[&str], rows: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| IngestError::io(dir, e))?;
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(tmp.as_file_mut());
        writer
            .write_record(header)
            .map_err(|e| IngestError::csv(path, e))?;
        for row in rows {
            writer
                .write_record(&row)
                .map_err(|e| IngestError::csv(path, e))?;
        }
        writer.flush().map_err(|e| IngestError::io(path, e))?;
    }
    tmp.as_file_mut()
        .flush()
        .map_err(|e| IngestError::io(path, e))?;

    tmp.persist(path).map_err(|e| IngestError::io(path, e.error))?;
    Ok(path.to_path_buf())
}
