//! FASTA sequence index
//!
//! Reads a FASTA file into an ordered, identifier-unique collection of
//! [`SequenceRecord`]s, and writes records back out.

use crate::error::{IngestError, Result};
use bio::io::fasta;
use seqbatch_common::types::SequenceRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Sequence records in file order, addressable by identifier
#[derive(Debug, Default)]
pub struct SequenceIndex {
    records: Vec<SequenceRecord>,
    positions: HashMap<String, usize>,
}

impl SequenceIndex {
    /// Parse a FASTA file from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Parse FASTA text from any reader
    ///
    /// Records are numbered from 1 in error messages; `source_name` only
    /// appears there too.
    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut index = Self::default();

        for (i, record) in fasta::Reader::new(reader).records().enumerate() {
            let number = i + 1;
            let record = record.map_err(|e| IngestError::sequence(source_name, number, e.to_string()))?;
            index.push(record, source_name, number)?;
        }

        Ok(index)
    }

    fn push(&mut self, record: fasta::Record, source_name: &str, number: usize) -> Result<()> {
        record
            .check()
            .map_err(|reason| IngestError::sequence(source_name, number, reason))?;

        let sequence: String = String::from_utf8_lossy(record.seq())
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if sequence.is_empty() {
            return Err(IngestError::sequence(
                source_name,
                number,
                format!("record '{}' has no sequence lines", record.id()),
            ));
        }

        if self.positions.contains_key(record.id()) {
            return Err(IngestError::DuplicateRecord {
                source_name: source_name.to_string(),
                id: record.id().to_string(),
                record: number,
            });
        }

        let parsed = SequenceRecord {
            id: record.id().to_string(),
            description: record
                .desc()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            sequence,
        };

        self.positions.insert(parsed.id.clone(), self.records.len());
        self.records.push(parsed);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SequenceRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Records in file order
    pub fn iter(&self) -> impl Iterator<Item = &SequenceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<SequenceRecord> {
        self.records
    }
}

/// Write records as FASTA, one sequence line per record
pub fn write_records<'a, W, I>(writer: W, records: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a SequenceRecord>,
{
    let mut writer = fasta::Writer::new(writer);
    for record in records {
        writer.write(
            &record.id,
            record.description.as_deref(),
            record.sequence.as_bytes(),
        )?;
    }
    writer.flush()
}
