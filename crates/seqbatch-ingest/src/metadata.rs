//! Tabular metadata index
//!
//! Reads a comma- or tab-delimited sample table into rows keyed by the
//! configured key column, validating the header once up front.

use crate::error::{IngestError, Result};
use seqbatch_common::types::MetadataRow;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Delimiter flavour of a metadata table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    Csv,
    Tsv,
}

impl TableFormat {
    pub fn delimiter(self) -> u8 {
        match self {
            TableFormat::Csv => b',',
            TableFormat::Tsv => b'\t',
        }
    }

    /// File extension used for batch files of this format
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Tsv => "tsv",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(TableFormat::Csv),
            "tsv" | "tab" | "txt" => Some(TableFormat::Tsv),
            _ => None,
        }
    }

    fn reader<R: Read>(self, reader: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter())
            .has_headers(true)
            .flexible(false)
            .from_reader(reader)
    }
}

/// Metadata rows in file order, addressable by key value
#[derive(Debug)]
pub struct MetadataIndex {
    format: TableFormat,
    key_field: String,
    columns: Vec<String>,
    rows: Vec<MetadataRow>,
    positions: HashMap<String, usize>,
}

impl MetadataIndex {
    /// Parse a metadata table from disk
    pub fn from_path(path: impl AsRef<Path>, format: TableFormat, key_field: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
        Self::from_reader(file, format, key_field, &path.display().to_string())
    }

    /// Parse a metadata table from any reader
    ///
    /// Fails if the header lacks `key_field` or repeats a column name, if a
    /// row is ragged, or if a key value is empty or repeated.
    pub fn from_reader<R: Read>(
        reader: R,
        format: TableFormat,
        key_field: &str,
        source_name: &str,
    ) -> Result<Self> {
        let mut reader = format.reader(reader);
        let columns = read_header(&mut reader, source_name)?;

        let key_pos = columns
            .iter()
            .position(|c| c == key_field)
            .ok_or_else(|| IngestError::MissingColumn {
                source_name: source_name.to_string(),
                column: key_field.to_string(),
                available: columns.clone(),
            })?;

        let mut rows = Vec::new();
        let mut positions = HashMap::new();

        for record in reader.records() {
            let record = record.map_err(|e| csv_parse_error(source_name, e))?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            let key = record.get(key_pos).unwrap_or_default().trim().to_string();
            if key.is_empty() {
                return Err(IngestError::parse(
                    source_name,
                    line,
                    format!("empty value in key column '{}'", key_field),
                ));
            }

            if positions.contains_key(&key) {
                return Err(IngestError::DuplicateKey {
                    source_name: source_name.to_string(),
                    key,
                    line,
                });
            }

            let fields = columns
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();

            positions.insert(key.clone(), rows.len());
            rows.push(MetadataRow { key, fields });
        }

        Ok(Self {
            format,
            key_field: key_field.to_string(),
            columns,
            rows,
            positions,
        })
    }

    pub fn get(&self, key: &str) -> Option<&MetadataRow> {
        self.positions.get(key).map(|&pos| &self.rows[pos])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Rows in file order
    pub fn iter(&self) -> impl Iterator<Item = &MetadataRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header in original column order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }
}

/// A table read back positionally, without a key column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read a batch table back in row order
///
/// Batch tables are written by this crate, so rows are paired with
/// sequences by position rather than by key.
pub fn read_table(path: impl AsRef<Path>, format: TableFormat) -> Result<RawTable> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let mut reader = format.reader(file);

    let columns = read_header(&mut reader, &source_name)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_parse_error(&source_name, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { columns, rows })
}

/// Write a header and rows in the given format
pub fn write_rows<'a, W, I>(writer: W, format: TableFormat, columns: &[String], rows: I) -> csv::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a MetadataRow>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(writer);

    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row.values())?;
    }
    writer.flush()?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut csv::Reader<R>, source_name: &str) -> Result<Vec<String>> {
    let header = reader
        .headers()
        .map_err(|e| csv_parse_error(source_name, e))?;
    let columns: Vec<String> = header.iter().map(str::to_string).collect();

    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(IngestError::parse(source_name, 1, "missing header row"));
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(IngestError::parse(
                source_name,
                1,
                format!("column '{}' appears more than once in the header", column),
            ));
        }
    }

    Ok(columns)
}

fn csv_parse_error(source_name: &str, err: csv::Error) -> IngestError {
    let line = err.position().map(|p| p.line()).unwrap_or_default();
    IngestError::parse(source_name, line, err.to_string())
}
