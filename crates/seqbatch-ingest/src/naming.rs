//! Batch file naming
//!
//! Every batch file is named `<stem>.<label>.<marker>.<ext>` inside the
//! output directory, e.g. `output.3.queued.fasta`, `output.3r1.queued.tsv`
//! or `output.0.success-6f1c.fasta`. The marker carries the batch's state so a
//! fresh process can rebuild it from a directory listing: `queued` until the
//! endpoint accepts the batch, `submitted-<job>` while the job runs, then
//! `success-<job>` or `partial-<job>`.

use crate::error::{IngestError, Result};
use crate::metadata::TableFormat;
use seqbatch_common::types::{BatchId, BatchStatus};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SEQUENCE_EXTENSION: &str = "fasta";

const QUEUED: &str = "queued";
const SUBMITTED: &str = "submitted";
const SUCCESS: &str = "success";
const PARTIAL: &str = "partial";

const JOURNAL_FILE: &str = "journal.json";
const UNMATCHED_FILE: &str = "unmatched.tsv";
const ERRORS_SUFFIX: &str = ".errors.tsv";

/// Where batch files live and what they are called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPrefix {
    dir: PathBuf,
    stem: String,
}

impl OutputPrefix {
    /// Split a prefix such as `runs/output` into directory and file stem
    pub fn new(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let invalid = || IngestError::InvalidPrefix(prefix.display().to_string());

        let stem = prefix
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty() && !name.starts_with('.'))
            .ok_or_else(invalid)?
            .to_string();

        let dir = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self { dir, stem })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Whether a file name sits in this prefix's `<stem>.` namespace
    pub fn owns(&self, file_name: &str) -> bool {
        self.rest(file_name).is_some()
    }

    /// Whether a file is one seqbatch writes for this prefix
    ///
    /// Stricter than [`owns`](Self::owns): `run.v2.0.queued.fasta` is in the
    /// namespace of prefix `run` but belongs to prefix `run.v2`.
    pub fn manages(&self, file_name: &str) -> bool {
        if BatchFileName::parse(self, file_name).is_some() {
            return true;
        }
        match self.rest(file_name) {
            Some(JOURNAL_FILE | UNMATCHED_FILE) => true,
            Some(rest) => rest
                .strip_suffix(ERRORS_SUFFIX)
                .is_some_and(|label| label.parse::<BatchId>().is_ok()),
            None => false,
        }
    }

    fn rest<'n>(&self, file_name: &'n str) -> Option<&'n str> {
        file_name
            .strip_prefix(self.stem.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
    }

    pub fn batch_path(&self, id: BatchId, marker: &BatchMarker, kind: FileKind) -> PathBuf {
        self.dir.join(BatchFileName::new(id, marker.clone(), kind).render(self))
    }

    /// Correction notes written next to a revised batch
    pub fn errors_path(&self, id: BatchId) -> PathBuf {
        self.dir.join(format!("{}.{}{}", self.stem, id, ERRORS_SUFFIX))
    }

    pub fn unmatched_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, UNMATCHED_FILE))
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, JOURNAL_FILE))
    }

    /// Run log prefix, outside the `<stem>.*` namespace that a reset clears
    pub fn log_file_prefix(&self) -> String {
        format!("{}_log", self.stem)
    }
}

/// State marker embedded in a batch file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatchMarker {
    Queued,
    Submitted { job_id: String },
    Success { job_id: String },
    PartialError { job_id: String },
}

impl BatchMarker {
    pub fn submitted(job_id: &str) -> Self {
        Self::Submitted {
            job_id: sanitize_job_id(job_id),
        }
    }

    pub fn success(job_id: &str) -> Self {
        Self::Success {
            job_id: sanitize_job_id(job_id),
        }
    }

    pub fn partial_error(job_id: &str) -> Self {
        Self::PartialError {
            job_id: sanitize_job_id(job_id),
        }
    }

    pub fn status(&self) -> BatchStatus {
        match self {
            BatchMarker::Queued => BatchStatus::Queued,
            BatchMarker::Submitted { .. } => BatchStatus::Processing,
            BatchMarker::Success { .. } => BatchStatus::Success,
            BatchMarker::PartialError { .. } => BatchStatus::PartialError,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            BatchMarker::Queued => None,
            BatchMarker::Submitted { job_id }
            | BatchMarker::Success { job_id }
            | BatchMarker::PartialError { job_id } => Some(job_id),
        }
    }
}

impl fmt::Display for BatchMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMarker::Queued => f.write_str(QUEUED),
            BatchMarker::Submitted { job_id } => write!(f, "{}-{}", SUBMITTED, job_id),
            BatchMarker::Success { job_id } => write!(f, "{}-{}", SUCCESS, job_id),
            BatchMarker::PartialError { job_id } => write!(f, "{}-{}", PARTIAL, job_id),
        }
    }
}

impl FromStr for BatchMarker {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == QUEUED {
            return Ok(BatchMarker::Queued);
        }

        let (kind, job_id) = s.split_once('-').ok_or(())?;
        if job_id.is_empty() || sanitize_job_id(job_id) != job_id {
            return Err(());
        }

        match kind {
            SUBMITTED => Ok(BatchMarker::Submitted {
                job_id: job_id.to_string(),
            }),
            SUCCESS => Ok(BatchMarker::Success {
                job_id: job_id.to_string(),
            }),
            PARTIAL => Ok(BatchMarker::PartialError {
                job_id: job_id.to_string(),
            }),
            _ => Err(()),
        }
    }
}

/// Which half of a batch pair a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Sequence,
    Table(TableFormat),
}

impl FileKind {
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Sequence => SEQUENCE_EXTENSION,
            FileKind::Table(format) => format.extension(),
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        if ext == SEQUENCE_EXTENSION {
            Some(FileKind::Sequence)
        } else {
            TableFormat::from_extension(ext)
                .filter(|format| format.extension() == ext)
                .map(FileKind::Table)
        }
    }
}

/// A parsed batch file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFileName {
    pub id: BatchId,
    pub marker: BatchMarker,
    pub kind: FileKind,
}

impl BatchFileName {
    pub fn new(id: BatchId, marker: BatchMarker, kind: FileKind) -> Self {
        Self { id, marker, kind }
    }

    /// Parse a file name in the output directory; `None` for anything that is
    /// not a batch file of this prefix
    pub fn parse(prefix: &OutputPrefix, file_name: &str) -> Option<Self> {
        if !prefix.owns(file_name) {
            return None;
        }
        let rest = &file_name[prefix.stem().len() + 1..];

        let mut parts = rest.split('.');
        let (label, marker, ext) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            id: label.parse().ok()?,
            marker: marker.parse().ok()?,
            kind: FileKind::from_extension(ext)?,
        })
    }

    pub fn render(&self, prefix: &OutputPrefix) -> String {
        format!(
            "{}.{}.{}.{}",
            prefix.stem(),
            self.id,
            self.marker,
            self.kind.extension()
        )
    }
}

/// Reduce an endpoint job id to characters safe inside a file name marker
pub fn sanitize_job_id(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
