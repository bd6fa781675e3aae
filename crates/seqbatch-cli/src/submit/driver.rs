//! Drives queued batches through an endpoint, one at a time
//!
//! Batches are taken in id order. Each is submitted, renamed to
//! `submitted-<job>` as soon as the endpoint accepts it, polled until it
//! settles, then renamed again to record the outcome. A batch found already
//! submitted is polled, never sent twice. A fatal outcome stops the run and
//! leaves the batch and every later one queued, so the next run picks them
//! up again. Correction batches written during a run wait for the next run.

use super::machine::{self, Action, Event, Settlement, Step};
use super::{BatchPayload, JobHandle, SubmissionEndpoint, SubmitResponse, REJECTED_JOB_ID};
use crate::error::{CliError, Result};
use crate::journal::Journal;
use crate::progress::create_spinner;
use seqbatch_common::types::{BatchId, BatchStatus, ErrorEntry};
use seqbatch_ingest::ledger::{BatchLedger, LedgerEntry};
use seqbatch_ingest::naming::{sanitize_job_id, BatchMarker};
use seqbatch_ingest::reviser::{self, Scope};
use seqbatch_ingest::store;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Submit only the batches with this index
    pub only: Option<usize>,

    /// Delay before each status poll
    pub poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            only: None,
            poll_interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

/// What happened to one batch in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub id: BatchId,
    pub records: usize,
    pub status: BatchStatus,
    pub job_id: String,
    pub errors: Vec<ErrorEntry>,

    /// Correction batch written for a partial error
    pub revision: Option<BatchId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<BatchReport>,

    /// Batches that had settled before this run started
    pub already_settled: usize,
}

impl RunSummary {
    pub fn count(&self, status: BatchStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    pub fn revisions(&self) -> impl Iterator<Item = BatchId> + '_ {
        self.reports.iter().filter_map(|r| r.revision)
    }
}

/// Where a batch stands once the endpoint has been asked about it
struct Attempt {
    job: Option<JobHandle>,
    step: Step,
}

pub struct Submitter<'a, E: SubmissionEndpoint + ?Sized> {
    endpoint: &'a E,
    ledger: BatchLedger,
    journal: Journal,
    journal_path: PathBuf,
    options: SubmitOptions,
    summary: RunSummary,
}

impl<'a, E: SubmissionEndpoint + ?Sized> Submitter<'a, E> {
    pub fn new(endpoint: &'a E, ledger: BatchLedger, options: SubmitOptions) -> Self {
        let journal_path = ledger.prefix().journal_path();
        let journal = Journal::load_or_new(&journal_path);
        Self {
            endpoint,
            ledger,
            journal,
            journal_path,
            options,
            summary: RunSummary::default(),
        }
    }

    pub fn ledger(&self) -> &BatchLedger {
        &self.ledger
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Batches handled so far, including when [`run`](Self::run) stopped early
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Drive every pending batch, stopping at the first fatal or transport error
    pub async fn run(&mut self) -> Result<RunSummary> {
        if let Some(index) = self.options.only {
            if !self.ledger.has_index(index) {
                return Err(CliError::config(format!(
                    "No batch with index {index} in {}",
                    self.ledger.prefix().dir().display()
                )));
            }
        }

        let pending = self.ledger.pending(self.options.only);
        let already_settled = self
            .ledger
            .entries()
            .filter(|e| e.status().is_terminal())
            .count();

        info!(
            endpoint = self.endpoint.name(),
            pending = pending.len(),
            settled = already_settled,
            "Starting submission"
        );

        self.summary = RunSummary {
            reports: Vec::with_capacity(pending.len()),
            already_settled,
        };

        for entry in pending {
            let report = self.drive(&entry).await?;
            self.summary.reports.push(report);
        }

        Ok(self.summary.clone())
    }

    async fn drive(&mut self, entry: &LedgerEntry) -> Result<BatchReport> {
        let id = entry.id;
        let stored = store::load(entry)?;
        let records = stored.batch.len();
        let payload = BatchPayload {
            batch: stored.batch.clone(),
            columns: stored.columns.clone(),
            format: stored.format,
            sequence_path: entry.sequence_path.clone(),
            table_path: entry.table_path.clone(),
        };

        let attempt = match entry.job_id() {
            Some(marked) if entry.status() == BatchStatus::Processing => {
                // The marker holds a file-name-safe id; prefer the raw one
                let job_id = self
                    .journal
                    .job_id(id)
                    .filter(|raw| sanitize_job_id(raw) == marked)
                    .unwrap_or(marked)
                    .to_string();
                info!(batch = %id, job = %job_id, "Resuming submitted batch");

                Attempt {
                    job: Some(self.endpoint.resume(&job_id, &payload)),
                    step: machine::step(entry.status(), Event::Resumed)?,
                }
            }
            _ => self.submit(&payload).await?,
        };

        let rejected = attempt.job.is_none();
        let job_id = attempt
            .job
            .as_ref()
            .map_or_else(|| REJECTED_JOB_ID.to_string(), |job| job.job_id.clone());

        let settlement = match &attempt.job {
            Some(job) => {
                let spinner = create_spinner(&format!("Batch {id}: {}", attempt.step.status));
                let waited = self
                    .wait(id, Some(job), attempt.step, |status| {
                        spinner.set_message(format!("Batch {id}: {status}"));
                    })
                    .await;
                spinner.finish_and_clear();

                match waited {
                    Ok(settlement) => settlement,
                    Err(e) => return Err(self.interrupted(id, BatchStatus::Processing, e)),
                }
            }
            None => self.wait(id, None, attempt.step, |_| {}).await?,
        };

        match settlement {
            Settlement::Accept => {
                self.ledger.settle(id, BatchMarker::success(&job_id))?;
                self.journal.finished(id, BatchStatus::Success, &[], None);
                self.save_journal();
                info!(batch = %id, job = %job_id, "Batch succeeded");

                Ok(BatchReport {
                    id,
                    records,
                    status: BatchStatus::Success,
                    job_id,
                    errors: Vec::new(),
                    revision: None,
                })
            }
            Settlement::Revise(errors) => {
                self.ledger.settle(id, BatchMarker::partial_error(&job_id))?;
                self.journal
                    .finished(id, BatchStatus::PartialError, &errors, None);

                // A refused submission uploaded nothing, so every record goes out again
                let scope = if rejected { Scope::Whole } else { Scope::Offending };
                warn!(batch = %id, job = %job_id, errors = errors.len(), ?scope, "Batch partially refused");

                let revision = reviser::revise(&mut self.ledger, &stored, &errors, scope)?;
                let revision = revision.map(|r| r.batch.id);
                if let Some(revised) = revision {
                    self.journal.revised(id, revised);
                }
                self.save_journal();

                Ok(BatchReport {
                    id,
                    records,
                    status: BatchStatus::PartialError,
                    job_id,
                    errors,
                    revision,
                })
            }
            Settlement::Halt(reason) => {
                if !rejected {
                    self.ledger.settle(id, BatchMarker::Queued)?;
                }
                self.journal
                    .finished(id, BatchStatus::FatalError, &[], Some(reason.clone()));
                self.save_journal();
                error!(batch = %id, job = %job_id, reason = %reason, "Batch refused, stopping");

                Err(CliError::fatal(id, reason))
            }
        }
    }

    /// Send a queued batch, recording an accepted job on disk before anything else
    async fn submit(&mut self, payload: &BatchPayload) -> Result<Attempt> {
        let id = payload.batch.id;
        info!(batch = %id, records = payload.batch.len(), "Submitting batch");

        let response = match self.endpoint.submit(payload).await {
            Ok(response) => response,
            Err(e) => return Err(self.interrupted(id, BatchStatus::Queued, e)),
        };

        match response {
            SubmitResponse::Accepted(job) => {
                let step = machine::step(payload.batch.status, Event::Accepted)?;
                self.ledger.settle(id, BatchMarker::submitted(&job.job_id))?;
                self.journal.submitted(id, &job.job_id);
                self.save_journal();
                info!(batch = %id, job = %job.job_id, "Batch accepted for processing");

                Ok(Attempt { job: Some(job), step })
            }
            SubmitResponse::Rejected(outcome) => Ok(Attempt {
                job: None,
                step: machine::step(payload.batch.status, Event::Rejected(outcome))?,
            }),
        }
    }

    /// Poll until the machine settles the batch
    async fn wait<F>(
        &self,
        id: BatchId,
        handle: Option<&JobHandle>,
        mut step: Step,
        on_status: F,
    ) -> Result<Settlement>
    where
        F: Fn(BatchStatus),
    {
        loop {
            let handle = match (step.action, handle) {
                (Action::Settle(settlement), _) => return Ok(settlement),
                (Action::Poll, Some(handle)) => handle,
                (Action::Poll, None) => {
                    return Err(CliError::transport(format!(
                        "{} left batch {id} pending without a job to poll",
                        self.endpoint.name()
                    )))
                }
            };

            tokio::time::sleep(self.options.poll_interval).await;
            let polled = self.endpoint.poll_status(handle).await?;
            debug!(batch = %id, job = %handle.job_id, status = ?polled, "Polled job");

            step = machine::step(step.status, Event::Polled(polled))?;
            on_status(step.status);
        }
    }

    fn interrupted(&mut self, id: BatchId, left: BatchStatus, e: CliError) -> CliError {
        warn!(batch = %id, error = %e, state = %left, "Submission interrupted");
        self.journal.interrupted(id, left, e.to_string());
        self.save_journal();
        e
    }

    fn save_journal(&self) {
        if let Err(e) = self.journal.save(&self.journal_path) {
            warn!(path = %self.journal_path.display(), error = %e, "Could not write journal");
        }
    }
}
