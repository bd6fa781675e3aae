//! HTTP client for the VirusSeq submission service
//!
//! Uploads a batch's sequence and table files as one multipart submission,
//! then follows the submission through the uploads listing.

use crate::api::{endpoints, types::*};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::submit::{BatchPayload, JobHandle, PollStatus, SubmissionEndpoint, SubmitResponse, TerminalOutcome};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use seqbatch_common::types::{Batch, ErrorEntry};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Table column holding the sample name the service reports back
pub const SAMPLE_ID_FIELD: &str = "specimen collector sample ID";

/// Server message seen when the submitted table has a header but no rows
const EMPTY_TABLE_SIGNAL: &str = "Flux#last() didn't observe any onNext signal";

/// Client for one VirusSeq deployment
pub struct VirusSeqClient {
    client: Client,
    base_url: String,
    token: String,
}

impl VirusSeqClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    /// Create from configuration, falling back to `default_url`
    pub fn from_config(config: &Config, default_url: &str) -> Result<Self> {
        Self::new(config.base_url(default_url), config.require_token()?, config.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle for a submission of `batch`, mapping sample names to record ids
    pub fn handle_for(job_id: impl Into<String>, batch: &Batch) -> JobHandle {
        let aliases: HashMap<String, String> = batch
            .records
            .iter()
            .filter_map(|record| {
                let sample = record.metadata.get(SAMPLE_ID_FIELD)?.trim();
                (!sample.is_empty()).then(|| (sample.to_string(), record.id().to_string()))
            })
            .collect();

        JobHandle::new(job_id, batch.len()).with_aliases(aliases)
    }

    /// Interpret a refused submission
    fn refusal(batch: &Batch, status: StatusCode, text: &str) -> Result<SubmitResponse> {
        let fatal = |msg: String| -> Result<SubmitResponse> {
            Ok(SubmitResponse::Rejected(TerminalOutcome::FatalError(msg)))
        };

        if status == StatusCode::UNAUTHORIZED {
            return fatal("Unauthorized (401): the API token was refused, it may have expired".to_string());
        }

        let body: ApiErrorBody = serde_json::from_str(text).unwrap_or_default();

        if status == StatusCode::FORBIDDEN || body.status == "FORBIDDEN" {
            return fatal(format!(
                "Forbidden ({}): the account behind this API token is not authorized for submissions yet",
                non_empty(&body.message, "Denied")
            ));
        }

        if status == StatusCode::BAD_REQUEST {
            return match body.message.as_str() {
                HEADERS_INCORRECT => fatal(format!(
                    "Table headers are incorrect (unknown: [{}], missing: [{}]); check that the table uses the current template",
                    body.error_info.unknown_headers.join(", "),
                    body.error_info.missing_headers.join(", ")
                )),
                INVALID_FIELDS => Ok(SubmitResponse::Rejected(TerminalOutcome::PartialError(
                    invalid_field_entries(batch, &body.error_info.invalid_fields),
                ))),
                other => fatal(format!("Bad request: {}", non_empty(other, text.trim()))),
            };
        }

        let mut message = format!("unexpected status {}", status);
        if !body.message.is_empty() {
            message.push_str(&format!(": {}", body.message));
        }
        if body.message == EMPTY_TABLE_SIGNAL {
            message.push_str(" (does the table have no data rows?)");
        }
        Err(CliError::transport(message))
    }
}

#[async_trait]
impl SubmissionEndpoint for VirusSeqClient {
    fn name(&self) -> &str {
        "virusseq"
    }

    async fn submit(&self, payload: &BatchPayload) -> Result<SubmitResponse> {
        let url = endpoints::submissions_url(&self.base_url);

        let sequence = tokio::fs::read(&payload.sequence_path).await?;
        let table = tokio::fs::read(&payload.table_path).await?;
        let form = Form::new()
            .part("files", Part::bytes(sequence).file_name(file_name(&payload.sequence_path)))
            .part("files", Part::bytes(table).file_name(file_name(&payload.table_path)));

        debug!(url = %url, batch = %payload.batch.id, "Posting submission");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let created: SubmissionCreated = response.json().await?;
            return Ok(SubmitResponse::Accepted(Self::handle_for(
                created.submission_id,
                &payload.batch,
            )));
        }

        let text = response.text().await?;
        Self::refusal(&payload.batch, status, &text)
    }

    fn resume(&self, job_id: &str, payload: &BatchPayload) -> JobHandle {
        Self::handle_for(job_id, &payload.batch)
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<PollStatus> {
        let url = endpoints::uploads_url(&self.base_url, &handle.job_id, handle.record_count);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Ok(PollStatus::Terminal(TerminalOutcome::FatalError(format!(
                    "status request refused ({})",
                    response.status()
                ))))
            }
            status if !status.is_success() => {
                return Err(CliError::transport(format!(
                    "status of submission {} unavailable ({})",
                    handle.job_id, status
                )))
            }
            _ => {}
        }

        let page: UploadsPage = response.json().await?;
        Ok(classify(&page, handle))
    }
}

/// Reduce one uploads page to a job status
///
/// The job is settled once every sample of the batch is listed and none is
/// queued or processing.
pub fn classify(page: &UploadsPage, handle: &JobHandle) -> PollStatus {
    if page.data.len() < handle.record_count.max(1) {
        return PollStatus::Queued;
    }
    if page.data.iter().any(|u| u.status == UploadStatus::Processing) {
        return PollStatus::Processing;
    }
    if page.data.iter().any(|u| u.status == UploadStatus::Queued) {
        return PollStatus::Queued;
    }

    let mut errors = Vec::new();
    for upload in page.data.iter().filter(|u| u.status == UploadStatus::Error) {
        let record_id = handle.resolve(&upload.submitter_sample_id);
        let parsed = parse_upload_errors(upload.error.as_deref().unwrap_or_default());

        if parsed.is_empty() {
            errors.push(ErrorEntry::new(&record_id, "ERROR"));
        }
        for (field, message) in parsed {
            let entry = ErrorEntry::new(&record_id, message);
            errors.push(match field {
                Some(field) => entry.with_field(field),
                None => entry,
            });
        }
    }

    if errors.is_empty() {
        PollStatus::Terminal(TerminalOutcome::Success)
    } else {
        PollStatus::Terminal(TerminalOutcome::PartialError(errors))
    }
}

/// Map 1-based table rows back to record ids
///
/// Rows outside the batch keep a `row N` id, which the reviser reports as an
/// anomaly.
fn invalid_field_entries(batch: &Batch, fields: &[InvalidField]) -> Vec<ErrorEntry> {
    fields
        .iter()
        .map(|f| {
            let record_id = f
                .index
                .checked_sub(1)
                .and_then(|i| batch.records.get(i))
                .map(|r| r.id().to_string())
                .unwrap_or_else(|| format!("row {}", f.index));

            let message = match f.value.as_str().map(str::trim) {
                Some(value) if !value.is_empty() => format!("{} (value: '{}')", f.reason, value),
                _ => f.reason.clone(),
            };

            ErrorEntry::new(record_id, message).with_field(&f.field_name)
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
