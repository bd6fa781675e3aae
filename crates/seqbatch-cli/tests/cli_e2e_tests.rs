//! End-to-end tests for the seqbatch binary
//!
//! These tests validate the full workflow including:
//! - Batch planning and the on-disk naming scheme
//! - Submission against a mock VirusSeq service
//! - Fatal refusals stopping the run
//! - Correction batches for per-record errors
//! - Resuming and resetting

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Write `n` sequences and a matching tab-separated table
fn write_inputs(dir: &Path, n: usize) -> (PathBuf, PathBuf) {
    let fasta = dir.join("consensus.fasta");
    let table = dir.join("metadata.tsv");

    let mut sequences = String::new();
    let mut rows = String::from("fasta header name\tspecimen collector sample ID\thost\n");
    for i in 1..=n {
        sequences.push_str(&format!(">hCoV-19/CA-{i} sample {i}\nACGTACGTNN\nGGCC\n"));
        rows.push_str(&format!("hCoV-19/CA-{i}\tQC-{i}\tHuman\n"));
    }

    fs::write(&fasta, sequences).unwrap();
    fs::write(&table, rows).unwrap();
    (fasta, table)
}

fn seqbatch(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("seqbatch").unwrap();
    cmd.current_dir(dir)
        .env("SEQBATCH_POLL_INTERVAL_SECS", "0")
        .env_remove("SEQBATCH_API_TOKEN")
        .env_remove("SEQBATCH_API_URL")
        .env_remove("SEQBATCH_LOG_OUTPUT");
    cmd
}

fn plan_args(fasta: &Path, table: &Path, batch_size: usize) -> Vec<String> {
    vec![
        "--fasta".to_string(),
        fasta.display().to_string(),
        "--tsv".to_string(),
        table.display().to_string(),
        "--key".to_string(),
        "fasta header name".to_string(),
        "--batch-size".to_string(),
        batch_size.to_string(),
        "--output".to_string(),
        "out/batch".to_string(),
    ]
}

/// Batch-namespace file names in the output directory, sorted
fn batch_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.join("out"))
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with("batch."))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn record_count(fasta: &Path) -> usize {
    fs::read_to_string(fasta)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with('>'))
        .count()
}

/// Uploads page listing `size` completed samples
fn completed_page(size: usize) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (1..=size)
        .map(|i| json!({"submitterSampleId": format!("QC-{i}"), "status": "COMPLETE"}))
        .collect();
    json!({ "data": data })
}

async fn mount_accepting_service(server: &MockServer, submissions: u64, batch_sizes: &[usize]) {
    Mock::given(method("POST"))
        .and(path("/submissions"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"submissionId": "SUB-1"})))
        .expect(submissions)
        .mount(server)
        .await;

    for size in batch_sizes {
        Mock::given(method("GET"))
            .and(path("/uploads"))
            .and(query_param("submissionId", "SUB-1"))
            .and(query_param("size", size.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(completed_page(*size)))
            .mount(server)
            .await;
    }
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn test_plan_splits_into_batches() {
    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 25);

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 3 batch(es)"));

    assert_eq!(
        batch_files(dir.path()),
        vec![
            "batch.0.queued.fasta",
            "batch.0.queued.tsv",
            "batch.1.queued.fasta",
            "batch.1.queued.tsv",
            "batch.2.queued.fasta",
            "batch.2.queued.tsv",
            "batch.unmatched.tsv",
        ]
    );
    assert_eq!(record_count(&dir.path().join("out/batch.0.queued.fasta")), 10);
    assert_eq!(record_count(&dir.path().join("out/batch.2.queued.fasta")), 5);

    let table = fs::read_to_string(dir.path().join("out/batch.2.queued.tsv")).unwrap();
    assert!(table.starts_with("fasta header name\tspecimen collector sample ID\thost\n"));
    assert!(table.contains("hCoV-19/CA-21\tQC-21\tHuman"));
}

#[test]
fn test_plan_reports_unmatched_records() {
    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 4);
    let mut rows = fs::read_to_string(&table).unwrap();
    rows.push_str("hCoV-19/CA-99\tQC-99\tHuman\n");
    fs::write(&table, rows).unwrap();

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 10))
        .assert()
        .success()
        .stdout(predicate::str::contains("metadata without sequence: hCoV-19/CA-99"));

    let report = fs::read_to_string(dir.path().join("out/batch.unmatched.tsv")).unwrap();
    assert!(report.contains("metadata\thCoV-19/CA-99"));
    assert_eq!(record_count(&dir.path().join("out/batch.0.queued.fasta")), 4);
}

#[test]
fn test_plan_missing_key_column_fails() {
    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 3);

    let mut args = plan_args(&fasta, &table, 10);
    args[5] = "sample name".to_string();

    seqbatch(dir.path())
        .arg("plan")
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sample name"));

    assert!(batch_files(dir.path()).is_empty());
}

#[test]
fn test_plan_is_idempotent_and_reset_regenerates() {
    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 15);

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 10))
        .assert()
        .success();

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped (files already exist): 0, 1"));
    assert_eq!(batch_files(dir.path()).len(), 5);

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 5))
        .arg("--reset")
        .assert()
        .success();

    let files = batch_files(dir.path());
    assert_eq!(files.len(), 7);
    assert!(files.contains(&"batch.2.queued.fasta".to_string()));
    assert_eq!(record_count(&dir.path().join("out/batch.0.queued.fasta")), 5);
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_run_submits_and_records_success() {
    let server = MockServer::start().await;
    mount_accepting_service(&server, 2, &[10, 5]).await;

    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 15);

    seqbatch(dir.path())
        .arg("run")
        .args(plan_args(&fasta, &table, 10))
        .args(["--api-url", &server.uri(), "--token", "test-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Succeeded:       2"));

    assert_eq!(
        batch_files(dir.path()),
        vec![
            "batch.0.success-SUB-1.fasta",
            "batch.0.success-SUB-1.tsv",
            "batch.1.success-SUB-1.fasta",
            "batch.1.success-SUB-1.tsv",
            "batch.journal.json",
            "batch.unmatched.tsv",
        ]
    );

    let journal: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("out/batch.journal.json")).unwrap()).unwrap();
    assert_eq!(journal["batches"][0]["status"], "success");
    assert_eq!(journal["batches"][0]["job_id"], "SUB-1");
}

#[tokio::test]
async fn test_rerun_skips_settled_batches() {
    let server = MockServer::start().await;
    mount_accepting_service(&server, 1, &[5]).await;

    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 5);

    for _ in 0..2 {
        seqbatch(dir.path())
            .arg("run")
            .args(plan_args(&fasta, &table, 10))
            .args(["--api-url", &server.uri(), "--token", "test-token"])
            .assert()
            .success();
    }

    seqbatch(dir.path())
        .args(["submit", "--output", "out/batch", "--api-url", &server.uri(), "--token", "test-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to submit (1 batch(es) already settled)"));
}

#[tokio::test]
async fn test_unauthorized_stops_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submissions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 15);

    seqbatch(dir.path())
        .arg("run")
        .args(plan_args(&fasta, &table, 10))
        .args(["--api-url", &server.uri(), "--token", "expired"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Batch 0 stopped the run"))
        .stderr(predicate::str::contains("401"));

    let files = batch_files(dir.path());
    assert!(files.contains(&"batch.0.queued.fasta".to_string()));
    assert!(files.contains(&"batch.1.queued.tsv".to_string()));
}

#[tokio::test]
async fn test_invalid_fields_produce_correction_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submissions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "BAD_REQUEST",
            "message": "Found records with invalid fields",
            "errorInfo": {"invalidFields": [
                {"fieldName": "host", "value": "", "reason": "NOT_ALLOWED_TO_BE_EMPTY", "index": 3},
                {"fieldName": "collection date", "value": "2021-13-01", "reason": "INVALID_DATE", "index": 7}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 10);

    seqbatch(dir.path())
        .arg("run")
        .args(plan_args(&fasta, &table, 10))
        .args(["--api-url", &server.uri(), "--token", "test-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Correction batch 0r1 written"))
        .stdout(predicate::str::contains("INVALID_DATE"));

    let out = dir.path().join("out");
    assert_eq!(record_count(&out.join("batch.0.partial-rejected.fasta")), 10);

    // The service refused the whole submission, so the correction carries every record.
    assert_eq!(record_count(&out.join("batch.0r1.queued.fasta")), 10);
    let rows = fs::read_to_string(out.join("batch.0r1.queued.tsv")).unwrap();
    assert_eq!(rows.lines().count(), 11);

    let notes = fs::read_to_string(out.join("batch.0r1.errors.tsv")).unwrap();
    assert_eq!(notes.lines().count(), 3);
    assert!(notes.contains("hCoV-19/CA-3\thost\tNOT_ALLOWED_TO_BE_EMPTY"));
    assert!(notes.contains("hCoV-19/CA-7\tcollection date\tINVALID_DATE"));
}

#[tokio::test]
async fn test_rerun_after_status_outage_does_not_resubmit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"submissionId": "SUB-9"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uploads"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uploads"))
        .and(query_param("submissionId", "SUB-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_page(3)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 3);

    seqbatch(dir.path())
        .arg("run")
        .args(plan_args(&fasta, &table, 10))
        .args(["--api-url", &server.uri(), "--token", "test-token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unavailable"));

    assert!(batch_files(dir.path()).contains(&"batch.0.submitted-SUB-9.fasta".to_string()));

    seqbatch(dir.path())
        .args(["submit", "--output", "out/batch", "--api-url", &server.uri(), "--token", "test-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Succeeded:       1"));

    assert!(batch_files(dir.path()).contains(&"batch.0.success-SUB-9.fasta".to_string()));
}

#[test]
fn test_submit_without_token_fails() {
    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 2);

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 10))
        .assert()
        .success();

    seqbatch(dir.path())
        .args(["submit", "--output", "out/batch", "--api-url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API token"));

    assert!(batch_files(dir.path()).contains(&"batch.0.queued.fasta".to_string()));
}

// ============================================================================
// Status
// ============================================================================

#[test]
fn test_status_lists_batches() {
    let dir = TempDir::new().unwrap();
    let (fasta, table) = write_inputs(dir.path(), 12);

    seqbatch(dir.path())
        .arg("plan")
        .args(plan_args(&fasta, &table, 10))
        .assert()
        .success();

    seqbatch(dir.path())
        .args(["status", "--output", "out/batch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued"))
        .stdout(predicate::str::contains("10 records"))
        .stdout(predicate::str::contains("2 records"));
}

#[test]
fn test_status_without_batches() {
    let dir = TempDir::new().unwrap();

    seqbatch(dir.path())
        .args(["status", "--output", "out/batch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seqbatch plan"));
}
