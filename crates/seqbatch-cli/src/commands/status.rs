//! `seqbatch status` command implementation
//!
//! Lists every batch under the output prefix with the state its file names
//! record. With `--remote`, each submitted batch is looked up again on the
//! service.

use super::{paint, print_errors};
use crate::api::VirusSeqClient;
use crate::config::Config;
use crate::error::Result;
use crate::journal::Journal;
use crate::submit::{PollStatus, SubmissionEndpoint, TerminalOutcome, REJECTED_JOB_ID};
use crate::{EndpointArgs, OutputArgs};
use colored::Colorize;
use seqbatch_ingest::ledger::BatchLedger;
use seqbatch_ingest::store;
use std::collections::BTreeMap;
use tracing::warn;

/// Show status of every batch
pub async fn run(
    output: &OutputArgs,
    remote: bool,
    endpoint: &EndpointArgs,
    max_errors: Option<usize>,
) -> Result<()> {
    let prefix = output.prefix()?;
    let ledger = BatchLedger::scan(&prefix)?;

    if ledger.is_empty() {
        println!("No batches found for {}.", output.output.display());
        println!("Run 'seqbatch plan' to create them.");
        return Ok(());
    }

    let journal = Journal::load_or_new(prefix.journal_path());

    println!("{}", "Batches:".cyan().bold());
    println!();

    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    for entry in ledger.entries() {
        let status = entry.status();
        *totals.entry(status.to_string()).or_default() += 1;

        let records = match store::load(entry) {
            Ok(stored) => stored.batch.len().to_string(),
            Err(e) => {
                warn!(batch = %entry.id, error = %e, "Could not read batch files");
                "?".to_string()
            }
        };

        println!(
            "  {:<6} {:<14} {:>6} records  job {}",
            entry.id.to_string(),
            paint(status),
            records,
            entry.job_id().unwrap_or("-")
        );

        if let Some(noted) = journal.get(entry.id) {
            if !noted.errors.is_empty() {
                println!("         {} error(s) reported", noted.errors.len());
            }
            if let Some(message) = noted.message.as_deref().filter(|_| !status.is_terminal()) {
                println!("         last attempt: {}", message.dimmed());
            }
            if let Some(revision) = noted.revised_as {
                println!("         corrected in batch {}", revision);
            }
        }
    }

    println!();
    println!("{}", "Summary:".cyan().bold());
    for (status, count) in &totals {
        println!("  {:<14} {}", status, count);
    }
    println!("  Directory:     {}", prefix.dir().display());

    if remote {
        let config = Config::from_env()?.with_overrides(endpoint.api_url.clone(), endpoint.token.clone());
        let client = VirusSeqClient::from_config(&config, endpoint.api.base_url(endpoint.dev))?;
        report_remote(&client, &ledger, max_errors).await?;
    }

    Ok(())
}

/// Ask the service about every batch that has a job
async fn report_remote<E: SubmissionEndpoint + ?Sized>(
    endpoint: &E,
    ledger: &BatchLedger,
    max_errors: Option<usize>,
) -> Result<()> {
    println!();
    println!("{}", format!("Remote status ({}):", endpoint.name()).cyan().bold());

    for entry in ledger.entries() {
        let Some(job_id) = entry.job_id().filter(|id| *id != REJECTED_JOB_ID) else {
            continue;
        };

        let stored = store::load(entry)?;
        let handle = VirusSeqClient::handle_for(job_id, &stored.batch);
        match endpoint.poll_status(&handle).await? {
            PollStatus::Queued => println!("  {:<6} queued", entry.id.to_string()),
            PollStatus::Processing => println!("  {:<6} processing", entry.id.to_string()),
            PollStatus::Terminal(TerminalOutcome::Success) => {
                println!("  {:<6} {}", entry.id.to_string(), "complete".green())
            }
            PollStatus::Terminal(TerminalOutcome::PartialError(errors)) => {
                println!(
                    "  {:<6} {} ({} error(s))",
                    entry.id.to_string(),
                    "errors".yellow(),
                    errors.len()
                );
                print_errors(&errors, max_errors);
            }
            PollStatus::Terminal(TerminalOutcome::FatalError(reason)) => {
                println!("  {:<6} {}", entry.id.to_string(), reason.red());
            }
        }
    }

    Ok(())
}
