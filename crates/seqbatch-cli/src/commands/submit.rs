//! `seqbatch submit` command implementation
//!
//! Submits every queued batch under the output prefix and resumes batches
//! an earlier run left submitted.

use super::{paint, print_errors};
use crate::api::VirusSeqClient;
use crate::config::Config;
use crate::error::Result;
use crate::submit::{RunSummary, SubmitOptions, Submitter};
use crate::{EndpointArgs, OutputArgs, SubmitArgs};
use colored::Colorize;
use seqbatch_common::types::BatchStatus;
use seqbatch_ingest::ledger::BatchLedger;

/// Submit queued batches
pub async fn run(output: &OutputArgs, endpoint: &EndpointArgs, args: &SubmitArgs) -> Result<RunSummary> {
    let prefix = output.prefix()?;
    let ledger = BatchLedger::scan(&prefix)?;

    if ledger.is_empty() {
        println!("No batches found for {}.", output.output.display());
        println!("Run 'seqbatch plan' to create them.");
        return Ok(RunSummary::default());
    }

    let config = Config::from_env()?.with_overrides(endpoint.api_url.clone(), endpoint.token.clone());
    let client = VirusSeqClient::from_config(&config, endpoint.api.base_url(endpoint.dev))?;
    let options = SubmitOptions {
        only: args.only,
        poll_interval: config.poll_interval,
    };

    println!("Submitting to {}", client.base_url().cyan());

    let mut submitter = Submitter::new(&client, ledger, options);
    let outcome = submitter.run().await;
    let summary = submitter.summary();

    if !summary.reports.is_empty() {
        print_summary(summary, submitter.ledger(), args.max_errors);
    } else if outcome.is_ok() {
        println!(
            "{} Nothing to submit ({} batch(es) already settled)",
            "✓".green(),
            summary.already_settled
        );
    }

    outcome
}

/// Print what happened to each batch this run, even when the run stopped early
fn print_summary(summary: &RunSummary, ledger: &BatchLedger, max_errors: Option<usize>) {
    for report in &summary.reports {
        let mark = match report.status {
            BatchStatus::Success => "✓".green(),
            _ => "!".yellow(),
        };
        println!(
            "{} Batch {:<6} {:<14} job {} ({} records)",
            mark,
            report.id.to_string(),
            paint(report.status),
            report.job_id,
            report.records
        );

        if report.status == BatchStatus::PartialError {
            print_errors(&report.errors, max_errors);
            match report.revision.and_then(|id| ledger.get(id)) {
                Some(entry) => println!(
                    "    Correction batch {} written: fix {} and rerun",
                    entry.id,
                    entry.table_path.display()
                ),
                None => println!("    No correction batch: no reported error matched a record"),
            }
        }
    }

    println!();
    println!("{}", "Summary:".cyan().bold());
    println!("  Succeeded:       {}", summary.count(BatchStatus::Success));
    println!("  Partial errors:  {}", summary.count(BatchStatus::PartialError));
    println!("  Previously done: {}", summary.already_settled);

    let revisions = summary.revisions().count();
    if revisions > 0 {
        println!("  Correction batches queued for the next run: {}", revisions);
    }
}
