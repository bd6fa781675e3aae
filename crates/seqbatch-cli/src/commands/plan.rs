//! `seqbatch plan` command implementation
//!
//! Joins the sequence file with the metadata table and writes queued batch
//! pairs under the output prefix.

use crate::error::Result;
use crate::progress::create_spinner;
use crate::{OutputArgs, PlanArgs};
use colored::Colorize;
use seqbatch_ingest::fasta::SequenceIndex;
use seqbatch_ingest::metadata::MetadataIndex;
use seqbatch_ingest::planner::{self, PlanOptions, PlanOutcome};
use tracing::info;

/// Unmatched identifiers listed on the terminal; the report file has all
const UNMATCHED_SHOWN: usize = 10;

/// Plan batches for the given inputs
pub fn run(output: &OutputArgs, args: &PlanArgs) -> Result<PlanOutcome> {
    let prefix = output.prefix()?;
    let (table_path, format) = args.table()?;

    let spinner = create_spinner("Reading inputs...");
    let sequences = SequenceIndex::from_path(&args.fasta);
    let metadata = MetadataIndex::from_path(&table_path, format, &args.key);
    spinner.finish_and_clear();
    let (sequences, metadata) = (sequences?, metadata?);

    info!(
        sequences = sequences.len(),
        rows = metadata.len(),
        key = %args.key,
        "Loaded inputs"
    );

    let options = PlanOptions {
        batch_size: args.batch_size,
        reset: args.reset,
    };
    let outcome = planner::plan(&sequences, &metadata, &prefix, options)?;

    let records: usize = outcome.batches.iter().map(|b| b.len()).sum();
    println!(
        "{} Planned {} batch(es) of up to {} records ({} records) under {}",
        "✓".green(),
        outcome.batches.len(),
        args.batch_size,
        records,
        prefix.dir().display()
    );

    if !outcome.written.is_empty() {
        println!("  Written: {}", join_labels(&outcome.written));
    }
    if !outcome.skipped.is_empty() {
        println!(
            "  Skipped (files already exist): {}",
            join_labels(&outcome.skipped)
        );
    }

    if !outcome.unmatched.is_empty() {
        println!(
            "{} {} identifier(s) could not be matched",
            "!".yellow(),
            outcome.unmatched.total()
        );
        for id in outcome.unmatched.sequences.iter().take(UNMATCHED_SHOWN) {
            println!("    sequence without metadata: {}", id);
        }
        for id in outcome.unmatched.metadata.iter().take(UNMATCHED_SHOWN) {
            println!("    metadata without sequence: {}", id);
        }
        if let Some(path) = &outcome.unmatched_path {
            println!("  Full list: {}", path.display());
        }
    }

    Ok(outcome)
}

fn join_labels(ids: &[seqbatch_common::types::BatchId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
