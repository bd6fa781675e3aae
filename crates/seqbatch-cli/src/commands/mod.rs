//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod plan;
pub mod run;
pub mod status;
pub mod submit;

use colored::{ColoredString, Colorize};
use seqbatch_common::types::{BatchStatus, ErrorEntry};

/// Batch status colored for the terminal
pub(crate) fn paint(status: BatchStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        BatchStatus::Success => text.green(),
        BatchStatus::PartialError => text.yellow(),
        BatchStatus::FatalError => text.red().bold(),
        BatchStatus::Queued | BatchStatus::Processing => text.cyan(),
        BatchStatus::Unsubmitted => text.normal(),
    }
}

/// Print record errors, at most `max` of them
pub(crate) fn print_errors(errors: &[ErrorEntry], max: Option<usize>) {
    let shown = max.unwrap_or(errors.len()).min(errors.len());
    for entry in &errors[..shown] {
        println!("      {}", entry);
    }
    if shown < errors.len() {
        println!("      {}", format!("... and {} more", errors.len() - shown).dimmed());
    }
}
