//! seqbatch CLI Library
//!
//! Splits a sequence file and its metadata table into aligned batches and
//! pushes them through a remote submission service.
//!
//! # Overview
//!
//! - **Planning**: Join sequences to metadata rows and write queued batch pairs (`seqbatch plan`)
//! - **Submission**: Submit queued batches and record outcomes in file names (`seqbatch submit`)
//! - **One shot**: Plan then submit (`seqbatch run`)
//! - **Status**: Show the batch ledger, optionally re-querying the service (`seqbatch status`)
//!
//! Every run reads its state back from the output directory, so an
//! interrupted run is resumed by running the same command again.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod journal;
pub mod progress;
pub mod submit;

// Re-export commonly used types
pub use error::{CliError, Result};
pub use journal::Journal;

use clap::{Args, Parser, Subcommand, ValueEnum};
use seqbatch_ingest::metadata::TableFormat;
use seqbatch_ingest::naming::OutputPrefix;
use seqbatch_ingest::planner::DEFAULT_BATCH_SIZE;
use std::path::PathBuf;

/// seqbatch - Batch sequence submission
#[derive(Parser, Debug)]
#[command(name = "seqbatch")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split inputs into queued batch file pairs
    Plan {
        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Submit queued batches
    Submit {
        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        endpoint: EndpointArgs,

        #[command(flatten)]
        submit: SubmitArgs,
    },

    /// Plan batches, then submit them
    Run {
        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        plan: PlanArgs,

        #[command(flatten)]
        endpoint: EndpointArgs,

        #[command(flatten)]
        submit: SubmitArgs,
    },

    /// Show the state of every batch
    Status {
        #[command(flatten)]
        output: OutputArgs,

        /// Ask the service for the current state of each submitted batch
        #[arg(long)]
        remote: bool,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Show at most this many errors per batch
        #[arg(short = 's', long)]
        max_errors: Option<usize>,
    },
}

impl Commands {
    pub fn output(&self) -> &OutputArgs {
        match self {
            Commands::Plan { output, .. }
            | Commands::Submit { output, .. }
            | Commands::Run { output, .. }
            | Commands::Status { output, .. } => output,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output prefix; batch files are named `<prefix>.<batch>.<state>.<ext>`
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,
}

impl OutputArgs {
    pub fn prefix(&self) -> Result<OutputPrefix> {
        Ok(OutputPrefix::new(&self.output)?)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Sequence file (FASTA)
    #[arg(short, long)]
    pub fasta: PathBuf,

    /// Comma-delimited metadata table
    #[arg(short, long, conflicts_with = "tsv", required_unless_present = "tsv")]
    pub csv: Option<PathBuf>,

    /// Tab-delimited metadata table
    #[arg(short, long)]
    pub tsv: Option<PathBuf>,

    /// Metadata column matching the sequence identifiers
    #[arg(short, long)]
    pub key: String,

    /// Maximum number of records per batch
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Delete every file under the output prefix and plan again
    #[arg(short, long)]
    pub reset: bool,
}

impl PlanArgs {
    /// The metadata table and its format
    pub fn table(&self) -> Result<(PathBuf, TableFormat)> {
        match (&self.csv, &self.tsv) {
            (Some(path), None) => Ok((path.clone(), TableFormat::Csv)),
            (None, Some(path)) => Ok((path.clone(), TableFormat::Tsv)),
            _ => Err(CliError::config("Provide exactly one of --csv or --tsv")),
        }
    }
}

/// Submission services
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTarget {
    /// Canadian VirusSeq data portal
    Virusseq,
}

impl ApiTarget {
    pub fn base_url(self, dev: bool) -> &'static str {
        match (self, dev) {
            (ApiTarget::Virusseq, false) => config::VIRUSSEQ_PRODUCTION_URL,
            (ApiTarget::Virusseq, true) => config::VIRUSSEQ_DEV_URL,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Submission service
    #[arg(short, long, value_enum, default_value_t = ApiTarget::Virusseq)]
    pub api: ApiTarget,

    /// Use the service's development deployment
    #[arg(short, long)]
    pub dev: bool,

    /// Base URL of the service, overriding --api and --dev
    #[arg(long, env = "SEQBATCH_API_URL")]
    pub api_url: Option<String>,

    /// API token
    #[arg(short = 'u', long, env = "SEQBATCH_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Submit only the batches with this index (revisions included)
    #[arg(long)]
    pub only: Option<usize>,

    /// Show at most this many record errors per batch
    #[arg(short = 's', long)]
    pub max_errors: Option<usize>,
}
