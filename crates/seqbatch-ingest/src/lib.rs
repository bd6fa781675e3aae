//! Seqbatch Ingest Library
//!
//! Turns a FASTA file and its sample metadata table into numbered batch file
//! pairs, and keeps those pairs as the durable record of submission state.
//!
//! # Components
//!
//! - **fasta** / **metadata**: input indexes with up-front validation
//! - **planner**: join on the key, partition, persist idempotently
//! - **naming** / **ledger**: file-name markers and the directory-backed state
//! - **reviser**: correction batches from per-record error reports
//!
//! # Example
//!
//! ```no_run
//! use seqbatch_ingest::fasta::SequenceIndex;
//! use seqbatch_ingest::metadata::{MetadataIndex, TableFormat};
//! use seqbatch_ingest::naming::OutputPrefix;
//! use seqbatch_ingest::planner::{plan, PlanOptions};
//!
//! fn main() -> seqbatch_ingest::Result<()> {
//!     let sequences = SequenceIndex::from_path("consensus.fasta")?;
//!     let metadata = MetadataIndex::from_path("samples.tsv", TableFormat::Tsv, "fasta header name")?;
//!     let prefix = OutputPrefix::new("runs/output")?;
//!
//!     let outcome = plan(&sequences, &metadata, &prefix, PlanOptions::default())?;
//!     println!("{} batches", outcome.batches.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fasta;
pub mod ledger;
pub mod metadata;
pub mod naming;
pub mod planner;
pub mod reviser;
pub mod store;

pub use error::{IngestError, Result};
