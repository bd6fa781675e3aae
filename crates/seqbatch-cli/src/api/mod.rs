//! Submission service clients
//!
//! HTTP adapters implementing [`crate::submit::SubmissionEndpoint`].

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::VirusSeqClient;
