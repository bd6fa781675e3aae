//! Configuration for the submission endpoint
//!
//! Values come from the environment (a `.env` file is loaded first) and can
//! be overridden by command-line flags.

use crate::error::{CliError, Result};
use std::time::Duration;

// ============================================================================
// Endpoint Configuration Constants
// ============================================================================

/// VirusSeq production submission service
pub const VIRUSSEQ_PRODUCTION_URL: &str = "https://muse.virusseq-dataportal.ca/";

/// VirusSeq development submission service
pub const VIRUSSEQ_DEV_URL: &str = "https://muse.dev.cancogen.cancercollaboratory.org/";

/// Default request timeout in seconds (5 minutes for large uploads)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default delay between two status polls of the same job
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Explicit base URL; takes precedence over the target's built-in URL
    pub api_url: Option<String>,

    /// Bearer token for the endpoint
    pub token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Delay between status polls
    pub poll_interval: Duration,
}

impl Config {
    /// Create a config with default values
    pub fn new() -> Self {
        Self {
            api_url: None,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(url) = std::env::var("SEQBATCH_API_URL") {
            if !url.trim().is_empty() {
                config.api_url = Some(url);
            }
        }

        if let Ok(token) = std::env::var("SEQBATCH_API_TOKEN") {
            if !token.trim().is_empty() {
                config.token = Some(token);
            }
        }

        if let Ok(secs) = std::env::var("SEQBATCH_API_TIMEOUT_SECS") {
            config.timeout = parse_secs("SEQBATCH_API_TIMEOUT_SECS", &secs)?;
        }

        if let Ok(secs) = std::env::var("SEQBATCH_POLL_INTERVAL_SECS") {
            config.poll_interval = parse_secs("SEQBATCH_POLL_INTERVAL_SECS", &secs)?;
        }

        Ok(config)
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(mut self, api_url: Option<String>, token: Option<String>) -> Self {
        if api_url.is_some() {
            self.api_url = api_url;
        }
        if token.is_some() {
            self.token = token;
        }
        self
    }

    /// Base URL to use, given the target's built-in default
    pub fn base_url<'a>(&'a self, default: &'a str) -> &'a str {
        self.api_url.as_deref().unwrap_or(default)
    }

    /// The token, or a configuration error naming how to supply one
    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            CliError::config(
                "No API token. Pass --token or set SEQBATCH_API_TOKEN (a .env file is read too)",
            )
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| CliError::config(format!("{name} must be a whole number of seconds, got '{value}'")))
}
