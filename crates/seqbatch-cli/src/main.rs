//! seqbatch CLI - Main entry point

use clap::Parser;
use seqbatch_cli::{Cli, Commands};
use seqbatch_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Settings may live in a .env file
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Console plus a run log next to the output prefix; environment wins
    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    let mut builder = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .filter_directives("hyper=warn,reqwest=warn,h2=warn");
    if let Ok(prefix) = cli.command.output().prefix() {
        builder = builder
            .output(LogOutput::Both)
            .log_dir(prefix.dir())
            .log_file_prefix(prefix.log_file_prefix());
    }
    let log_config = builder.build();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // CLI should work without logging
    let log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "seqbatch started");

    // Execute command
    let result = execute_command(&cli).await;

    // Handle result
    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        drop(log_guard);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> seqbatch_cli::Result<()> {
    match &cli.command {
        Commands::Plan { output, plan } => {
            seqbatch_cli::commands::plan::run(output, plan)?;
            Ok(())
        }

        Commands::Submit {
            output,
            endpoint,
            submit,
        } => {
            seqbatch_cli::commands::submit::run(output, endpoint, submit).await?;
            Ok(())
        }

        Commands::Run {
            output,
            plan,
            endpoint,
            submit,
        } => seqbatch_cli::commands::run::run(output, plan, endpoint, submit).await,

        Commands::Status {
            output,
            remote,
            endpoint,
            max_errors,
        } => seqbatch_cli::commands::status::run(output, *remote, endpoint, *max_errors).await,
    }
}
