#![deny(missing_docs)]

//! # Testsync CLI
//!
//! Command Line Interface for the OpenAPI test synchronizer.
//!
//! Supported Commands:
//! - `sync`: Contract -> generated test files (create, update, skip, flag obsolete).

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliResult;

mod error;
mod sync;

#[derive(Parser, Debug)]
#[clap(author, version, about = "OpenAPI test suite synchronizer")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize a test directory with an OpenAPI contract.
    Sync(sync::SyncArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing();

    match &cli.command {
        Commands::Sync(args) => sync::execute(args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_structure() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
