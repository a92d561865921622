//! ShipAMI CLI - AWS machine image lifecycle
//!
//! This is the main entry point for the shipami command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli).await {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::List(args) => commands::list::run(args, cli).await,
        Commands::Show(args) => commands::show::run(args, cli).await,
        Commands::Copy(args) => commands::copy::run(args, cli).await,
        Commands::Release(args) => commands::release::run(args, cli).await,
        Commands::Share(args) => commands::share::run(args, cli).await,
        Commands::Delete(args) => commands::delete::run(args, cli).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    // RUST_LOG wins over the flags when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("info"),
                1 => EnvFilter::new("debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    // Logs go to stderr; stdout carries image ids for scripting
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
