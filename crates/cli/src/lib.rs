pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pricelens",
    about = "Pricelens operator CLI",
    long_about = "Resolve product names against the reference catalog, print synthesized price records, and inspect runtime readiness.",
    after_help = "Examples:\n  pricelens resolve \"iphone 16 pro\"\n  pricelens quote \"tata salt\" --category grocery --seed 7\n  pricelens doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Resolve a product name to its best catalog entry and score")]
    Resolve {
        query: String,
        #[arg(long, help = "Optional category hint used when no entry is confident")]
        category: Option<String>,
    },
    #[command(about = "Print a full price record with history and forecast")]
    Quote {
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, help = "Seed for a reproducible series")]
        seed: Option<u64>,
        #[arg(long, help = "Anchor date (YYYY-MM-DD); history ends at this month")]
        anchor: Option<NaiveDate>,
    },
    #[command(about = "Summarize the loaded catalog and its fingerprint")]
    Catalog,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog loading, and generative backend readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Resolve { query, category } => {
            commands::resolve::run(&query, category.as_deref())
        }
        Command::Quote { query, category, seed, anchor } => {
            commands::quote::run(&query, category.as_deref(), seed, anchor)
        }
        Command::Catalog => commands::catalog::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
