pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "puddle",
    about = "Puddle marketplace operator CLI",
    long_about = "Apply migrations, load the marketplace seed catalog, inspect configuration and backfill dataset embeddings.",
    after_help = "Examples:\n  puddle migrate\n  puddle seed\n  puddle config\n  puddle reindex --batch-size 50"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the deterministic marketplace seed catalog")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Compute and store embeddings for discoverable datasets that lack one")]
    Reindex {
        #[arg(long, default_value_t = commands::reindex::DEFAULT_BATCH_SIZE)]
        batch_size: u32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Reindex { batch_size } => commands::reindex::run(batch_size),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
