use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eduhub::{AppConfig, Step};
use eduhub_core::DatabaseCore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eduhub")]
#[command(about = "EduHub learning-platform analytics on an embedded document database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run every step in order (default)
    All,
    /// Create the collections with their validators
    Setup,
    /// Clear the collections and insert the sample data
    Seed,
    /// Create, update and delete walkthrough
    Crud,
    /// Run the query and aggregation catalogue
    Queries,
    /// Remove duplicate emails, create indexes and compare query plans
    Indexes,
    /// Attempt invalid inserts and report how they are rejected
    Validate,
    /// Render the charts into images/
    Report,
}

impl Commands {
    fn steps(self) -> Vec<Step> {
        match self {
            Commands::All => Step::ALL.to_vec(),
            Commands::Setup => vec![Step::Setup],
            Commands::Seed => vec![Step::Seed],
            Commands::Crud => vec![Step::Crud],
            Commands::Queries => vec![Step::Queries],
            Commands::Indexes => vec![Step::Indexes],
            Commands::Validate => vec![Step::Validate],
            Commands::Report => vec![Step::Report],
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let steps = cli.command.unwrap_or(Commands::All).steps();
    let config = AppConfig::default();

    let db = DatabaseCore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database '{}' at {}",
            config.database_name,
            config.database_path.display()
        )
    })?;

    let names: Vec<_> = steps.iter().map(Step::name).collect();
    eduhub::run(&db, &config, &steps)
        .with_context(|| format!("Run of [{}] failed", names.join(", ")))?;

    db.close().context("Failed to flush database")?;
    Ok(())
}
