//! `appview` operator CLI
//!
//! Opens the index database named by the configuration (or `--db`) and runs
//! one command against it.

use appview_core::logging_facility;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "appview")]
#[command(about = "Index preprint and review records into a relational store", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding `database.path`
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the schema and list applied migrations
    Migrate,
    /// Load newline-delimited JSON records through the batch engine
    Ingest(commands::ingest::IngestArgs),
    /// Number of stored records of one kind
    Count(commands::records::KindArgs),
    /// Page through stored record keys
    List(commands::records::ListArgs),
    /// Print one record as JSON
    Show(commands::records::UriArgs),
    /// Remove one record
    Delete(commands::records::UriArgs),
    /// Inspect the effective configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(cli.config.as_deref(), cli.db)?;
    logging_facility::init(config.log_profile);

    match cli.command {
        Commands::Migrate => commands::migrate::execute(&config),
        Commands::Ingest(args) => commands::ingest::execute(args, &config).await,
        Commands::Count(args) => commands::records::count(args, &config).await,
        Commands::List(args) => commands::records::list(args, &config).await,
        Commands::Show(args) => commands::records::show(args, &config).await,
        Commands::Delete(args) => commands::records::delete(args, &config).await,
        Commands::Config(args) => commands::config::execute(args, &config),
    }
}
