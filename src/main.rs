// ABOUTME: CLI entry point for pg2mysql
// ABOUTME: Parses commands, loads configuration and routes to handlers

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pg2mysql::commands;
use pg2mysql::config::Config;

#[derive(Parser)]
#[command(name = "pg2mysql")]
#[command(about = "Validate and copy PostgreSQL data into MySQL", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML (or .toml) configuration file
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report source rows the MySQL columns are too narrow for
    Validate,
    /// Copy rows missing from MySQL
    Migrate {
        /// Truncate each destination table before copying
        #[arg(long)]
        truncate: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Compare per-table row counts between PostgreSQL and MySQL
    Compare,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Validate => commands::validate(&config).await,
        Commands::Migrate { truncate, yes } => commands::migrate(&config, truncate, yes).await,
        Commands::Compare => commands::compare(&config).await,
    }
}
