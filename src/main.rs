//! # Evidence Harness CLI (`evh`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evh init` | Create the SQLite database and run schema migrations |
//! | `evh ingest <path>` | Load paper records (JSON array or JSON Lines) |
//! | `evh search "<query>"` | Search the local corpus only |
//! | `evh classify "<query>"` | Show the domain label and its source chain |
//! | `evh check "<query>"` | Run local search and print the sufficiency verdict |
//! | `evh resolve "<query>"` | Resolve locally, falling back to external sources |
//! | `evh sources` | List external sources and their routing |
//! | `evh serve` | Start the HTTP server |
//!
//! Logs go to stderr and are filtered by `EVH_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use evidence_harness::{
    config, ingest, inspect, migrate, orchestrator, search, server, sources,
};
use evidence_harness_core::Intent;

/// Evidence Harness: local-first research query resolution.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/evh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "evh",
    about = "Evidence Harness: local-first research query resolution",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/evh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest paper records from a JSON array or JSON Lines file.
    Ingest {
        path: PathBuf,

        /// Parse and count records without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the local corpus (never contacts external sources).
    Search {
        query: String,

        /// Maximum number of results (defaults to `[local].limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Classify a query into a subject domain.
    Classify { query: String },

    /// Run local search and report whether the results are sufficient.
    Check {
        query: String,

        /// search, gap_detection, evidence, citation, or synthesis.
        #[arg(long)]
        intent: Option<Intent>,
    },

    /// Resolve a query: local first, external sources only when needed.
    Resolve {
        query: String,

        /// search, gap_detection, evidence, citation, or synthesis.
        #[arg(long)]
        intent: Option<Intent>,

        /// Print the resolution as JSON.
        #[arg(long)]
        json: bool,

        /// Synthesize a cited answer from the merged evidence.
        #[arg(long)]
        answer: bool,
    },

    /// List external sources, whether enabled, and the labels routed to them.
    Sources,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EVH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, dry_run } => {
            ingest::run_ingest(&cfg, &path, dry_run).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Classify { query } => {
            inspect::run_classify(&cfg, &query)?;
        }
        Commands::Check { query, intent } => {
            inspect::run_check(&cfg, &query, intent).await?;
        }
        Commands::Resolve {
            query,
            intent,
            json,
            answer,
        } => {
            orchestrator::run_resolve(&cfg, &query, intent, json, answer).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
