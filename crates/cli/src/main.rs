//! Recaudit CLI - ingestion, reconciliation and audit ledger from the command line
//!
//! Usage:
//! ```bash
//! recaudit init --seed-catalogs
//! recaudit --user auditor ingest matriz.json --sheet Datos
//! recaudit reconcile 42
//! recaudit customer import clientes.json
//! recaudit customer set-email CUST006 ventas@andina.co
//! recaudit log list --limit 10
//! recaudit log show 7
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recaudit_business::{EngineConfig, ServiceContext};
use recaudit_core::{Attribution, StaticIdentity};
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod db;

use commands::{customer, ingest, log};

/// Recaudit - audited ingestion and reconciliation of Matrix records
#[derive(Parser)]
#[command(name = "recaudit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, env = "RECAUDIT_DB", default_value = "data/recaudit.db", global = true)]
    pub db: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, env = "RECAUDIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// User the operations are attributed to (SYSTEM when absent)
    #[arg(long, env = "RECAUDIT_USER", global = true)]
    pub user: Option<String>,

    /// Session token recorded with each operation
    #[arg(long, env = "RECAUDIT_SESSION", global = true)]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database with schema
    Init {
        /// Load the sample budget-line and bank-account catalogs
        #[arg(long)]
        seed_catalogs: bool,
    },

    /// Show database status
    Status,

    /// Bulk-ingest Matrix rows from a JSON array
    Ingest {
        /// JSON file with already-shaped rows
        file: PathBuf,
        /// Source file name recorded in the ledger (defaults to FILE)
        #[arg(long)]
        source_file: Option<String>,
        /// Sheet name recorded in the ledger
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Re-run reconciliation on a stored Matrix record
    Reconcile {
        /// Matrix record id
        id: i64,
    },

    /// Customer master rows
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },

    /// Audit ledger inspection
    Log {
        #[command(subcommand)]
        action: LogAction,
    },
}

#[derive(Subcommand)]
pub enum CustomerAction {
    /// Insert customers from a JSON array
    Import {
        file: PathBuf,
    },
    /// Change a customer's email
    SetEmail {
        code: String,
        email: String,
    },
    /// Delete a customer
    Delete {
        code: String,
    },
}

#[derive(Subcommand)]
pub enum LogAction {
    /// Most recent ledger entries
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// One ledger entry with its change details and validation errors
    Show {
        id: i64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to read config {:?}", path))?
            .with_env_overrides(|key| std::env::var(key).ok())?,
        None => EngineConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Ensure data directory exists
    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let attribution =
        Attribution::resolve(&StaticIdentity::new(cli.user.clone(), cli.session.clone()));
    debug!(user = %attribution, db = ?cli.db, "starting");

    match cli.command {
        Commands::Init { seed_catalogs } => {
            db::init_database(&cli.db, seed_catalogs).await?;
            println!("✅ Database initialized at {:?}", cli.db);
        }

        Commands::Status => {
            db::show_status(&cli.db).await?;
        }

        command => {
            let config = load_config(cli.config.as_ref())?;
            let database = db::open(&cli.db).await?;
            let ctx = ServiceContext::new(&database, config);

            match command {
                Commands::Ingest {
                    file,
                    source_file,
                    sheet,
                } => {
                    ingest::ingest(&ctx, &attribution, &file, source_file, sheet).await?;
                }
                Commands::Reconcile { id } => {
                    ingest::reconcile(&ctx, &attribution, id).await?;
                }
                Commands::Customer { action } => {
                    customer::handle(&ctx, &attribution, action).await?;
                }
                Commands::Log { action } => {
                    log::handle(&ctx, action).await?;
                }
                Commands::Init { .. } | Commands::Status => {}
            }

            ctx.pool().close().await;
        }
    }

    Ok(())
}
