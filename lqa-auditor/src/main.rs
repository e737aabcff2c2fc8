//! lqa-auditor - localization audit maintenance CLI
//!
//! Subcommands:
//! - `recover`: run the score recovery pipeline on a saved model response
//! - `status`: show a stored audit job

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use lqa_auditor::db::{init_database_pool, SqliteAuditStore};
use lqa_auditor::models::AuditKind;
use lqa_auditor::recovery::{self, RecoveredBy};
use lqa_auditor::types::PersistenceStore;
use lqa_common::config::{resolve_root_folder, LoggingConfig, TomlConfig};

/// Command-line arguments for lqa-auditor
#[derive(Parser, Debug)]
#[command(name = "lqa-auditor")]
#[command(about = "Localization quality audit tools")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root data folder
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// SQLite database path (overrides configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recover an audit score from a raw model response
    Recover {
        /// Audit kind: comparison, standalone, proficiency or image-set
        #[arg(long, value_parser = parse_kind)]
        kind: AuditKind,

        /// File holding the response, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },

    /// Print a stored audit job as JSON
    Status {
        #[arg(long)]
        id: Uuid,
    },
}

fn parse_kind(value: &str) -> std::result::Result<AuditKind, String> {
    AuditKind::parse(value).ok_or_else(|| format!("unknown audit kind '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting lqa-auditor v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.command {
        Command::Recover { kind, input } => recover(kind, &input),
        Command::Status { id } => {
            let db_path = match &args.database {
                Some(path) => path.clone(),
                None => {
                    let root = resolve_root_folder(args.root_folder.as_deref(), &config);
                    config.database_path(&root)
                }
            };
            status(&db_path, id).await
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn recover(kind: AuditKind, input: &Path) -> Result<()> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };

    let expected = recovery::expected_dimensions(kind);
    match recovery::extract_with_diagnostics(&raw, expected) {
        Ok(extraction) => {
            match extraction.recovered_by {
                RecoveredBy::Json { source, transform } => info!(
                    source = source.as_str(),
                    transform = transform.as_str(),
                    attempts = extraction.attempts.len(),
                    "Recovered from JSON candidate"
                ),
                RecoveredBy::Regex { matched } => info!(
                    matched,
                    expected = expected.len(),
                    "Recovered by pattern matching"
                ),
            }
            println!("{}", serde_json::to_string_pretty(&extraction.score)?);
            Ok(())
        }
        Err(exhausted) => {
            tracing::warn!(summary = %exhausted.summary(), "Recovery failed");
            Err(exhausted.into())
        }
    }
}

async fn status(db_path: &Path, id: Uuid) -> Result<()> {
    info!(database = %db_path.display(), "Opening audit store");
    let pool = init_database_pool(db_path)
        .await
        .context("Failed to open database")?;
    let store = SqliteAuditStore::new(pool);

    let Some(job) = store.load(id).await? else {
        bail!("Audit not found: {id}");
    };

    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
