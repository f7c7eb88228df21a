//! barsync CLI: sync, status and configuration checks.
//!
//! Commands:
//! - `sync`: run one pass per configured table (or the `--only` subset)
//! - `status`: report row count and first/last timestamp per table
//! - `check-config`: validate the config file and credentials, touching
//!   neither the network nor the database

use anyhow::{bail, Context, Result};
use barsync_core::config::{SourceKind, StorageTarget, SyncConfig};
use barsync_core::data::{CsvSource, QuoteSource, YahooSource};
use barsync_core::store::open_store;
use barsync_core::sync::{run_sync, SyncJob};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "barsync.toml";

#[derive(Parser)]
#[command(
    name = "barsync",
    about = "barsync: incremental market-bar synchronization into SQL tables"
)]
struct Cli {
    /// Path to the TOML config. Defaults to ./barsync.toml, or the built-in
    /// ^FCHI → cac (daily) config when that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Env file holding DB_HOST, DB_PORT, DB_USER, DB_PASSWORD, DB_NAME.
    #[arg(long, global = true, default_value = ".env.local")]
    env_file: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring every configured table up to date.
    Sync {
        /// Only sync these tables.
        #[arg(long, num_args = 1..)]
        only: Vec<String>,
    },
    /// Report row count and stored range per configured table.
    Status,
    /// Validate the config and credentials without connecting anywhere.
    CheckConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);
    load_env_file(&cli.env_file)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync { only } => run_sync_cmd(&config, &only),
        Commands::Status => run_status(&config),
        Commands::CheckConfig => run_check_config(&config),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("barsync=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load credentials from the env file into the process environment. A missing
/// file is fine: the variables may already be set.
fn load_env_file(path: &Path) -> Result<()> {
    if !path.exists() {
        debug!(path = %path.display(), "no env file");
        return Ok(());
    }
    dotenvy::from_path(path).with_context(|| format!("failed to load {}", path.display()))?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let config = match path {
        Some(path) => SyncConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => SyncConfig::from_file(Path::new(DEFAULT_CONFIG))?,
        None => {
            info!("no {DEFAULT_CONFIG}, using built-in ^FCHI → cac (daily) config");
            SyncConfig::default_cac()
        }
    };
    Ok(config)
}

fn storage_target(config: &SyncConfig) -> Result<StorageTarget> {
    Ok(config.storage_target(|key| std::env::var(key).ok())?)
}

fn quote_source(config: &SyncConfig) -> Result<Box<dyn QuoteSource>> {
    let source: Box<dyn QuoteSource> = match config.source.kind {
        SourceKind::Yahoo => Box::new(YahooSource::new()?),
        SourceKind::Csv => {
            let Some(dir) = &config.source.dir else {
                bail!("source.dir is required for the csv source");
            };
            Box::new(CsvSource::new(dir))
        }
    };
    Ok(source)
}

fn select_jobs(config: &SyncConfig, only: &[String]) -> Result<Vec<SyncJob>> {
    let jobs = config.jobs()?;
    if only.is_empty() {
        return Ok(jobs);
    }
    for name in only {
        if !jobs.iter().any(|j| j.table.as_str() == name) {
            bail!("table '{name}' is not in the config");
        }
    }
    Ok(jobs
        .into_iter()
        .filter(|j| only.iter().any(|name| j.table.as_str() == name))
        .collect())
}

fn run_sync_cmd(config: &SyncConfig, only: &[String]) -> Result<()> {
    // Credentials and table names are checked before any fetch or write.
    let jobs = select_jobs(config, only)?;
    let target = storage_target(config)?;
    let source = quote_source(config)?;

    let mut store = open_store(&target).with_context(|| format!("failed to open {target}"))?;
    let now = chrono::Local::now().naive_local();
    let summary = run_sync(source.as_ref(), store.as_mut(), &jobs, now);

    for report in &summary.reports {
        match &report.result {
            Ok(outcome) => println!(
                "{:<20} {:<4} {}",
                report.job.table, report.job.interval, outcome
            ),
            Err(e) => eprintln!(
                "{:<20} {:<4} FAILED: {e}",
                report.job.table, report.job.interval
            ),
        }
    }

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(config: &SyncConfig) -> Result<()> {
    let jobs = config.jobs()?;
    let target = storage_target(config)?;
    let mut store = open_store(&target).with_context(|| format!("failed to open {target}"))?;

    println!("Store: {target}");
    println!("Ticker: {}", config.ticker);
    println!();
    println!(
        "{:<20} {:<4} {:>8}  {:<19}  {:<19}",
        "Table", "Int", "Rows", "First", "Last"
    );
    println!("{}", "-".repeat(76));

    for SyncJob { table, interval, .. } in &jobs {
        if !store.table_exists(table)? {
            println!("{table:<20} {interval:<4} {:>8}", "missing");
            continue;
        }
        let rows = store.row_count(table)?;
        let show = |t: Option<chrono::NaiveDateTime>| t.map_or_else(|| "-".to_string(), |t| t.to_string());
        let first = show(store.first_timestamp(table)?);
        let last = show(store.last_timestamp(table)?);
        println!("{table:<20} {interval:<4} {rows:>8}  {first:<19}  {last:<19}");
    }
    Ok(())
}

fn run_check_config(config: &SyncConfig) -> Result<()> {
    let jobs = config.jobs()?;
    let target = storage_target(config)?;
    quote_source(config)?;

    println!("Config OK");
    println!("  ticker:  {}", config.ticker);
    println!("  source:  {:?}", config.source.kind);
    println!("  store:   {target}");
    for job in &jobs {
        println!("  table:   {} ({})", job.table, job.interval);
    }
    Ok(())
}
