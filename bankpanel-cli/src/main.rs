//! bankpanel CLI: build the quarterly bank and macro panel artifacts.
//!
//! Commands:
//! - `fdic` — fetch FDIC filings for every active holding company and write
//!   the aggregated bank panel
//! - `fred` — fetch the configured FRED series and write the macro table
//! - `all` — `fdic` then `fred`
//! - `inspect` — print a panel's metadata and per-quarter totals
//! - `init-config` — write the default configuration as TOML

use anyhow::{bail, Context, Result};
use bankpanel_core::data::{
    load_api_key, quarterly_summary, FdicClient, FredClient, LogProgress, PanelMeta,
};
use bankpanel_runner::{
    run_fdic_pipeline, run_macro_pipeline, MacroSummary, PipelineConfig, RunSummary,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bankpanel",
    version,
    about = "Quarterly bank holding company panel from FDIC BankFind and FRED"
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory (overrides output.dir).
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Concurrent institution fetches (overrides pool.workers).
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Also write a CSV copy of the bank panel.
    #[arg(long, global = true, default_value_t = false)]
    csv: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the bank panel from FDIC BankFind.
    Fdic,
    /// Build the macro indicator table from FRED.
    Fred,
    /// Build both artifacts.
    All,
    /// Print metadata and per-quarter totals of a bank panel file.
    Inspect {
        /// Panel file. Defaults to the configured FDIC output.
        file: Option<PathBuf>,
    },
    /// Write the default configuration.
    InitConfig {
        /// Destination file.
        #[arg(default_value = "bankpanel.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::InitConfig { path, force } = &cli.command {
        return run_init_config(path, *force);
    }

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Fdic => run_fdic(&config).map(|_| ()),
        Commands::Fred => run_fred(&config).map(|_| ()),
        Commands::All => {
            run_fdic(&config)?;
            run_fred(&config)?;
            Ok(())
        }
        Commands::Inspect { file } => run_inspect(&file.unwrap_or_else(|| config.fdic_path())),
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.pool.workers = workers;
    }
    if cli.csv {
        config.output.csv = true;
    }
    config.validate()?;
    Ok(config)
}

fn run_fdic(config: &PipelineConfig) -> Result<RunSummary> {
    let client = FdicClient::new(
        config.fdic.base_url.as_str(),
        &config.transport_settings(),
        Arc::new(config.circuit_breaker()),
        Arc::new(config.throttle()),
    )?;

    let summary = run_fdic_pipeline(&client, config, &LogProgress::default())?;
    let manifest = summary.write_manifest()?;

    println!("Bank panel: {}", summary.panel_path.display());
    println!(
        "  institutions: {} ({} fetched, {} failed)",
        summary.institutions,
        summary.fetched,
        summary.failed()
    );
    println!(
        "  filings: {} ({} rejected, {} out of scope)",
        summary.raw_records,
        summary.rejected.len(),
        summary.out_of_scope_records
    );
    println!("  rows: {}", summary.panel.rows);
    if let (Some(start), Some(end)) = (summary.panel.start_date, summary.panel.end_date) {
        println!("  dates: {start} to {end}");
    }
    if let Some(csv) = &summary.csv_path {
        println!("  csv: {}", csv.display());
    }
    println!("  run manifest: {}", manifest.display());
    for failure in &summary.failures {
        eprintln!("  failed: {} ({}): {}", failure.name, failure.zip, failure.error);
    }
    Ok(summary)
}

fn run_fred(config: &PipelineConfig) -> Result<MacroSummary> {
    let api_key = load_api_key(config.fred.api_key_file.as_deref())
        .context("FRED needs an API key")?;
    let client = FredClient::new(
        config.fred.base_url.as_str(),
        api_key,
        &config.transport_settings(),
        Arc::new(config.circuit_breaker()),
        Arc::new(config.throttle()),
    )?;

    let summary = run_macro_pipeline(&client, config)?;
    let manifest = summary.write_manifest()?;

    println!("Macro table: {}", summary.table_path.display());
    println!(
        "  series: {}, observations: {} ({} missing)",
        summary.series, summary.observations, summary.missing_values
    );
    println!("  rows: {}", summary.table.rows);
    println!("  run manifest: {}", manifest.display());
    Ok(summary)
}

fn run_inspect(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("panel file not found: {}", path.display());
    }

    println!("Panel: {}", path.display());
    match PanelMeta::load(path)? {
        Some(meta) => {
            println!("Rows: {}", meta.rows);
            println!("Institutions: {}", meta.institutions);
            if let (Some(start), Some(end)) = (meta.start_date, meta.end_date) {
                println!("Dates: {start} to {end}");
            }
            println!("Hash: {}", meta.data_hash);
        }
        None => println!("(no metadata sidecar)"),
    }

    let summary = quarterly_summary(path)?;
    println!();
    println!("{:<6} {:<8} {:>8} {:>20}", "Year", "Quarter", "Rows", "Total assets");
    println!("{}", "-".repeat(45));
    for q in &summary {
        println!(
            "{:<6} {:<8} {:>8} {:>20.0}",
            q.year,
            format!("Q{}", q.quarter),
            q.rows,
            q.total_assets
        );
    }
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = PipelineConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
