//! huginn — batch analysis CLI
//!
//! Analyzes a JSON file of records, inspects or clears the result cache and
//! reports accumulated spend from the cost ledger.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use huginn::cache::default_cache_path;
use huginn::ledger::default_ledger_path;
use huginn::{AnalyzableRecord, Config, CostLedger, ResultCache, Secrets, cancel_pair};
use tracing::warn;

/// Huginn batch analysis engine
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "AI batch analysis with a durable result cache")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, global = true, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a JSON array of records
    Analyze {
        /// Input file: [{"id": "...", "text": "..."}, ...]
        #[arg(short, long)]
        input: PathBuf,
        /// Write the id → result map here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ignore cached results and re-analyze everything
        #[arg(long)]
        force_refresh: bool,
        /// Use the offline mock provider
        #[arg(long)]
        mock: bool,
    },

    /// Inspect or clear the result cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Show accumulated cost per provider/model
    Ledger,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show entry count, size and age range
    Status,
    /// Delete every cached result
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: info; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Analyze {
            input,
            output,
            force_refresh,
            mock,
        } => {
            analyze(
                args.config.as_deref(),
                &input,
                output.as_deref(),
                force_refresh,
                mock,
            )
            .await?
        }
        Command::Cache { command } => {
            let config = load_optional_config(args.config.as_deref())?;
            let cache = ResultCache::open(
                config
                    .analysis
                    .cache_path
                    .clone()
                    .unwrap_or_else(default_cache_path),
            );
            match command {
                CacheCommand::Status => print_cache_status(&cache),
                CacheCommand::Clear { yes } => clear_cache(&cache, yes)?,
            }
        }
        Command::Ledger => {
            let config = load_optional_config(args.config.as_deref())?;
            let ledger = CostLedger::new(
                config
                    .analysis
                    .ledger_path
                    .clone()
                    .unwrap_or_else(default_ledger_path),
            );
            print_ledger(&ledger)?;
        }
    }

    Ok(())
}

async fn analyze(
    config_path: Option<&Path>,
    input: &Path,
    output: Option<&Path>,
    force_refresh: bool,
    mock: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let records: Vec<AnalyzableRecord> = serde_json::from_str(&std::fs::read_to_string(input)?)?;

    let builder = if mock {
        load_optional_config(config_path)?.offline_builder()
    } else {
        let config = Config::load(config_path)?;
        config.analyzer_builder(&Secrets::load()?)?
    };
    let analyzer = builder.build()?;

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing with the results obtained so far");
            handle.cancel();
        }
    });

    let outcome = analyzer
        .analyze_with_cancel(&records, force_refresh, &cancel)
        .await?;

    let ordered: BTreeMap<_, _> = outcome.results.iter().collect();
    let json = serde_json::to_string_pretty(&ordered)?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    eprint!("{}", outcome.summary);

    if outcome.summary.credentials_rejected {
        process::exit(1);
    }
    Ok(())
}

/// The config file is optional for commands that only need paths.
fn load_optional_config(explicit: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match Config::load(explicit) {
        Ok(config) => Ok(config),
        Err(e) if explicit.is_some() => Err(e.into()),
        Err(_) => Ok(Config::default()),
    }
}

fn print_cache_status(cache: &ResultCache) {
    let status = cache.status();
    println!("path: {}", status.path.display());
    println!("entries: {}", status.entry_count);
    println!("size: {} bytes", status.size_bytes);
    if let (Some(oldest), Some(newest)) = (status.oldest, status.newest) {
        println!("oldest: {oldest}");
        println!("newest: {newest}");
    }
    for (fingerprint, count) in &status.fingerprints {
        println!("  {fingerprint}: {count}");
    }
}

fn clear_cache(cache: &ResultCache, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let count = cache.len();
    if count == 0 {
        println!("cache is already empty");
        return Ok(());
    }
    if !yes {
        print!("delete {count} cached results from {}? [y/N] ", cache.path().display());
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("aborted");
            return Ok(());
        }
    }
    cache.clear()?;
    println!("cleared {count} entries");
    Ok(())
}

fn print_ledger(ledger: &CostLedger) -> Result<(), Box<dyn std::error::Error>> {
    let totals = ledger.totals()?;
    if totals.is_empty() {
        println!("no recorded calls in {}", ledger.path().display());
        return Ok(());
    }
    let mut grand_total = 0.0;
    for total in &totals {
        println!(
            "{}:{}  calls={} in={} out={} cost={:.4}",
            total.provider,
            total.model_name,
            total.calls,
            total.tokens_in,
            total.tokens_out,
            total.cost
        );
        grand_total += total.cost;
    }
    println!("total cost: {grand_total:.4}");
    Ok(())
}
