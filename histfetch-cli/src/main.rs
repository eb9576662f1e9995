//! histfetch CLI: chunked history downloads and artifact tooling.
//!
//! Commands:
//! - `history`: fetch candles range by range into per-range JSON artifacts
//! - `quote`: print current quotes for up to 50 symbols
//! - `merge`: consolidate one symbol's artifacts into a CSV
//! - `failures`: list ranges recorded in the error log

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use histfetch_core::config::{Credentials, FetchConfig, DEFAULT_OUTPUT_DIR};
use histfetch_core::consolidate::{consolidate, default_output};
use histfetch_core::domain::{DateFormat, Resolution, Subject};
use histfetch_core::error_log::{ErrorLog, DEFAULT_ERROR_LOG};
use histfetch_core::fetch::{Fetcher, LogProgress, RangeOutcome};
use histfetch_core::fyers::FyersClient;
use histfetch_core::pacer::FixedDelay;
use histfetch_core::quote::QuoteRequest;
use histfetch_core::store::ArtifactStore;
use histfetch_core::CircuitBreaker;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "histfetch",
    about = "histfetch, chunked historical candle downloader for the Fyers API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download history for one or more symbols, one request per date range.
    History {
        /// Symbols to fetch (e.g., NSE:SBIN-EQ NSE:TCS-EQ). Overrides the config file.
        symbols: Vec<String>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Candle resolution (e.g., 1, 5, 60, D, 1min, 1day).
        #[arg(long)]
        resolution: Option<String>,

        /// Maximum days per request.
        #[arg(long)]
        chunk_days: Option<u32>,

        /// Start date (YYYY-MM-DD). Defaults to `--years` before the end date.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to yesterday.
        #[arg(long)]
        end: Option<String>,

        /// Span length in years when no start date is given.
        #[arg(long)]
        years: Option<u32>,

        /// Output directory for artifacts and the error log.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Pause after each request, in milliseconds.
        #[arg(long)]
        pause_ms: Option<u64>,

        /// Refetch ranges even if their artifact already exists.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Send range bounds as epoch seconds instead of YYYY-MM-DD.
        #[arg(long, default_value_t = false)]
        epoch_dates: bool,

        /// Print the run summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print current quotes.
    Quote {
        /// Symbols to quote (at most 50).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Path to a TOML config file (for base URL and timeout).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the raw quote records as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Merge a symbol's range artifacts into one CSV (IST timestamps).
    Merge {
        /// Symbol whose artifacts to merge.
        symbol: String,

        /// Resolution of the artifacts.
        #[arg(long, default_value = "1")]
        resolution: String,

        /// Directory holding the artifacts.
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// CSV path. Defaults to `{output_dir}/{SYMBOL}_{RESOLUTION}.csv`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List failed ranges from the error log.
    Failures {
        /// Directory holding the error log.
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Error log file name inside the output directory.
        #[arg(long, default_value = DEFAULT_ERROR_LOG)]
        error_log: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::History {
            symbols,
            config,
            resolution,
            chunk_days,
            start,
            end,
            years,
            output_dir,
            pause_ms,
            force,
            epoch_dates,
            json,
        } => {
            let mut fetch_config = load_config(config)?;
            if !symbols.is_empty() {
                fetch_config.symbols = symbols;
            }
            if let Some(resolution) = resolution {
                fetch_config.resolution = parse_resolution(&resolution)?;
            }
            if let Some(chunk_days) = chunk_days {
                fetch_config.chunk_days = chunk_days;
            }
            if let Some(start) = start {
                fetch_config.start = Some(parse_date(&start)?);
            }
            if let Some(end) = end {
                fetch_config.end = Some(parse_date(&end)?);
            }
            if let Some(years) = years {
                fetch_config.years = years;
            }
            if let Some(output_dir) = output_dir {
                fetch_config.output_dir = output_dir;
            }
            if let Some(pause_ms) = pause_ms {
                fetch_config.pause_ms = pause_ms;
            }
            if epoch_dates {
                fetch_config.date_format = DateFormat::Epoch;
            }
            run_history(&fetch_config, force, json)
        }
        Commands::Quote {
            symbols,
            config,
            json,
        } => run_quote(symbols, &load_config(config)?, json),
        Commands::Merge {
            symbol,
            resolution,
            output_dir,
            out,
        } => run_merge(&symbol, &resolution, output_dir, out),
        Commands::Failures {
            output_dir,
            error_log,
        } => run_failures(output_dir.join(error_log)),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<FetchConfig> {
    match path {
        Some(path) => FetchConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(FetchConfig::default()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn parse_resolution(s: &str) -> Result<Resolution> {
    Ok(s.parse()?)
}

fn build_client(config: &FetchConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<FyersClient> {
    let credentials = Credentials::from_env()?;
    Ok(FyersClient::new(
        credentials.client_config(config),
        circuit_breaker,
    )?)
}

fn run_history(config: &FetchConfig, force: bool, json: bool) -> Result<()> {
    if config.symbols.is_empty() {
        bail!("no symbols given: pass them as arguments or set `symbols` in the config file");
    }

    let today = chrono::Local::now().date_naive();
    let plan = config.plan(today, !force)?;
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = build_client(config, Arc::clone(&circuit_breaker))?;
    let store = ArtifactStore::new(&config.output_dir);
    let log = ErrorLog::new(config.error_log_path());
    let pacer = FixedDelay(config.pause());

    let summary = Fetcher {
        provider: &provider,
        store: &store,
        log: &log,
        pacer: &pacer,
        progress: &LogProgress,
    }
    .run(&plan)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if !summary.all_succeeded() {
        for report in summary.failures() {
            if let RangeOutcome::Failed { message } = &report.outcome {
                eprintln!("Error for {} {}: {message}", report.subject, report.range);
            }
        }
        eprintln!("{} range(s) failed; see {}", summary.failed, log.path().display());
        let cooldown = circuit_breaker.remaining_cooldown();
        if !cooldown.is_zero() {
            warn!(
                "provider blocked requests; wait {}s before rerunning",
                cooldown.as_secs()
            );
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_quote(symbols: Vec<String>, config: &FetchConfig, json: bool) -> Result<()> {
    let subjects = symbols
        .iter()
        .map(|s| Subject::new(s.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    let request = QuoteRequest::new(subjects)?;
    let client = build_client(config, Arc::new(CircuitBreaker::default_provider()))?;

    let records = client.quotes(&request)?;
    info!("received {} quote(s)", records.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let fmt_price = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"));

    println!(
        "{:<24} {:>10} {:>9} {:>8} {:>14}",
        "Symbol", "LTP", "Change", "Chg %", "Volume"
    );
    println!("{}", "-".repeat(69));
    let mut failed = 0;
    for record in &records {
        if !record.is_ok() {
            failed += 1;
            let reason = record.values.errmsg.as_deref().unwrap_or("unknown error");
            println!("{:<24} error: {reason}", record.symbol);
            continue;
        }
        let v = &record.values;
        println!(
            "{:<24} {:>10} {:>9} {:>8} {:>14}",
            record.symbol,
            fmt_price(v.lp),
            fmt_price(v.ch),
            fmt_price(v.chp),
            v.volume.map_or_else(|| "-".to_string(), |vol| format!("{vol:.0}")),
        );
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_merge(symbol: &str, resolution: &str, output_dir: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let subject = Subject::new(symbol)?;
    let resolution = parse_resolution(resolution)?;
    let store = ArtifactStore::new(output_dir);
    let output = out.unwrap_or_else(|| default_output(&store, &subject, resolution));

    let report = consolidate(&store, &subject, resolution, &output)?;
    println!(
        "Merged {} artifact(s) into {} ({} candles, {} duplicate(s) dropped)",
        report.artifacts,
        report.output.display(),
        report.candles,
        report.duplicates
    );
    Ok(())
}

fn run_failures(path: PathBuf) -> Result<()> {
    let log = ErrorLog::new(path);
    let entries = log.entries()?;

    if entries.is_empty() {
        println!("No failures recorded in {}", log.path().display());
        return Ok(());
    }

    println!("Error log: {}", log.path().display());
    println!("Failed ranges: {}", entries.len());
    println!();
    println!("{:<20} {:<24} {:<26} Message", "Logged", "Symbol", "Range");
    println!("{}", "-".repeat(90));
    for entry in &entries {
        println!(
            "{:<20} {:<24} {:<26} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.subject,
            entry.range.to_string(),
            entry.message
        );
    }
    Ok(())
}
