//! Earnings Vol Scanner - Main Entry Point

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use earnings_vol_scanner::config::Config;
use earnings_vol_scanner::error::ScanError;
use earnings_vol_scanner::export::{export_results, render_detailed, render_list};
use earnings_vol_scanner::filter::Tier;
use earnings_vol_scanner::provider::YahooClient;
use earnings_vol_scanner::scan::{ScanMode, ScanOrchestrator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Earnings Vol Scanner CLI
#[derive(Parser)]
#[command(name = "earnings-vol-scanner")]
#[command(version, about = "Scan earnings reporters for volatility-crush candidates")]
struct Cli {
    /// Explicit tickers to scan instead of the earnings calendar
    tickers: Vec<String>,

    /// Evaluation date (MM/DD/YYYY), default: next reporting window
    #[arg(short, long)]
    date: Option<String>,

    /// Deep-dive a single ticker: every criterion with its thresholds
    #[arg(short, long, value_name = "TICKER")]
    analyze: Option<String>,

    /// Compact per-tier listing only, no per-ticker breakdowns
    #[arg(short, long)]
    list: bool,

    /// Price an iron fly for every Tier 1 / Tier 2 candidate
    #[arg(short = 'f', long)]
    iron_fly: bool,

    /// Concurrent fetch workers (overrides config)
    #[arg(short, long, value_name = "N")]
    parallel: Option<usize>,

    /// Repeat the scan every N hours until interrupted
    #[arg(long, value_name = "HOURS")]
    forever: Option<u64>,

    /// Path to a config file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Skip writing the CSV/JSON export directory
    #[arg(long)]
    no_export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(parallel) = cli.parallel {
        config.scan.max_workers = parallel;
    }
    config.validate()?;

    let date = cli.date.as_deref().map(parse_date).transpose()?;
    let mode = ScanMode {
        iron_fly: cli.iron_fly,
    };

    let provider = Arc::new(YahooClient::new(&config.provider)?);
    let orchestrator = ScanOrchestrator::new(provider, &config)?;

    if let Some(ticker) = &cli.analyze {
        return run_analyze(&orchestrator, ticker, date, mode).await;
    }
    if let Some(hours) = cli.forever {
        return run_forever(&orchestrator, hours, mode, &cli).await;
    }
    run_scan(&orchestrator, date, mode, &cli).await
}

/// Single-ticker deep dive.
async fn run_analyze(
    orchestrator: &ScanOrchestrator,
    ticker: &str,
    date: Option<NaiveDate>,
    mode: ScanMode,
) -> Result<()> {
    let date = match date {
        Some(d) => d,
        None => orchestrator.universe(None).await?.0,
    };
    let result = orchestrator
        .analyze(&ticker.to_uppercase(), date, mode)
        .await;
    print!("{}", render_detailed(&result));
    Ok(())
}

/// One full scan run.
async fn run_scan(
    orchestrator: &ScanOrchestrator,
    date: Option<NaiveDate>,
    mode: ScanMode,
    cli: &Cli,
) -> Result<()> {
    let (date, tickers) = resolve_universe(orchestrator, date, &cli.tickers).await?;
    if tickers.is_empty() {
        warn!("empty ticker universe, nothing to scan");
        return Ok(());
    }
    info!(date = %date, universe = tickers.len(), "🔍 scanning");

    let results = orchestrator.scan(&tickers, date, mode).await;
    print!("{}", render_list(&results));
    if !cli.list {
        for result in &results {
            if matches!(result.tier, Tier::Tier1 | Tier::Tier2) {
                print!("{}", render_detailed(result));
            }
        }
    }
    if !cli.no_export {
        let paths = export_results(&results)?;
        println!("exported to {}", paths.dir.display());
    }
    Ok(())
}

/// Repeating mode: rescan on an interval until Ctrl-C.
async fn run_forever(
    orchestrator: &ScanOrchestrator,
    hours: u64,
    mode: ScanMode,
    cli: &Cli,
) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!("shutdown requested, finishing current iteration");
        flag.store(true, Ordering::SeqCst);
    });

    info!(hours, "🔁 repeating scan mode");
    let export = !cli.no_export;
    orchestrator
        .scan_forever(hours, mode, shutdown, |date, results| {
            println!("=== scan for {} ===", date);
            print!("{}", render_list(results));
            if export {
                match export_results(results) {
                    Ok(paths) => println!("exported to {}", paths.dir.display()),
                    Err(err) => error!(error = %err, "export failed"),
                }
            }
        })
        .await;
    Ok(())
}

async fn resolve_universe(
    orchestrator: &ScanOrchestrator,
    date: Option<NaiveDate>,
    explicit: &[String],
) -> Result<(NaiveDate, Vec<String>)> {
    if explicit.is_empty() {
        return Ok(orchestrator.universe(date).await?);
    }
    let (post, _) = earnings_vol_scanner::scan::dates::resolve(date, chrono::Utc::now());
    let tickers = explicit.iter().map(|t| t.to_uppercase()).collect();
    Ok((post, tickers))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .map_err(|_| ScanError::MalformedInput(format!("expected MM/DD/YYYY, got '{raw}'")))
        .context("invalid --date")
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "earnings-vol-scanner.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("earnings_vol_scanner=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_us_format() {
        assert_eq!(
            parse_date("03/20/2025").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()
        );
    }

    #[test]
    fn test_parse_date_rejects_iso_and_garbage() {
        assert!(parse_date("2025-03-20").is_err());
        assert!(parse_date("13/45/2025").is_err());
        assert!(parse_date("soon").is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "earnings-vol-scanner",
            "AAPL",
            "msft",
            "--date",
            "03/20/2025",
            "--iron-fly",
            "--parallel",
            "8",
            "--list",
        ]);
        assert_eq!(cli.tickers, vec!["AAPL", "msft"]);
        assert_eq!(cli.date.as_deref(), Some("03/20/2025"));
        assert!(cli.iron_fly);
        assert_eq!(cli.parallel, Some(8));
        assert!(cli.list);
        assert!(cli.analyze.is_none());
        assert!(cli.forever.is_none());
    }
}
