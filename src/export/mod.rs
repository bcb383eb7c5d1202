//! Result export and terminal rendering.

use crate::filter::{Outcome, Tier};
use crate::scan::ScanResult;
use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Files written by one export.
#[derive(Debug)]
pub struct ExportPaths {
    pub dir: PathBuf,
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Write CSV and JSON snapshots into a fresh timestamped directory.
pub fn export_results(results: &[ScanResult]) -> Result<ExportPaths> {
    let dir = PathBuf::from(format!(
        "scan_results_{}",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let csv = dir.join("scan_results.csv");
    fs::write(&csv, render_csv(results)).with_context(|| format!("writing {}", csv.display()))?;

    let json = dir.join("scan_results.json");
    let body = serde_json::to_string_pretty(results).context("serializing results")?;
    fs::write(&json, body).with_context(|| format!("writing {}", json.display()))?;

    info!(dir = %dir.display(), results = results.len(), "results exported");
    Ok(ExportPaths { dir, csv, json })
}

fn render_csv(results: &[ScanResult]) -> String {
    let mut out = String::from(
        "ticker,date,tier,price,avg_volume,open_interest,expected_move,atm_delta,iv_rv_ratio,term_slope,win_rate,reason\n",
    );
    for result in results {
        let m = result.metrics.as_ref();
        let field = |v: Option<Decimal>| v.map(|d| d.to_string()).unwrap_or_default();
        // Unused Result from write!: String formatting cannot fail.
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            result.ticker,
            result.date,
            result.tier,
            field(m.map(|m| m.price)),
            field(m.map(|m| m.avg_volume)),
            field(m.map(|m| m.open_interest)),
            field(m.map(|m| m.expected_move)),
            field(m.map(|m| m.atm_delta)),
            field(m.and_then(|m| m.iv_rv_ratio())),
            field(m.map(|m| m.term_slope)),
            field(m.map(|m| m.win_rate)),
            csv_escape(result.error.as_deref().unwrap_or_default()),
        );
    }
    out
}

/// RFC 4180 quoting for free-text fields; error chains carry commas.
fn csv_escape(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Compact per-tier listing for terminal output.
pub fn render_list(results: &[ScanResult]) -> String {
    let mut out = String::new();
    for (tier, heading) in [
        (Tier::Tier1, "TIER 1"),
        (Tier::Tier2, "TIER 2"),
        (Tier::Rejected, "REJECTED"),
        (Tier::Error, "ERRORS"),
    ] {
        let bucket: Vec<&ScanResult> = results.iter().filter(|r| r.tier == tier).collect();
        if bucket.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{} ({})", heading, bucket.len());
        for result in bucket {
            let _ = writeln!(out, "  {}", summary_line(result));
        }
    }
    if out.is_empty() {
        out.push_str("no results\n");
    }
    out
}

fn summary_line(result: &ScanResult) -> String {
    if let Some(error) = &result.error {
        return format!("{:<6} {}", result.ticker, error);
    }
    let near: Vec<&str> = result
        .verdicts
        .iter()
        .filter(|v| v.outcome == Outcome::NearMiss)
        .map(|v| v.category.name())
        .collect();
    let fails: Vec<&str> = result
        .verdicts
        .iter()
        .filter(|v| v.outcome == Outcome::Fail)
        .map(|v| v.category.name())
        .collect();
    let mut line = format!("{:<6}", result.ticker);
    if let Some(m) = &result.metrics {
        let _ = write!(line, " ${}", m.price.round_dp(2));
        if let Some(ratio) = m.iv_rv_ratio() {
            let _ = write!(line, " iv/rv {}", ratio.round_dp(2));
        }
        let _ = write!(line, " move ${}", m.expected_move.round_dp(2));
    }
    if !fails.is_empty() {
        let _ = write!(line, " failed: {}", fails.join(", "));
    } else if !near.is_empty() {
        let _ = write!(line, " near: {}", near.join(", "));
    }
    if let Some(fly) = &result.iron_fly {
        let _ = write!(
            line,
            " fly {}/{} wings {}/{} credit {}",
            fly.short_put_strike,
            fly.short_call_strike,
            fly.long_put_strike,
            fly.long_call_strike,
            fly.net_credit.round_dp(2)
        );
    }
    line
}

/// Full criterion-by-criterion breakdown for a single ticker.
pub fn render_detailed(result: &ScanResult) -> String {
    let mut out = format!("{} [{}] {}\n", result.ticker, result.date, result.tier);
    if let Some(error) = &result.error {
        let _ = writeln!(out, "  error: {}", error);
        return out;
    }
    for verdict in &result.verdicts {
        let mark = match verdict.outcome {
            Outcome::Pass => "PASS",
            Outcome::NearMiss => "NEAR",
            Outcome::Fail => "FAIL",
        };
        let observed = verdict
            .observed
            .map(|d| d.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "  {:<14} {:<4} observed {:>12}  pass {:>10}  near {:>10}",
            verdict.category.name(),
            mark,
            observed,
            verdict.pass_threshold,
            verdict.near_miss_threshold
        );
    }
    if let Some(fly) = &result.iron_fly {
        let _ = writeln!(
            out,
            "  iron fly exp {}: short {}/{}, wings {}/{}, credit {}, max loss {}, BE {}..{}",
            fly.expiration,
            fly.short_put_strike,
            fly.short_call_strike,
            fly.long_put_strike,
            fly.long_call_strike,
            fly.net_credit.round_dp(2),
            fly.max_loss.round_dp(2),
            fly.lower_breakeven.round_dp(2),
            fly.upper_breakeven.round_dp(2)
        );
    }
    out
}
