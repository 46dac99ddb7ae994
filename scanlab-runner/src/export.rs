//! CSV candidate rows and JSON scan summaries, returned as strings.
//!
//! Callers decide where the text goes; nothing here touches the filesystem.

use anyhow::{Context, Result};
use scanlab_core::candidate::Candidate;

use crate::pipeline::ScanOutcome;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a full scan summary to pretty JSON.
pub fn export_json(outcome: &ScanOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("failed to serialize ScanOutcome to JSON")
}

pub fn import_json(json: &str) -> Result<ScanOutcome> {
    serde_json::from_str(json).context("failed to deserialize ScanOutcome from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per candidate, in rank order.
///
/// Columns: date, symbol, price, sector, entry_type, rsi, volume_ratio,
/// high_52w_pct, roe_pct, debt_equity, target, stop_loss, score, raw_score,
/// sector_weight. Undefined indicator values are empty cells.
pub fn export_candidates_csv(candidates: &[Candidate]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "date",
        "symbol",
        "price",
        "sector",
        "entry_type",
        "rsi",
        "volume_ratio",
        "high_52w_pct",
        "roe_pct",
        "debt_equity",
        "target",
        "stop_loss",
        "score",
        "raw_score",
        "sector_weight",
    ])?;

    for c in candidates {
        wtr.write_record([
            &c.as_of.to_string(),
            &c.symbol,
            &format!("{:.2}", c.price),
            &c.fundamentals.sector,
            c.entry_type.as_str(),
            &cell(c.indicators.rsi, 1),
            &cell(c.indicators.volume_ratio, 2),
            &cell(c.indicators.high_proximity, 1),
            &format!("{:.1}", c.fundamentals.roe),
            &format!("{:.2}", c.fundamentals.debt_to_equity),
            &format!("{:.2}", c.target),
            &format!("{:.2}", c.stop_loss),
            &format!("{:.1}", c.score),
            &format!("{:.1}", c.raw_score),
            &format!("{}", c.sector_weight),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn cell(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(String::new, |v| format!("{v:.decimals$}"))
}
