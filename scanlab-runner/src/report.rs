//! Plain-text watchlist reports.
//!
//! `format_report` is pure: the header date comes from the candidates'
//! `as_of` dates, never the wall clock, so identical input gives identical
//! text.

use scanlab_core::candidate::Candidate;
use scanlab_core::config::{ReportLayout, ReportStyle};

const RULE_WIDTH: usize = 70;

/// Render candidates in rank order. Empty input yields `style.empty_message`.
pub fn format_report(candidates: &[Candidate], style: &ReportStyle) -> String {
    if candidates.is_empty() {
        return style.empty_message.clone();
    }

    let mut report = match candidates.iter().map(|c| c.as_of).max() {
        Some(date) => format!("{} - {}\n", style.title, date.format("%d %B %Y")),
        None => format!("{}\n", style.title),
    };
    report.push_str(&"=".repeat(RULE_WIDTH));
    report.push_str("\n\n");

    for (i, c) in candidates.iter().enumerate() {
        let entry = match style.layout {
            ReportLayout::Overnight => overnight_entry(i + 1, c, style),
            ReportLayout::Swing => swing_entry(i + 1, c, style),
        };
        report.push_str(&entry);
        report.push('\n');
    }

    report.push_str(&style.footer_title);
    report.push('\n');
    for line in &style.footer {
        report.push_str(&format!("• {line}\n"));
    }
    report
}

fn overnight_entry(rank: usize, c: &Candidate, style: &ReportStyle) -> String {
    let cur = style.market.currency();
    let window = style.entry_window.as_deref().unwrap_or("At close");
    let mut entry = format!("{rank}. {}\n", c.symbol);
    entry.push_str(&format!(
        "   Price: {cur}{:.2} | Gain: {:+.2}%\n",
        c.price, c.snapshot.day_change_pct
    ));
    entry.push_str(&format!(
        "   Volume: {} | Near High: {:.0}%\n",
        ratio(c.indicators.volume_ratio),
        c.snapshot.high_proximity_pct
    ));
    entry.push_str(&format!(
        "   Sector: {} | Score: {:.0}/100\n",
        c.fundamentals.sector, c.raw_score
    ));
    entry.push_str(&format!("   Analysis: {}\n", c.reason));
    entry.push_str(&format!(
        "   Entry: {window} | Target: {cur}{:.2} ({:+.1}%)\n",
        c.target,
        c.target_pct()
    ));
    entry.push_str(&format!(
        "   Stop Loss: {cur}{:.2} ({:+.1}%)\n",
        c.stop_loss,
        c.stop_pct()
    ));
    entry
}

fn swing_entry(rank: usize, c: &Candidate, style: &ReportStyle) -> String {
    let cur = style.market.currency();
    let unit = style.market.market_cap_unit();
    let f = &c.fundamentals;

    let mut entry = format!(
        "{rank}. {} - {}\n   Price: {cur}{:.2} | Sector: {}",
        c.symbol,
        c.entry_type.as_str().to_uppercase(),
        c.price,
        f.sector
    );
    if c.sector_weight > 1.0 {
        entry.push_str(&format!(" (Weight: {}x)", c.sector_weight));
    }
    entry.push('\n');
    entry.push_str(&format!(
        "   RSI: {} | MACD: {} | Volume: {}\n",
        opt1(c.indicators.rsi),
        c.macd_bias(),
        ratio(c.indicators.volume_ratio)
    ));
    if let Some(p) = c.indicators.high_proximity {
        entry.push_str(&format!("   52W High: {p:.1}%\n"));
    }
    entry.push_str(&format!(
        "   ROE: {:.1}% | D/E: {:.2} | MCap: {cur}{:.0}{unit}\n",
        f.roe, f.debt_to_equity, f.market_cap
    ));
    entry.push_str(&format!(
        "   Target: {cur}{:.2} ({:+.1}%) | SL: {cur}{:.2} ({:+.1}%)\n",
        c.target,
        c.target_pct(),
        c.stop_loss,
        c.stop_pct()
    ));
    if (c.sector_weight - 1.0).abs() > f64::EPSILON {
        entry.push_str(&format!(
            "   Score: {:.0} (checklist {:.0}/100)\n",
            c.score, c.raw_score
        ));
    } else {
        entry.push_str(&format!("   Score: {:.0}/100\n", c.raw_score));
    }
    entry.push_str(&format!("   {}\n", c.reason));
    entry
}

fn opt1(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}

fn ratio(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}x"))
}
