//! Report formatting tests: fixed labels, currency per market, determinism.

use chrono::NaiveDate;
use scanlab_core::candidate::{Candidate, EntryType};
use scanlab_core::config::PolicyConfig;
use scanlab_core::domain::{Fundamentals, Market, Snapshot};
use scanlab_core::indicators::IndicatorRow;
use scanlab_runner::format_report;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fundamentals(symbol: &str, sector: &str, market_cap: f64, de: f64, roe: f64) -> Fundamentals {
    Fundamentals {
        symbol: symbol.into(),
        market_cap,
        pe_ratio: 20.0,
        debt_to_equity: de,
        roe,
        sector: sector.into(),
        industry: sector.into(),
    }
}

fn btst_candidate() -> Candidate {
    Candidate {
        symbol: "TATAMOTORS".into(),
        market: Market::India,
        as_of: date(2024, 1, 5),
        price: 102.5,
        snapshot: Snapshot::new("TATAMOTORS", 102.5, 100.0, 102.625, 100.125, 100.0, 2_000_000),
        indicators: IndicatorRow {
            ema_short: Some(101.2),
            volume_ratio: Some(1.8),
            ..IndicatorRow::default()
        },
        fundamentals: fundamentals("TATAMOTORS", "AUTO", 250_000.0, 0.9, 12.0),
        raw_score: 100.0,
        score: 100.0,
        sector_weight: 1.0,
        entry_type: EntryType::Btst,
        target: 104.55,
        stop_loss: 100.45,
        reason: "✓ Gain 2.5% (ideal 2-3.5%); ✓ Volume 1.8x average".into(),
    }
}

fn asx_candidate(symbol: &str, sector: &str, weight: f64, as_of: NaiveDate) -> Candidate {
    Candidate {
        symbol: symbol.into(),
        market: Market::Australia,
        as_of,
        price: 45.2,
        snapshot: Snapshot::new(symbol, 45.5, 45.0, 45.8, 44.9, 45.1, 900_000),
        indicators: IndicatorRow {
            rsi: Some(52.34),
            macd: Some(0.41),
            macd_signal: Some(0.3),
            macd_hist: Some(0.11),
            volume_ratio: Some(1.26),
            high_proximity: Some(91.27),
            ..IndicatorRow::default()
        },
        fundamentals: fundamentals(symbol, sector, 1_250_000.0, 0.35, 18.5),
        raw_score: 80.0,
        score: 80.0 * weight,
        sector_weight: weight,
        entry_type: EntryType::Breakout,
        target: 51.98,
        stop_loss: 42.94,
        reason: "✓ Above all MAs (strong uptrend)".into(),
    }
}

#[test]
fn empty_reports_are_fixed_sentences() {
    for (config, expected) in [
        (PolicyConfig::btst_india(), "No BTST candidates found today."),
        (PolicyConfig::swing_india(), "No swing trading candidates found."),
        (
            PolicyConfig::swing_australia(),
            "No Australian swing trading candidates found.",
        ),
    ] {
        let text = format_report(&[], &config.report);
        assert_eq!(text, expected);
        assert!(!text.is_empty());
    }
}

#[test]
fn overnight_layout() {
    let style = PolicyConfig::btst_india().report;
    let text = format_report(&[btst_candidate()], &style);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "BTST OPPORTUNITIES - 05 January 2024");
    assert_eq!(lines[1], "=".repeat(70));
    assert_eq!(lines[2], "");
    assert_eq!(lines[3], "1. TATAMOTORS");
    assert_eq!(lines[4], "   Price: ₹102.50 | Gain: +2.50%");
    assert_eq!(lines[5], "   Volume: 1.8x | Near High: 95%");
    assert_eq!(lines[6], "   Sector: AUTO | Score: 100/100");
    assert_eq!(
        lines[7],
        "   Analysis: ✓ Gain 2.5% (ideal 2-3.5%); ✓ Volume 1.8x average"
    );
    assert_eq!(
        lines[8],
        "   Entry: Buy at 3:00-3:20 PM | Target: ₹104.55 (+2.0%)"
    );
    assert_eq!(lines[9], "   Stop Loss: ₹100.45 (-2.0%)");
    assert_eq!(lines[10], "");
    assert_eq!(lines[11], "IMPORTANT REMINDERS:");
    assert_eq!(lines[12], "• Enter positions between 3:00-3:20 PM");
    assert_eq!(lines.len(), 16);
}

#[test]
fn swing_layout_shows_weight_and_52w_line() {
    let style = PolicyConfig::swing_australia().report;
    let c = asx_candidate("BHP", "Materials", 1.2, date(2024, 3, 8));
    let text = format_report(&[c], &style);

    assert!(text.starts_with("ASX SWING TRADING WATCHLIST - 08 March 2024\n"));
    assert!(text.contains("1. BHP - BREAKOUT\n"));
    assert!(text.contains("   Price: A$45.20 | Sector: Materials (Weight: 1.2x)\n"));
    assert!(text.contains("   RSI: 52.3 | MACD: bullish | Volume: 1.3x\n"));
    assert!(text.contains("   52W High: 91.3%\n"));
    assert!(text.contains("   ROE: 18.5% | D/E: 0.35 | MCap: A$1250000L\n"));
    assert!(text.contains("   Target: A$51.98 (+15.0%) | SL: A$42.94 (-5.0%)\n"));
    assert!(text.contains("   Score: 96 (checklist 80/100)\n"));
    assert!(text.ends_with("• Review positions daily after market close (4:00 PM AEST)\n"));
}

#[test]
fn swing_layout_omits_weight_at_or_below_one() {
    let style = PolicyConfig::swing_australia().report;
    let c = asx_candidate("CSL", "Health Care", 0.9, date(2024, 3, 8));
    let text = format_report(&[c], &style);
    assert!(text.contains("   Price: A$45.20 | Sector: Health Care\n"));
    assert!(!text.contains("Weight"));
}

#[test]
fn india_swing_without_rolling_high_has_no_52w_line() {
    let style = PolicyConfig::swing_india().report;
    let mut c = asx_candidate("LT", "CAPITAL GOODS", 1.0, date(2024, 3, 8));
    c.market = Market::India;
    c.indicators.high_proximity = None;
    c.indicators.rsi = None;
    let text = format_report(&[c], &style);
    assert!(!text.contains("52W High"));
    assert!(text.contains("RSI: n/a"));
    assert!(text.contains("MCap: ₹1250000Cr"));
    assert!(text.contains("   Score: 80/100\n"));
    assert!(text.starts_with("SWING TRADING WATCHLIST - 08 March 2024\n"));
}

#[test]
fn header_uses_latest_as_of_date_and_is_deterministic() {
    let style = PolicyConfig::swing_australia().report;
    let candidates = vec![
        asx_candidate("BHP", "Materials", 1.2, date(2024, 3, 7)),
        asx_candidate("WDS", "Energy", 1.15, date(2024, 3, 8)),
    ];
    let first = format_report(&candidates, &style);
    let second = format_report(&candidates, &style);
    assert_eq!(first, second);
    assert!(first.starts_with("ASX SWING TRADING WATCHLIST - 08 March 2024\n"));

    let bhp = first.find("1. BHP").unwrap();
    let wds = first.find("2. WDS").unwrap();
    assert!(bhp < wds);
}
