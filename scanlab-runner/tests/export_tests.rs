//! Export tests: CSV rows from a real scan and JSON summary round-trip.

use chrono::NaiveDate;
use scanlab_core::config::PolicyConfig;
use scanlab_core::data::InMemorySource;
use scanlab_core::domain::{Fundamentals, PriceBar, Snapshot, TimeSeries};
use scanlab_core::policy::IntradayPolicy;
use scanlab_runner::{export_candidates_csv, export_json, import_json, ScanPipeline, ScanStage};

fn btst_source(symbol: &str) -> InMemorySource {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut volumes = vec![100_000u64; 29];
    volumes.push(187_913);
    let bars = (0..30)
        .map(|i| {
            let c = 100.0 + i as f64 * 0.2;
            PriceBar::new(base + chrono::Duration::days(i), c, c + 1.0, c - 1.0, c, volumes[i as usize])
        })
        .collect();

    InMemorySource::new()
        .with_snapshot(Snapshot::new(symbol, 102.5, 100.0, 102.625, 100.125, 100.0, 2_000_000))
        .with_series(TimeSeries::new(symbol, bars).unwrap())
        .with_fundamentals(Fundamentals {
            symbol: symbol.into(),
            market_cap: 10_000.0,
            pe_ratio: 18.0,
            debt_to_equity: 0.2,
            roe: 18.0,
            sector: "AUTO".into(),
            industry: "AUTO".into(),
        })
}

#[test]
fn csv_has_one_row_per_candidate() {
    let policy = IntradayPolicy::new(PolicyConfig::btst_india()).unwrap();
    let source = btst_source("TATAMOTORS");
    let pipeline = ScanPipeline::new(&policy, &source).unwrap();
    let outcome = pipeline.run(Some(&["TATAMOTORS".to_string()]), None).unwrap();

    let text = export_candidates_csv(&outcome.candidates).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "date,symbol,price,sector,entry_type,rsi,volume_ratio,high_52w_pct,roe_pct,\
         debt_equity,target,stop_loss,score,raw_score,sector_weight"
    );

    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(fields.len(), 15);
    assert_eq!(fields[0], "2024-01-30");
    assert_eq!(fields[1], "TATAMOTORS");
    assert_eq!(fields[2], "102.50");
    assert_eq!(fields[4], "btst");
    // no rolling-high indicator for this policy
    assert_eq!(fields[7], "");
    assert_eq!(fields[10], "104.55");
    assert_eq!(fields[11], "100.45");
    assert_eq!(fields[13], "100.0");
}

#[test]
fn json_summary_round_trips() {
    let policy = IntradayPolicy::new(PolicyConfig::btst_india()).unwrap();
    let source = btst_source("TATAMOTORS");
    let pipeline = ScanPipeline::new(&policy, &source).unwrap();
    let outcome = pipeline.run(Some(&["TATAMOTORS".to_string()]), None).unwrap();

    let json = export_json(&outcome).unwrap();
    assert!(json.contains("\"outcome\": \"passed\""));

    let restored = import_json(&json).unwrap();
    assert_eq!(restored.scan_id, outcome.scan_id);
    assert_eq!(restored.fingerprint, outcome.fingerprint);
    assert_eq!(restored.candidates.len(), 1);
    assert_eq!(restored.candidates[0].symbol, "TATAMOTORS");
    assert_eq!(restored.candidates[0].target, 104.55);
    assert_eq!(restored.outcomes, outcome.outcomes);
    assert_eq!(
        restored.stage(ScanStage::Ranked).map(|s| s.passed),
        Some(1)
    );
}

#[test]
fn malformed_json_is_an_error() {
    assert!(import_json("{ not json").is_err());
}
