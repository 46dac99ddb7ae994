//! ScanLab Runner — scan orchestration and reporting.
//!
//! This crate builds on `scanlab-core` to provide:
//! - The staged scan pipeline with per-symbol outcomes and funnel counts
//! - Ranking and truncation of candidates
//! - Plain-text watchlist reports per market
//! - CSV and JSON export of scan results

pub mod export;
pub mod pipeline;
pub mod report;

pub use pipeline::{
    run_scan, ScanError, ScanOutcome, ScanPipeline, ScanStage, StageCount, SymbolOutcome,
};
pub use export::{export_candidates_csv, export_json, import_json};
pub use report::format_report;
