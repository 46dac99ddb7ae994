//! ScanLab Core — domain types, indicators, criteria policies, candidate model.
//!
//! This crate holds everything a scan needs that does no I/O:
//! - Domain types (price bars, series, snapshots, fundamentals, markets)
//! - Indicator engine producing aligned, warmup-masked series
//! - Data-driven criteria policies (intraday and swing checklists)
//! - Target/stop table and the candidate record
//! - The market data collaborator trait

pub mod candidate;
pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod policy;
