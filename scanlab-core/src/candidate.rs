//! Candidate model — entry types, the target/stop table, and the result record.
//!
//! Target and stop-loss are never set freehand: they come from a per-policy
//! `TargetTable` keyed by `EntryType`, applied to the reference price and
//! rounded to two decimals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{Fundamentals, Market, Snapshot};
use crate::indicators::IndicatorRow;

/// Classification of the trading setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Buy near today's close, sell tomorrow.
    Btst,
    Pullback,
    MacdCross,
    Breakout,
    MaCross,
    TrendFollow,
}

impl EntryType {
    pub const ALL: [EntryType; 6] = [
        EntryType::Btst,
        EntryType::Pullback,
        EntryType::MacdCross,
        EntryType::Breakout,
        EntryType::MaCross,
        EntryType::TrendFollow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Btst => "btst",
            Self::Pullback => "pullback",
            Self::MacdCross => "macd_cross",
            Self::Breakout => "breakout",
            Self::MaCross => "ma_cross",
            Self::TrendFollow => "trend_follow",
        }
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown entry type '{s}'"))
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandidateError {
    #[error("no target/stop multipliers for entry type '{0}'")]
    UnmappedEntryType(EntryType),
    #[error("{symbol}: passing evaluation carries no entry type")]
    Unclassified { symbol: String },
}

/// (target, stop) multipliers for one entry type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    pub target: f64,
    pub stop: f64,
}

/// Target and stop-loss prices derived from a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub target: f64,
    pub stop_loss: f64,
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixed lookup from entry type to multipliers.
///
/// Serialized as a map keyed by the entry type's snake_case label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Multipliers>",
    into = "BTreeMap<String, Multipliers>"
)]
pub struct TargetTable(BTreeMap<EntryType, Multipliers>);

impl TryFrom<BTreeMap<String, Multipliers>> for TargetTable {
    type Error = String;

    fn try_from(raw: BTreeMap<String, Multipliers>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(k, v)| Ok((k.parse::<EntryType>()?, v)))
            .collect::<Result<BTreeMap<_, _>, String>>()
            .map(Self)
    }
}

impl From<TargetTable> for BTreeMap<String, Multipliers> {
    fn from(table: TargetTable) -> Self {
        table
            .0
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entry_type: EntryType, target: f64, stop: f64) -> Self {
        self.0.insert(entry_type, Multipliers { target, stop });
        self
    }

    pub fn get(&self, entry_type: EntryType) -> Option<Multipliers> {
        self.0.get(&entry_type).copied()
    }

    pub fn contains(&self, entry_type: EntryType) -> bool {
        self.0.contains_key(&entry_type)
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntryType, Multipliers)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Apply the multipliers for `entry_type` to `price`.
    ///
    /// An entry type missing from the table is a configuration defect and
    /// always errors; there is no default pair.
    pub fn levels(&self, entry_type: EntryType, price: f64) -> Result<PriceLevels, CandidateError> {
        let m = self
            .get(entry_type)
            .ok_or(CandidateError::UnmappedEntryType(entry_type))?;
        Ok(PriceLevels {
            target: round2(price * m.target),
            stop_loss: round2(price * m.stop),
        })
    }
}

/// A symbol that passed its policy, with derived trade levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub market: Market,
    /// Date of the latest bar the evaluation used.
    pub as_of: NaiveDate,
    /// Reference price the levels were derived from.
    pub price: f64,
    pub snapshot: Snapshot,
    pub indicators: IndicatorRow,
    pub fundamentals: Fundamentals,
    /// Unweighted checklist score, always at or above the policy minimum.
    pub raw_score: f64,
    /// Ranking score: `raw_score * sector_weight`.
    pub score: f64,
    pub sector_weight: f64,
    pub entry_type: EntryType,
    pub target: f64,
    pub stop_loss: f64,
    pub reason: String,
}

impl Candidate {
    /// Upside to target in percent.
    pub fn target_pct(&self) -> f64 {
        pct_from(self.price, self.target)
    }

    /// Downside to stop in percent (negative).
    pub fn stop_pct(&self) -> f64 {
        pct_from(self.price, self.stop_loss)
    }

    /// "bullish" when the MACD line sits above its signal.
    pub fn macd_bias(&self) -> &'static str {
        match (self.indicators.macd, self.indicators.macd_signal) {
            (Some(m), Some(s)) if m > s => "bullish",
            (Some(_), Some(_)) => "bearish",
            _ => "n/a",
        }
    }

    /// Close above short EMA above medium EMA.
    pub fn ema_aligned(&self) -> bool {
        match (self.indicators.ema_short, self.indicators.ema_medium) {
            (Some(s), Some(m)) => self.price > s && s > m,
            _ => false,
        }
    }
}

fn pct_from(price: f64, level: f64) -> f64 {
    if price > 0.0 {
        (level / price - 1.0) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swing_table() -> TargetTable {
        TargetTable::new()
            .with(EntryType::Breakout, 1.12, 0.95)
            .with(EntryType::Pullback, 1.10, 0.93)
            .with(EntryType::TrendFollow, 1.12, 0.94)
    }

    #[test]
    fn levels_are_rounded_products() {
        let levels = swing_table().levels(EntryType::Pullback, 123.45).unwrap();
        assert_eq!(levels.target, 135.8); // 135.795 → 135.8
        assert_eq!(levels.stop_loss, 114.81); // 114.8085 → 114.81
    }

    #[test]
    fn unknown_entry_type_fails_loudly() {
        let err = swing_table().levels(EntryType::MacdCross, 100.0).unwrap_err();
        assert_eq!(err, CandidateError::UnmappedEntryType(EntryType::MacdCross));
        assert!(err.to_string().contains("macd_cross"));
    }

    #[test]
    fn round2_half_away_from_zero() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn table_serializes_with_snake_case_keys() {
        let json = serde_json::to_string(&swing_table()).unwrap();
        assert!(json.contains("\"trend_follow\""));
        let back: TargetTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, swing_table());
    }

    #[test]
    fn unknown_key_rejected_on_load() {
        let err = serde_json::from_str::<TargetTable>(r#"{"moonshot":{"target":2.0,"stop":0.5}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("moonshot"));
    }

    #[test]
    fn entry_type_labels() {
        assert_eq!(EntryType::MaCross.to_string(), "ma_cross");
        assert_eq!(EntryType::ALL.len(), 6);
        for e in EntryType::ALL {
            assert_eq!(e.as_str().parse::<EntryType>().unwrap(), e);
        }
    }
}
