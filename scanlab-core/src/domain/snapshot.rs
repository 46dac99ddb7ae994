//! Current-session snapshot and company fundamentals.

use serde::{Deserialize, Serialize};

use crate::candidate::round2;

/// A symbol's current-session aggregate.
///
/// `day_change_pct` and `high_proximity_pct` are derived once at construction
/// and rounded to two decimals, so band checks see the quoted figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub current_price: f64,
    pub day_open: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub previous_close: f64,
    pub volume: u64,
    /// Percent change from the previous close.
    pub day_change_pct: f64,
    /// Where the price sits inside today's range, 0 at the low and 100 at the high.
    pub high_proximity_pct: f64,
}

impl Snapshot {
    pub fn new(
        symbol: impl Into<String>,
        current_price: f64,
        day_open: f64,
        day_high: f64,
        day_low: f64,
        previous_close: f64,
        volume: u64,
    ) -> Self {
        let day_change_pct = if previous_close > 0.0 {
            round2((current_price - previous_close) / previous_close * 100.0)
        } else {
            0.0
        };
        let range = day_high - day_low;
        let high_proximity_pct = if range > 0.0 {
            round2((current_price - day_low) / range * 100.0)
        } else {
            0.0
        };
        Self {
            symbol: symbol.into(),
            current_price,
            day_open,
            day_high,
            day_low,
            previous_close,
            volume,
            day_change_pct,
            high_proximity_pct,
        }
    }
}

/// Sector label used when the provider has nothing for a symbol.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Company fundamentals as reported by the data source.
///
/// Units are market-specific: market cap is in crores for India and in
/// lakhs for Australia; ROE is a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub symbol: String,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub debt_to_equity: f64,
    pub roe: f64,
    pub sector: String,
    pub industry: String,
}

impl Fundamentals {
    /// Placeholder used when fundamentals are unavailable.
    ///
    /// Zero market cap and zero ROE fail every fundamental gate.
    pub fn placeholder(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            market_cap: 0.0,
            pe_ratio: 0.0,
            debt_to_equity: 0.0,
            roe: 0.0,
            sector: UNKNOWN_SECTOR.to_string(),
            industry: UNKNOWN_SECTOR.to_string(),
        }
    }

    pub fn has_known_sector(&self) -> bool {
        !self.sector.is_empty() && self.sector != UNKNOWN_SECTOR
    }
}
