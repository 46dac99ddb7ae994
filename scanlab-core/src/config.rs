//! Policy configuration: thresholds, points, sector lists, target tables.
//!
//! A `PolicyConfig` is an immutable value: built from a preset or parsed from
//! TOML, validated once, then handed to `build_policy`. Nothing here is read
//! from ambient global state.
//!
//! Three presets ship with the crate (and as TOML under `policies/`):
//! - `btst_india()`: buy-today-sell-tomorrow on an intraday snapshot
//! - `swing_india()`: multi-day swing with fundamental gates and a preferred-sector bonus
//! - `swing_australia()`: the ASX swing variant with 52-week proximity and sector weights

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::candidate::{EntryType, TargetTable};
use crate::domain::Market;
use crate::indicators::{IndicatorParams, RollingHighParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse policy TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize policy TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("policy '{policy}' can emit entry type '{entry_type}' but has no target/stop for it")]
    UnmappedEntryType {
        policy: String,
        entry_type: EntryType,
    },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Tiered point values for one check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Points {
    /// Ideal condition.
    pub full: f64,
    /// Acceptable but weaker.
    #[serde(default)]
    pub partial: f64,
    /// Fails, but not disqualifying.
    #[serde(default)]
    pub minimal: f64,
}

impl Points {
    pub const fn new(full: f64, partial: f64, minimal: f64) -> Self {
        Self {
            full,
            partial,
            minimal,
        }
    }

    fn check(&self, field: &str) -> Result<(), ConfigError> {
        // partial = 0 means the check has no middle tier
        let ordered = self.full >= self.partial
            && self.full >= self.minimal
            && self.partial >= 0.0
            && self.minimal >= 0.0;
        if !ordered {
            return Err(ConfigError::invalid(
                field,
                format!(
                    "points must satisfy full >= partial, full >= minimal, all >= 0 (got {}/{}/{})",
                    self.full, self.partial, self.minimal
                ),
            ));
        }
        Ok(())
    }
}

/// Intraday (BTST) checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayRules {
    /// Day gain band in percent. Below `min_gain` rejects outright.
    pub min_gain: f64,
    pub max_gain: f64,
    /// full inside the band, partial above it.
    pub gain_points: Points,
    pub min_volume_ratio: f64,
    /// full at or above `min_volume_ratio`, minimal below.
    pub volume_points: Points,
    /// Position in today's range: full at `strong`, partial at `fair`, minimal otherwise.
    pub high_proximity_strong: f64,
    pub high_proximity_fair: f64,
    pub high_proximity_points: Points,
    /// full when close is above the short EMA, minimal otherwise.
    pub trend_points: Points,
    pub excluded_sectors: Vec<String>,
    /// full for a known, non-excluded sector.
    pub sector_points: Points,
}

/// Hard fundamental gates; any failure rejects with score 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundamentalGates {
    pub min_market_cap: f64,
    pub max_debt_to_equity: f64,
    pub min_roe: f64,
}

/// Momentum oscillator bands.
///
/// full inside `[ideal_low, ideal_high]`, partial in the pullback band
/// `(pullback_low, ideal_low)`, minimal above `ideal_high`, nothing otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumBand {
    pub ideal_low: f64,
    pub ideal_high: f64,
    pub pullback_low: f64,
    pub points: Points,
}

/// 52-week high proximity band: full inside, partial above, minimal below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighProximityBand {
    pub low: f64,
    pub high: f64,
    pub points: Points,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SectorAdjustment {
    /// Additive: full for a preferred sector, minimal otherwise.
    Bonus {
        preferred: Vec<String>,
        points: Points,
    },
    /// Multiplicative on the final score, applied after min-score gating.
    Weighted {
        weights: BTreeMap<String, f64>,
        #[serde(default = "default_weight")]
        default_weight: f64,
    },
}

fn default_weight() -> f64 {
    1.0
}

impl SectorAdjustment {
    pub fn weight_for(&self, sector: &str) -> f64 {
        match self {
            Self::Bonus { .. } => 1.0,
            Self::Weighted {
                weights,
                default_weight,
            } => {
                let sector = sector.trim();
                weights
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(sector))
                    .map_or(*default_weight, |(_, w)| *w)
            }
        }
    }

    fn full_points(&self) -> f64 {
        match self {
            Self::Bonus { points, .. } => points.full,
            Self::Weighted { .. } => 0.0,
        }
    }
}

/// Swing checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingRules {
    pub gates: FundamentalGates,
    /// Awarded once every gate passes.
    pub fundamentals_points: f64,
    /// full: close > short > medium > long; partial: close above short and medium.
    pub trend_points: Points,
    pub momentum: MomentumBand,
    /// Only checked when set; requires rolling-high indicator parameters.
    #[serde(default)]
    pub high_proximity: Option<HighProximityBand>,
    /// full: line above signal with positive histogram; partial: histogram rising.
    pub macd_points: Points,
    pub min_volume_ratio: f64,
    pub volume_points: Points,
    pub sector: SectorAdjustment,
    /// Breakout: close above short EMA by this factor with volume above `breakout_volume_ratio`.
    pub breakout_premium: f64,
    pub breakout_volume_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyRules {
    Intraday(IntradayRules),
    Swing(SwingRules),
}

/// Which price a candidate's levels are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// The snapshot's current price.
    Snapshot,
    /// The latest bar's close.
    LastClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLayout {
    Overnight,
    Swing,
}

/// Literal labels for the text report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStyle {
    pub layout: ReportLayout,
    pub market: Market,
    pub title: String,
    /// Returned verbatim when there are no candidates.
    pub empty_message: String,
    #[serde(default)]
    pub entry_window: Option<String>,
    pub footer_title: String,
    #[serde(default)]
    pub footer: Vec<String>,
}

/// Complete, immutable policy definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    pub market: Market,
    /// Minimum unweighted score to pass.
    pub min_score: f64,
    pub max_results: usize,
    /// Calendar days of history requested from the data source.
    pub lookback_days: u32,
    /// Bars required before evaluation; shorter series are rejected as insufficient data.
    pub min_history: usize,
    pub price_basis: PriceBasis,
    #[serde(default)]
    pub indicators: IndicatorParams,
    pub targets: TargetTable,
    pub rules: PolicyRules,
    pub report: ReportStyle,
}

impl PolicyConfig {
    /// Load a policy from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a policy from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "btst_india" => Some(Self::btst_india()),
            "swing_india" => Some(Self::swing_india()),
            "swing_australia" => Some(Self::swing_australia()),
            _ => None,
        }
    }

    /// Entry types this policy's rules can produce.
    pub fn emitted_entry_types(&self) -> &'static [EntryType] {
        match self.rules {
            PolicyRules::Intraday(_) => &[EntryType::Btst],
            PolicyRules::Swing(_) => &[
                EntryType::Pullback,
                EntryType::MacdCross,
                EntryType::Breakout,
                EntryType::MaCross,
                EntryType::TrendFollow,
            ],
        }
    }

    /// Sum of the full points across every check.
    pub fn max_points(&self) -> f64 {
        match &self.rules {
            PolicyRules::Intraday(r) => {
                r.gain_points.full
                    + r.volume_points.full
                    + r.high_proximity_points.full
                    + r.trend_points.full
                    + r.sector_points.full
            }
            PolicyRules::Swing(r) => {
                r.fundamentals_points
                    + r.trend_points.full
                    + r.momentum.points.full
                    + r.high_proximity.map_or(0.0, |hp| hp.points.full)
                    + r.macd_points.full
                    + r.volume_points.full
                    + r.sector.full_points()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        if self.max_results == 0 {
            return Err(ConfigError::invalid("max_results", "must be >= 1"));
        }
        if self.min_history < 2 {
            return Err(ConfigError::invalid(
                "min_history",
                "must be >= 2 (crossovers compare two bars)",
            ));
        }
        self.indicators.check()?;

        let max = self.max_points();
        if (max - 100.0).abs() > 1e-9 {
            return Err(ConfigError::invalid(
                "rules",
                format!("full points must sum to 100, got {max}"),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_score) {
            return Err(ConfigError::invalid("min_score", "must be within 0..=100"));
        }

        match &self.rules {
            PolicyRules::Intraday(r) => self.validate_intraday(r)?,
            PolicyRules::Swing(r) => self.validate_swing(r)?,
        }

        for &entry_type in self.emitted_entry_types() {
            if !self.targets.contains(entry_type) {
                return Err(ConfigError::UnmappedEntryType {
                    policy: self.name.clone(),
                    entry_type,
                });
            }
        }
        for (entry_type, m) in self.targets.entries() {
            if !(m.target > 0.0 && m.stop > 0.0 && m.stop < 1.0 && m.target > 1.0) {
                return Err(ConfigError::invalid(
                    format!("targets.{entry_type}"),
                    format!("need stop < 1 < target, got {}/{}", m.target, m.stop),
                ));
            }
        }
        Ok(())
    }

    fn validate_intraday(&self, r: &IntradayRules) -> Result<(), ConfigError> {
        if r.min_gain > r.max_gain {
            return Err(ConfigError::invalid(
                "rules.min_gain",
                format!("{} exceeds max_gain {}", r.min_gain, r.max_gain),
            ));
        }
        if r.high_proximity_fair > r.high_proximity_strong {
            return Err(ConfigError::invalid(
                "rules.high_proximity_fair",
                "must not exceed high_proximity_strong",
            ));
        }
        r.gain_points.check("rules.gain_points")?;
        r.volume_points.check("rules.volume_points")?;
        r.high_proximity_points.check("rules.high_proximity_points")?;
        r.trend_points.check("rules.trend_points")?;
        r.sector_points.check("rules.sector_points")
    }

    fn validate_swing(&self, r: &SwingRules) -> Result<(), ConfigError> {
        let m = &r.momentum;
        if !(m.pullback_low <= m.ideal_low && m.ideal_low <= m.ideal_high) {
            return Err(ConfigError::invalid(
                "rules.momentum",
                "need pullback_low <= ideal_low <= ideal_high",
            ));
        }
        if let Some(hp) = r.high_proximity {
            if hp.low > hp.high {
                return Err(ConfigError::invalid("rules.high_proximity", "low exceeds high"));
            }
            if self.indicators.rolling_high.is_none() {
                return Err(ConfigError::invalid(
                    "indicators.rolling_high",
                    "required when rules.high_proximity is set",
                ));
            }
            hp.points.check("rules.high_proximity.points")?;
        }
        if let SectorAdjustment::Weighted {
            weights,
            default_weight,
        } = &r.sector
        {
            if let Some((sector, w)) = weights.iter().find(|(_, w)| **w <= 0.0) {
                return Err(ConfigError::invalid(
                    format!("rules.sector.weights.{sector}"),
                    format!("weight must be positive, got {w}"),
                ));
            }
            if *default_weight <= 0.0 {
                return Err(ConfigError::invalid(
                    "rules.sector.default_weight",
                    "must be positive",
                ));
            }
        }
        if let SectorAdjustment::Bonus { points, .. } = &r.sector {
            points.check("rules.sector.points")?;
        }
        r.trend_points.check("rules.trend_points")?;
        m.points.check("rules.momentum.points")?;
        r.macd_points.check("rules.macd_points")?;
        r.volume_points.check("rules.volume_points")
    }

    /// Deterministic identity of this exact configuration.
    ///
    /// BLAKE3 over the canonical JSON form (struct field order, `BTreeMap` keys).
    pub fn fingerprint(&self) -> String {
        // Serialization of plain data cannot fail; fall back to Debug just in case.
        let canonical = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }

    // ── Presets ──────────────────────────────────────────────────────

    pub fn btst_india() -> Self {
        Self {
            name: "btst_india".into(),
            market: Market::India,
            min_score: 60.0,
            max_results: 10,
            lookback_days: 50,
            min_history: 2,
            price_basis: PriceBasis::Snapshot,
            indicators: IndicatorParams::default(),
            targets: TargetTable::new().with(EntryType::Btst, 1.02, 0.98),
            rules: PolicyRules::Intraday(IntradayRules {
                min_gain: 2.0,
                max_gain: 3.5,
                gain_points: Points::new(30.0, 15.0, 0.0),
                min_volume_ratio: 1.5,
                volume_points: Points::new(25.0, 0.0, 10.0),
                high_proximity_strong: 90.0,
                high_proximity_fair: 80.0,
                high_proximity_points: Points::new(20.0, 15.0, 5.0),
                trend_points: Points::new(15.0, 0.0, 5.0),
                excluded_sectors: strings(&["IT", "PHARMA"]),
                sector_points: Points::new(10.0, 0.0, 0.0),
            }),
            report: ReportStyle {
                layout: ReportLayout::Overnight,
                market: Market::India,
                title: "BTST OPPORTUNITIES".into(),
                empty_message: "No BTST candidates found today.".into(),
                entry_window: Some("Buy at 3:00-3:20 PM".into()),
                footer_title: "IMPORTANT REMINDERS:".into(),
                footer: strings(&[
                    "Enter positions between 3:00-3:20 PM",
                    "Exit in first 15 minutes next morning",
                    "Never hold if gap down - exit immediately",
                    "Max 2-3 BTST positions simultaneously",
                ]),
            },
        }
    }

    pub fn swing_india() -> Self {
        Self {
            name: "swing_india".into(),
            market: Market::India,
            min_score: 65.0,
            max_results: 15,
            lookback_days: 100,
            min_history: 50,
            price_basis: PriceBasis::LastClose,
            indicators: IndicatorParams::default(),
            targets: swing_targets(1.12, 1.10),
            rules: PolicyRules::Swing(SwingRules {
                gates: FundamentalGates {
                    min_market_cap: 5000.0,
                    max_debt_to_equity: 0.5,
                    min_roe: 15.0,
                },
                fundamentals_points: 20.0,
                trend_points: Points::new(20.0, 15.0, 5.0),
                momentum: MomentumBand {
                    ideal_low: 40.0,
                    ideal_high: 60.0,
                    pullback_low: 30.0,
                    points: Points::new(20.0, 15.0, 5.0),
                },
                high_proximity: None,
                macd_points: Points::new(15.0, 10.0, 0.0),
                min_volume_ratio: 1.2,
                volume_points: Points::new(15.0, 0.0, 5.0),
                sector: SectorAdjustment::Bonus {
                    preferred: strings(&[
                        "DEFENCE",
                        "CAPITAL GOODS",
                        "INFRASTRUCTURE",
                        "PSU BANKS",
                        "RENEWABLE ENERGY",
                    ]),
                    points: Points::new(10.0, 0.0, 5.0),
                },
                breakout_premium: 1.02,
                breakout_volume_ratio: 1.5,
            }),
            report: ReportStyle {
                layout: ReportLayout::Swing,
                market: Market::India,
                title: "SWING TRADING WATCHLIST".into(),
                empty_message: "No swing trading candidates found.".into(),
                entry_window: None,
                footer_title: "SWING TRADING TIPS:".into(),
                footer: swing_tips("Review positions daily after market close"),
            },
        }
    }

    pub fn swing_australia() -> Self {
        let weights: BTreeMap<String, f64> = [
            ("Materials", 1.2),
            ("Energy", 1.15),
            ("Financials", 1.0),
            ("Consumer Discretionary", 1.0),
            ("Industrials", 1.0),
            ("Information Technology", 0.8),
            ("Health Care", 0.9),
            ("Communication Services", 0.85),
            ("Consumer Staples", 0.95),
            ("Utilities", 0.9),
            ("Real Estate", 0.85),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            name: "swing_australia".into(),
            market: Market::Australia,
            min_score: 60.0,
            max_results: 15,
            lookback_days: 300,
            min_history: 50,
            price_basis: PriceBasis::LastClose,
            indicators: IndicatorParams::default().with_rolling_high(RollingHighParams::default()),
            targets: swing_targets(1.15, 1.12),
            rules: PolicyRules::Swing(SwingRules {
                gates: FundamentalGates {
                    min_market_cap: 50_000.0,
                    max_debt_to_equity: 1.0,
                    min_roe: 10.0,
                },
                fundamentals_points: 20.0,
                trend_points: Points::new(20.0, 15.0, 5.0),
                momentum: MomentumBand {
                    ideal_low: 35.0,
                    ideal_high: 65.0,
                    pullback_low: 30.0,
                    points: Points::new(20.0, 15.0, 5.0),
                },
                high_proximity: Some(HighProximityBand {
                    low: 85.0,
                    high: 98.0,
                    points: Points::new(15.0, 8.0, 5.0),
                }),
                macd_points: Points::new(15.0, 10.0, 0.0),
                min_volume_ratio: 1.2,
                volume_points: Points::new(10.0, 0.0, 5.0),
                sector: SectorAdjustment::Weighted {
                    weights,
                    default_weight: 1.0,
                },
                breakout_premium: 1.02,
                breakout_volume_ratio: 1.5,
            }),
            report: ReportStyle {
                layout: ReportLayout::Swing,
                market: Market::Australia,
                title: "ASX SWING TRADING WATCHLIST".into(),
                empty_message: "No Australian swing trading candidates found.".into(),
                entry_window: None,
                footer_title: "SWING TRADING TIPS:".into(),
                footer: swing_tips("Review positions daily after market close (4:00 PM AEST)"),
            },
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Breakout and generic entries share the trend target; pullbacks aim lower.
fn swing_targets(trend_target: f64, pullback_target: f64) -> TargetTable {
    TargetTable::new()
        .with(EntryType::Breakout, trend_target, 0.95)
        .with(EntryType::Pullback, pullback_target, 0.93)
        .with(EntryType::MacdCross, trend_target, 0.94)
        .with(EntryType::MaCross, trend_target, 0.94)
        .with(EntryType::TrendFollow, trend_target, 0.94)
}

fn swing_tips(review: &str) -> Vec<String> {
    vec![
        "Hold for 3-15 days".into(),
        "Book 50% at first target, trail rest".into(),
        "Exit ruthlessly if SL hit".into(),
        review.into(),
    ]
}
