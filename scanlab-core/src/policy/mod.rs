//! Criteria policies — market-specific rule sets over snapshot, indicators and fundamentals.
//!
//! One pipeline serves every market; the differences live in `PolicyConfig`
//! data and in the two checklist shapes implemented here:
//! - `IntradayPolicy`: gain band, volume, range position, trend, excluded sectors
//! - `SwingPolicy`: fundamental gates, trend, momentum, optional 52-week
//!   proximity, MACD, volume, sector bonus or weight, entry-type classification
//!
//! Evaluation is pure: no I/O, no interior state, identical inputs give
//! identical output. Undefined indicator values make a check *not evaluable*:
//! it awards nothing and says so in the rationale.

pub mod intraday;
pub mod swing;

pub use intraday::IntradayPolicy;
pub use swing::SwingPolicy;

use serde::{Deserialize, Serialize};

use crate::candidate::{EntryType, TargetTable};
use crate::config::{ConfigError, PolicyConfig, PolicyRules, PriceBasis};
use crate::domain::{Fundamentals, Snapshot};
use crate::indicators::EnrichedSeries;

/// Outcome of evaluating one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub passed: bool,
    /// Unweighted checklist total; 0 on a hard rejection.
    pub raw_score: f64,
    /// `raw_score * sector_weight`.
    pub score: f64,
    pub sector_weight: f64,
    /// Always set when `passed`.
    pub entry_type: Option<EntryType>,
    pub reasons: Vec<String>,
}

impl Evaluation {
    /// Hard rejection: score 0, no entry type.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            raw_score: 0.0,
            score: 0.0,
            sector_weight: 1.0,
            entry_type: None,
            reasons: vec![reason.into()],
        }
    }

    pub fn insufficient_data(bars: usize, required: usize) -> Self {
        Self::rejected(format!("insufficient data ({bars} of {required} bars)"))
    }

    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Read-only rule set applied to every symbol in a scan.
pub trait CriteriaPolicy: Send + Sync {
    fn config(&self) -> &PolicyConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Stage-1 gate over the snapshot alone.
    fn prefilter_snapshot(&self, snapshot: &Snapshot) -> bool;

    /// Cheap gate over fundamentals, run before history is requested.
    fn prefilter_fundamentals(&self, _fundamentals: &Fundamentals) -> bool {
        true
    }

    fn evaluate(
        &self,
        snapshot: &Snapshot,
        series: &EnrichedSeries,
        fundamentals: &Fundamentals,
    ) -> Evaluation;

    fn targets(&self) -> &TargetTable {
        &self.config().targets
    }

    /// Price the trade levels are derived from.
    fn reference_price(&self, snapshot: &Snapshot, series: &EnrichedSeries) -> Option<f64> {
        match self.config().price_basis {
            PriceBasis::Snapshot => Some(snapshot.current_price),
            PriceBasis::LastClose => series.latest_bar().map(|b| b.close),
        }
    }
}

/// Validate a config and build the matching policy.
pub fn build_policy(config: PolicyConfig) -> Result<Box<dyn CriteriaPolicy>, ConfigError> {
    Ok(match config.rules {
        PolicyRules::Intraday(_) => Box::new(IntradayPolicy::new(config)?),
        PolicyRules::Swing(_) => Box::new(SwingPolicy::new(config)?),
    })
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Running total plus rationale lines.
#[derive(Debug, Default)]
pub(crate) struct Scorecard {
    points: f64,
    reasons: Vec<String>,
}

impl Scorecard {
    pub(crate) fn award(&mut self, points: f64, reason: impl Into<String>) {
        self.points += points;
        self.reasons.push(reason.into());
    }

    pub(crate) fn not_evaluable(&mut self, check: &str) {
        self.reasons.push(format!("{check} n/a (insufficient history)"));
    }

    pub(crate) fn points(&self) -> f64 {
        self.points
    }

    pub(crate) fn into_reasons(self) -> Vec<String> {
        self.reasons
    }
}

pub(crate) fn sector_in(sector: &str, list: &[String]) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(sector.trim()))
}
