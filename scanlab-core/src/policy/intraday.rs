//! Intraday (buy-today-sell-tomorrow) checklist.

use super::{sector_in, CriteriaPolicy, Evaluation, Scorecard};
use crate::candidate::EntryType;
use crate::config::{ConfigError, IntradayRules, PolicyConfig, PolicyRules};
use crate::domain::{Fundamentals, Snapshot};
use crate::indicators::EnrichedSeries;

#[derive(Debug, Clone)]
pub struct IntradayPolicy {
    config: PolicyConfig,
    rules: IntradayRules,
}

impl IntradayPolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let PolicyRules::Intraday(rules) = &config.rules else {
            return Err(ConfigError::invalid("rules.kind", "expected intraday rules"));
        };
        let rules = rules.clone();
        Ok(Self { config, rules })
    }

    pub fn rules(&self) -> &IntradayRules {
        &self.rules
    }
}

impl CriteriaPolicy for IntradayPolicy {
    fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn prefilter_snapshot(&self, snapshot: &Snapshot) -> bool {
        snapshot.day_change_pct >= self.rules.min_gain
    }

    fn evaluate(
        &self,
        snapshot: &Snapshot,
        series: &EnrichedSeries,
        fundamentals: &Fundamentals,
    ) -> Evaluation {
        let r = &self.rules;
        let gain = snapshot.day_change_pct;

        // 1. Gain band; below the band is a hard reject
        let mut card = Scorecard::default();
        if gain < r.min_gain {
            return Evaluation::rejected(format!("✗ Gain {gain:.1}% (below {}%)", r.min_gain));
        }
        if series.len() < self.config.min_history {
            return Evaluation::insufficient_data(series.len(), self.config.min_history);
        }
        if gain <= r.max_gain {
            card.award(
                r.gain_points.full,
                format!("✓ Gain {gain:.1}% (ideal {}-{}%)", r.min_gain, r.max_gain),
            );
        } else {
            card.award(
                r.gain_points.partial,
                format!("⚠ Gain {gain:.1}% (>{}%, may be overbought)", r.max_gain),
            );
        }

        let latest = series.latest().unwrap_or_default();

        // 2. Volume
        match latest.volume_ratio {
            Some(v) if v >= r.min_volume_ratio => {
                card.award(r.volume_points.full, format!("✓ Volume {v:.1}x average"))
            }
            Some(v) => card.award(
                r.volume_points.minimal,
                format!("⚠ Volume {v:.1}x (below {}x)", r.min_volume_ratio),
            ),
            None => card.not_evaluable("Volume"),
        }

        // 3. Position in today's range
        let prox = snapshot.high_proximity_pct;
        if prox >= r.high_proximity_strong {
            card.award(
                r.high_proximity_points.full,
                format!("✓ Closing near high ({prox:.0}%)"),
            );
        } else if prox >= r.high_proximity_fair {
            card.award(
                r.high_proximity_points.partial,
                format!("⚠ Near high ({prox:.0}%)"),
            );
        } else {
            card.award(
                r.high_proximity_points.minimal,
                format!("⚠ Not near high ({prox:.0}%)"),
            );
        }

        // 4. Trend
        let close = series.latest_bar().map(|b| b.close);
        match (close, latest.ema_short) {
            (Some(c), Some(ema)) if c > ema => {
                card.award(r.trend_points.full, "✓ Above short EMA (uptrend)")
            }
            (Some(_), Some(_)) => card.award(r.trend_points.minimal, "⚠ Below short EMA"),
            _ => card.not_evaluable("Trend"),
        }

        // 5. Sector
        let sector = fundamentals.sector.as_str();
        if !fundamentals.has_known_sector() {
            card.award(r.sector_points.minimal, "⚠ Sector unknown");
        } else if sector_in(sector, &r.excluded_sectors) {
            card.award(
                r.sector_points.minimal,
                format!("⚠ Excluded sector: {sector}"),
            );
        } else {
            card.award(r.sector_points.full, format!("✓ Sector: {sector}"));
        }

        let raw_score = card.points();
        Evaluation {
            passed: raw_score >= self.config.min_score,
            raw_score,
            score: raw_score,
            sector_weight: 1.0,
            entry_type: Some(EntryType::Btst),
            reasons: card.into_reasons(),
        }
    }
}
