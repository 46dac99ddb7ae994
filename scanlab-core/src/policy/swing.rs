//! Swing checklist with hard fundamental gates and entry-type classification.
//!
//! Entry type, first match wins:
//! 1. momentum in the pullback band → `pullback`
//! 2. fresh MACD histogram crossover on the latest bar → `macd_cross`
//! 3. close above short EMA by the breakout premium with heavy volume → `breakout`
//! 4. short EMA newly above medium EMA → `ma_cross`
//! 5. otherwise → `trend_follow`

use super::{sector_in, CriteriaPolicy, Evaluation, Scorecard};
use crate::candidate::EntryType;
use crate::config::{ConfigError, PolicyConfig, PolicyRules, SectorAdjustment, SwingRules};
use crate::domain::{Fundamentals, Snapshot};
use crate::indicators::{EnrichedSeries, IndicatorRow};

#[derive(Debug, Clone)]
pub struct SwingPolicy {
    config: PolicyConfig,
    rules: SwingRules,
}

impl SwingPolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let PolicyRules::Swing(rules) = &config.rules else {
            return Err(ConfigError::invalid("rules.kind", "expected swing rules"));
        };
        let rules = rules.clone();
        Ok(Self { config, rules })
    }

    pub fn rules(&self) -> &SwingRules {
        &self.rules
    }

    /// First failing gate, as a rejection reason.
    fn gate_failure(&self, f: &Fundamentals) -> Option<String> {
        let g = &self.rules.gates;
        let market = self.config.market;
        if f.market_cap < g.min_market_cap {
            return Some(format!(
                "Market cap too small: {}{:.0} {}",
                market.currency(),
                f.market_cap,
                market.market_cap_unit()
            ));
        }
        if f.debt_to_equity > g.max_debt_to_equity {
            return Some(format!("High debt: D/E {:.2}", f.debt_to_equity));
        }
        if f.roe < g.min_roe {
            return Some(format!("Low ROE: {:.1}%", f.roe));
        }
        None
    }

    fn score_trend(&self, card: &mut Scorecard, close: f64, row: &IndicatorRow) {
        let p = &self.rules.trend_points;
        match (row.ema_short, row.ema_medium, row.sma_long) {
            (Some(s), Some(m), Some(l)) if close > s && s > m && m > l => {
                card.award(p.full, "✓ Above all MAs (strong uptrend)")
            }
            (Some(s), Some(m), _) if close > s && close > m => {
                card.award(p.partial, "⚠ Above short/medium EMA (moderate trend)")
            }
            (Some(_), Some(_), _) => card.award(p.minimal, "⚠ Not in clear uptrend"),
            _ => card.not_evaluable("Trend"),
        }
    }

    /// Returns true when momentum sits in the pullback band.
    fn score_momentum(&self, card: &mut Scorecard, row: &IndicatorRow) -> bool {
        let band = &self.rules.momentum;
        let Some(rsi) = row.rsi else {
            card.not_evaluable("RSI");
            return false;
        };
        if (band.ideal_low..=band.ideal_high).contains(&rsi) {
            card.award(band.points.full, format!("✓ RSI {rsi:.1} (ideal range)"));
            false
        } else if rsi > band.pullback_low && rsi < band.ideal_low {
            card.award(band.points.partial, format!("✓ RSI {rsi:.1} (pullback zone)"));
            true
        } else if rsi > band.ideal_high {
            card.award(
                band.points.minimal,
                format!("⚠ RSI {rsi:.1} (approaching overbought)"),
            );
            false
        } else {
            card.award(0.0, format!("⚠ RSI {rsi:.1}"));
            false
        }
    }

    fn score_high_proximity(&self, card: &mut Scorecard, row: &IndicatorRow) {
        let Some(band) = self.rules.high_proximity else {
            return;
        };
        match row.high_proximity {
            Some(p) if (band.low..=band.high).contains(&p) => {
                card.award(band.points.full, format!("✓ Near 52W high ({p:.1}%)"))
            }
            Some(p) if p > band.high => {
                card.award(band.points.partial, format!("⚠ At 52W high ({p:.1}%)"))
            }
            Some(p) => card.award(band.points.minimal, format!("⚠ 52W high prox: {p:.1}%")),
            None => card.not_evaluable("52W high"),
        }
    }

    fn score_macd(&self, card: &mut Scorecard, series: &EnrichedSeries, row: &IndicatorRow) {
        let p = &self.rules.macd_points;
        let prev_hist = series.previous().and_then(|r| r.macd_hist);
        match (row.macd, row.macd_signal, row.macd_hist) {
            (Some(line), Some(signal), Some(hist)) if line > signal && hist > 0.0 => {
                if series.fresh_macd_cross() {
                    card.award(p.full, "✓ MACD bullish (fresh crossover)")
                } else {
                    card.award(p.full, "✓ MACD bullish")
                }
            }
            (Some(_), Some(_), Some(hist)) if prev_hist.is_some_and(|prev| hist > prev) => {
                card.award(p.partial, "⚠ MACD improving")
            }
            (Some(_), Some(_), Some(_)) => card.award(p.minimal, "⚠ MACD bearish"),
            _ => card.not_evaluable("MACD"),
        }
    }

    fn score_volume(&self, card: &mut Scorecard, row: &IndicatorRow) {
        let p = &self.rules.volume_points;
        match row.volume_ratio {
            Some(v) if v >= self.rules.min_volume_ratio => {
                card.award(p.full, format!("✓ Volume {v:.1}x average"))
            }
            Some(v) => card.award(p.minimal, format!("⚠ Volume {v:.1}x")),
            None => card.not_evaluable("Volume"),
        }
    }

    /// Additive sector points; returns the multiplicative weight.
    fn score_sector(&self, card: &mut Scorecard, fundamentals: &Fundamentals) -> f64 {
        let sector = fundamentals.sector.as_str();
        match &self.rules.sector {
            SectorAdjustment::Bonus { preferred, points } => {
                if !fundamentals.has_known_sector() {
                    card.award(0.0, "⚠ Sector unknown");
                } else if sector_in(sector, preferred) {
                    card.award(points.full, format!("✓ Preferred sector: {sector}"));
                } else {
                    card.award(points.minimal, format!("Sector: {sector}"));
                }
                1.0
            }
            adjustment @ SectorAdjustment::Weighted { .. } => {
                let weight = adjustment.weight_for(sector);
                if weight > 1.0 {
                    card.award(0.0, format!("Sector: {sector} (weight: {weight}x)"));
                } else {
                    card.award(0.0, format!("Sector: {sector}"));
                }
                weight
            }
        }
    }

    fn classify(&self, series: &EnrichedSeries, close: f64, row: &IndicatorRow, pullback: bool) -> EntryType {
        if pullback {
            return EntryType::Pullback;
        }
        if series.fresh_macd_cross() {
            return EntryType::MacdCross;
        }
        let breakout = match (row.ema_short, row.volume_ratio) {
            (Some(ema), Some(vol)) => {
                close > ema * self.rules.breakout_premium && vol > self.rules.breakout_volume_ratio
            }
            _ => false,
        };
        if breakout {
            return EntryType::Breakout;
        }
        if series.ma_cross() {
            return EntryType::MaCross;
        }
        EntryType::TrendFollow
    }
}

impl CriteriaPolicy for SwingPolicy {
    fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn prefilter_snapshot(&self, snapshot: &Snapshot) -> bool {
        snapshot.current_price > 0.0
    }

    fn prefilter_fundamentals(&self, f: &Fundamentals) -> bool {
        let g = &self.rules.gates;
        f.market_cap >= g.min_market_cap && f.debt_to_equity <= g.max_debt_to_equity
    }

    fn evaluate(
        &self,
        _snapshot: &Snapshot,
        series: &EnrichedSeries,
        fundamentals: &Fundamentals,
    ) -> Evaluation {
        let (Some(bar), Some(row)) = (series.latest_bar(), series.latest()) else {
            return Evaluation::insufficient_data(0, self.config.min_history);
        };
        if series.len() < self.config.min_history {
            return Evaluation::insufficient_data(series.len(), self.config.min_history);
        }
        if let Some(reason) = self.gate_failure(fundamentals) {
            return Evaluation::rejected(reason);
        }

        let market = self.config.market;
        let mut card = Scorecard::default();
        card.award(
            self.rules.fundamentals_points,
            format!(
                "✓ Fundamentals: MCap {}{:.0} {}, D/E {:.2}, ROE {:.1}%",
                market.currency(),
                fundamentals.market_cap,
                market.market_cap_unit(),
                fundamentals.debt_to_equity,
                fundamentals.roe
            ),
        );

        let close = bar.close;
        self.score_trend(&mut card, close, &row);
        let pullback = self.score_momentum(&mut card, &row);
        self.score_high_proximity(&mut card, &row);
        self.score_macd(&mut card, series, &row);
        self.score_volume(&mut card, &row);
        let weight = self.score_sector(&mut card, fundamentals);

        let raw_score = card.points();
        Evaluation {
            passed: raw_score >= self.config.min_score,
            raw_score,
            score: raw_score * weight,
            sector_weight: weight,
            entry_type: Some(self.classify(series, close, &row, pullback)),
            reasons: card.into_reasons(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorParams;
    use crate::policy::testkit::{enrich, fundamentals, snapshot};

    fn india() -> SwingPolicy {
        SwingPolicy::new(PolicyConfig::swing_india()).unwrap()
    }

    fn australia() -> SwingPolicy {
        SwingPolicy::new(PolicyConfig::swing_australia()).unwrap()
    }

    fn strong_fundamentals(sector: &str) -> Fundamentals {
        fundamentals(sector, 80_000.0, 0.3, 22.0)
    }

    /// Steady uptrend with a sawtooth so RSI lands mid-range.
    fn sawtooth_uptrend(n: usize) -> (Vec<f64>, Vec<u64>) {
        let closes = (0..n)
            .map(|i| 100.0 + i as f64 * 0.3 + if i % 2 == 0 { 0.0 } else { -0.9 })
            .collect();
        (closes, vec![500_000; n])
    }

    fn snap() -> Snapshot {
        snapshot(150.0, 149.0, 151.0, 148.0)
    }

    #[test]
    fn gates_short_circuit_with_named_metric() {
        let (closes, volumes) = sawtooth_uptrend(220);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        let p = india();

        let small = p.evaluate(&snap(), &series, &fundamentals("DEFENCE", 1200.0, 0.1, 30.0));
        assert!(!small.passed);
        assert_eq!(small.raw_score, 0.0);
        assert_eq!(small.reason(), "Market cap too small: ₹1200 Cr");

        let debt = p.evaluate(&snap(), &series, &fundamentals("DEFENCE", 9000.0, 0.8, 30.0));
        assert_eq!(debt.reason(), "High debt: D/E 0.80");

        let roe = p.evaluate(&snap(), &series, &fundamentals("DEFENCE", 9000.0, 0.1, 9.5));
        assert_eq!(roe.reason(), "Low ROE: 9.5%");
    }

    #[test]
    fn placeholder_fundamentals_never_pass() {
        let (closes, volumes) = sawtooth_uptrend(220);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        let eval = india().evaluate(&snap(), &series, &Fundamentals::placeholder("TEST"));
        assert!(!eval.passed);
        assert!(eval.reason().starts_with("Market cap too small"));
    }

    #[test]
    fn insufficient_history_rejected() {
        let (closes, volumes) = sawtooth_uptrend(49);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        let eval = india().evaluate(&snap(), &series, &strong_fundamentals("DEFENCE"));
        assert!(!eval.passed);
        assert_eq!(eval.reason(), "insufficient data (49 of 50 bars)");
    }

    #[test]
    fn strong_uptrend_scores_full_trend_points() {
        let (closes, volumes) = sawtooth_uptrend(220);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        let eval = india().evaluate(&snap(), &series, &strong_fundamentals("DEFENCE"));
        assert!(eval.reasons.iter().any(|r| r.contains("Above all MAs")));
        assert!(eval.reasons.iter().any(|r| r.contains("Preferred sector")));
        assert!(eval.entry_type.is_some());
    }

    #[test]
    fn undefined_long_average_falls_to_moderate_tier() {
        // 120 bars: EMAs defined, SMA200 not
        let (closes, volumes) = sawtooth_uptrend(120);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        assert!(series.latest().unwrap().sma_long.is_none());
        let eval = india().evaluate(&snap(), &series, &strong_fundamentals("DEFENCE"));
        assert!(eval.reasons.iter().any(|r| r.contains("moderate trend")));
    }

    #[test]
    fn pullback_band_classifies_pullback() {
        // Long rise then a measured pullback puts RSI in (30, 40)
        // 7 gains of 1.0 against 7 losses of 1.6: RSI = 7 / 18.2 ≈ 38.5
        let mut closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        for i in 0..14 {
            let step = if i % 2 == 1 { 1.0 } else { -1.6 };
            let last = *closes.last().unwrap();
            closes.push(last + step);
        }
        let volumes = vec![400_000; closes.len()];
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        let rsi = series.latest().unwrap().rsi.unwrap();
        assert!(rsi > 30.0 && rsi < 40.0, "rsi = {rsi}");

        let eval = india().evaluate(&snap(), &series, &strong_fundamentals("AUTO"));
        assert_eq!(eval.entry_type, Some(EntryType::Pullback));
        assert!(eval.reasons.iter().any(|r| r.contains("pullback zone")));
    }

    #[test]
    fn fresh_cross_outranks_breakout() {
        // Slow decline keeps the histogram negative, then a jump on heavy volume
        let mut closes: Vec<f64> = (0..60).map(|i| 110.0 - i as f64 * 0.1).collect();
        closes.push(closes[59] + 8.0);
        let mut volumes = vec![100_000; 60];
        volumes.push(400_000);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        let row = series.latest().unwrap();
        assert!(row.volume_ratio.unwrap() > 1.5);
        assert!(series.fresh_macd_cross());
        let eval = india().evaluate(&snap(), &series, &strong_fundamentals("AUTO"));
        assert_eq!(eval.entry_type, Some(EntryType::MacdCross));
    }

    #[test]
    fn breakout_without_fresh_cross() {
        // Uptrend already under way (histogram positive), then a high-volume surge
        let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        closes.push(closes[59] + 6.0);
        let mut volumes = vec![100_000; 60];
        volumes.push(400_000);
        let series = enrich(&closes, &volumes, IndicatorParams::default());
        assert!(!series.fresh_macd_cross());
        let row = series.latest().unwrap();
        let rsi = row.rsi.unwrap();
        assert!(rsi > 40.0, "rsi = {rsi}");

        let eval = india().evaluate(&snap(), &series, &strong_fundamentals("AUTO"));
        assert_eq!(eval.entry_type, Some(EntryType::Breakout));
    }

    #[test]
    fn sector_weight_applies_after_gating() {
        let (closes, volumes) = sawtooth_uptrend(260);
        let series = enrich(
            &closes,
            &volumes,
            PolicyConfig::swing_australia().indicators,
        );
        let p = australia();
        let materials = p.evaluate(&snap(), &series, &fundamentals("Materials", 90_000.0, 0.5, 12.0));
        let tech = p.evaluate(
            &snap(),
            &series,
            &fundamentals("Information Technology", 90_000.0, 0.5, 12.0),
        );

        assert_eq!(materials.raw_score, tech.raw_score);
        assert_eq!(materials.sector_weight, 1.2);
        assert!((materials.score - materials.raw_score * 1.2).abs() < 1e-9);
        assert!((tech.score - tech.raw_score * 0.8).abs() < 1e-9);
        assert_eq!(materials.passed, tech.passed);
        assert!(materials.reasons.iter().any(|r| r.contains("weight: 1.2x")));
    }

    #[test]
    fn weight_cannot_rescue_a_failing_score() {
        // Downtrend: weak trend, weak momentum
        let closes: Vec<f64> = (0..260).map(|i| 300.0 - i as f64 * 0.5).collect();
        let volumes = vec![100_000; 260];
        let series = enrich(&closes, &volumes, PolicyConfig::swing_australia().indicators);
        let eval = australia().evaluate(&snap(), &series, &fundamentals("Materials", 90_000.0, 0.5, 12.0));
        assert!(eval.raw_score < 60.0);
        assert!(!eval.passed);
        assert!(eval.score > eval.raw_score);
    }

    #[test]
    fn fundamentals_prefilter() {
        let p = india();
        assert!(p.prefilter_fundamentals(&strong_fundamentals("AUTO")));
        assert!(!p.prefilter_fundamentals(&fundamentals("AUTO", 100.0, 0.1, 30.0)));
        assert!(!p.prefilter_fundamentals(&fundamentals("AUTO", 9000.0, 0.9, 30.0)));
        // ROE is not part of the cheap gate
        assert!(p.prefilter_fundamentals(&fundamentals("AUTO", 9000.0, 0.1, 1.0)));
    }

    #[test]
    fn australia_reports_in_lakhs() {
        let (closes, volumes) = sawtooth_uptrend(60);
        let series = enrich(&closes, &volumes, PolicyConfig::swing_australia().indicators);
        let eval = australia().evaluate(&snap(), &series, &fundamentals("Energy", 100.0, 0.1, 30.0));
        assert_eq!(eval.reason(), "Market cap too small: A$100 L");
    }
}
