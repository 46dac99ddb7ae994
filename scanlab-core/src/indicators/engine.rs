//! IndicatorEngine — computes the full indicator set for one series.
//!
//! The engine is immutable once built and holds no per-call state; the same
//! instance can serve every symbol in a scan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Ema, Indicator, Macd, RollingHighProximity, Rsi, Sma, VolumeAverage, VolumeRatio};
use crate::config::ConfigError;
use crate::domain::{PriceBar, TimeSeries};
use chrono::NaiveDate;

/// A bar the engine refuses to compute over.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("{symbol}: bar {index} ({date}) has a non-finite or negative price")]
    InvalidBar {
        symbol: String,
        index: usize,
        date: NaiveDate,
    },
}

/// Window for the rolling-high proximity indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingHighParams {
    pub window: usize,
    pub min_periods: usize,
}

impl Default for RollingHighParams {
    fn default() -> Self {
        Self {
            window: 252,
            min_periods: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub short_span: usize,
    pub medium_span: usize,
    pub long_window: usize,
    pub momentum_period: usize,
    pub fast_span: usize,
    pub slow_span: usize,
    pub signal_span: usize,
    pub volume_window: usize,
    /// Rolling-high proximity is only computed when set.
    pub rolling_high: Option<RollingHighParams>,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            short_span: 20,
            medium_span: 50,
            long_window: 200,
            momentum_period: 14,
            fast_span: 12,
            slow_span: 26,
            signal_span: 9,
            volume_window: 20,
            rolling_high: None,
        }
    }
}

impl IndicatorParams {
    pub fn with_rolling_high(mut self, params: RollingHighParams) -> Self {
        self.rolling_high = Some(params);
        self
    }

    /// Check that every window is usable.
    pub fn check(&self) -> Result<(), ConfigError> {
        let windows = [
            ("short_span", self.short_span),
            ("medium_span", self.medium_span),
            ("long_window", self.long_window),
            ("momentum_period", self.momentum_period),
            ("fast_span", self.fast_span),
            ("slow_span", self.slow_span),
            ("signal_span", self.signal_span),
            ("volume_window", self.volume_window),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(ConfigError::invalid(
                format!("indicators.{name}"),
                "must be >= 1",
            ));
        }
        if self.slow_span <= self.fast_span {
            return Err(ConfigError::invalid(
                "indicators.slow_span",
                format!("{} must exceed fast_span {}", self.slow_span, self.fast_span),
            ));
        }
        if let Some(rh) = self.rolling_high {
            if rh.window == 0 || rh.min_periods == 0 || rh.min_periods > rh.window {
                return Err(ConfigError::invalid(
                    "indicators.rolling_high",
                    format!(
                        "needs 1 <= min_periods ({}) <= window ({})",
                        rh.min_periods, rh.window
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Indicator values for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ema_short: Option<f64>,
    pub ema_medium: Option<f64>,
    pub sma_long: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub volume_avg: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub high_proximity: Option<f64>,
}

/// Per-bar indicator series aligned 1:1 with a `TimeSeries`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ema_short: Vec<Option<f64>>,
    pub ema_medium: Vec<Option<f64>>,
    pub sma_long: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,
    pub volume_avg: Vec<Option<f64>>,
    pub volume_ratio: Vec<Option<f64>>,
    /// `None` when the engine was built without rolling-high parameters.
    pub high_proximity: Option<Vec<Option<f64>>>,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_short.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<IndicatorRow> {
        if index >= self.len() {
            return None;
        }
        Some(IndicatorRow {
            ema_short: self.ema_short[index],
            ema_medium: self.ema_medium[index],
            sma_long: self.sma_long[index],
            rsi: self.rsi[index],
            macd: self.macd[index],
            macd_signal: self.macd_signal[index],
            macd_hist: self.macd_hist[index],
            volume_avg: self.volume_avg[index],
            volume_ratio: self.volume_ratio[index],
            high_proximity: self
                .high_proximity
                .as_ref()
                .and_then(|hp| hp.get(index).copied().flatten()),
        })
    }

    /// True at each bar where the histogram turns positive from ≤ 0.
    pub fn fresh_macd_crosses(&self) -> Vec<bool> {
        let mut out = vec![false; self.len()];
        for i in 1..self.len() {
            out[i] = is_fresh_bullish_cross(self.macd_hist[i - 1], self.macd_hist[i]);
        }
        out
    }

    /// True when the short EMA is above the medium EMA at `index` but was not
    /// on the bar before.
    pub fn ma_cross_at(&self, index: usize) -> bool {
        if index == 0 || index >= self.len() {
            return false;
        }
        match (
            self.ema_short[index],
            self.ema_medium[index],
            self.ema_short[index - 1],
            self.ema_medium[index - 1],
        ) {
            (Some(s), Some(m), Some(ps), Some(pm)) => s > m && ps <= pm,
            _ => false,
        }
    }
}

/// Histogram sign change into positive territory between consecutive bars.
pub fn is_fresh_bullish_cross(previous: Option<f64>, current: Option<f64>) -> bool {
    matches!((previous, current), (Some(p), Some(c)) if p <= 0.0 && c > 0.0)
}

/// A series plus its indicator columns. Built only by `IndicatorEngine`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedSeries {
    series: TimeSeries,
    indicators: IndicatorSet,
}

impl EnrichedSeries {
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn symbol(&self) -> &str {
        self.series.symbol()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn latest_bar(&self) -> Option<&PriceBar> {
        self.series.last()
    }

    pub fn latest(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(1).and_then(|i| self.indicators.row(i))
    }

    pub fn previous(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(2).and_then(|i| self.indicators.row(i))
    }

    /// Fresh MACD crossover on the latest bar.
    pub fn fresh_macd_cross(&self) -> bool {
        match (self.previous(), self.latest()) {
            (Some(prev), Some(cur)) => is_fresh_bullish_cross(prev.macd_hist, cur.macd_hist),
            _ => false,
        }
    }

    /// Short/medium EMA crossover on the latest bar.
    pub fn ma_cross(&self) -> bool {
        self.len()
            .checked_sub(1)
            .is_some_and(|i| self.indicators.ma_cross_at(i))
    }
}

/// Computes every indicator the policies consume.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    ema_short: Ema,
    ema_medium: Ema,
    sma_long: Sma,
    rsi: Rsi,
    macd: Macd,
    volume_avg: VolumeAverage,
    volume_ratio: VolumeRatio,
    rolling_high: Option<RollingHighProximity>,
}

impl IndicatorEngine {
    /// Build an engine. Parameters must pass `IndicatorParams::check`.
    pub fn new(params: IndicatorParams) -> Result<Self, ConfigError> {
        params.check()?;
        Ok(Self {
            ema_short: Ema::new(params.short_span),
            ema_medium: Ema::new(params.medium_span),
            sma_long: Sma::new(params.long_window),
            rsi: Rsi::new(params.momentum_period),
            macd: Macd::line(params.fast_span, params.slow_span, params.signal_span),
            volume_avg: VolumeAverage::new(params.volume_window),
            volume_ratio: VolumeRatio::new(params.volume_window),
            rolling_high: params
                .rolling_high
                .map(|rh| RollingHighProximity::new(rh.window, rh.min_periods)),
            params,
        })
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Longest warmup across all computed indicators.
    pub fn warmup(&self) -> usize {
        let mut lookbacks = vec![
            self.ema_short.lookback(),
            self.ema_medium.lookback(),
            self.sma_long.lookback(),
            self.rsi.lookback(),
            Macd::histogram(self.params.fast_span, self.params.slow_span, self.params.signal_span)
                .lookback(),
            self.volume_ratio.lookback(),
        ];
        if let Some(rh) = &self.rolling_high {
            lookbacks.push(rh.lookback());
        }
        lookbacks.into_iter().max().unwrap_or(0)
    }

    /// Compute the indicator set for a series.
    ///
    /// Short or empty input is not an error: it yields undefined values.
    pub fn compute(&self, series: &TimeSeries) -> Result<IndicatorSet, IndicatorError> {
        let bars = series.bars();
        if let Some((index, bar)) = bars.iter().enumerate().find(|(_, b)| !b.is_valid()) {
            return Err(IndicatorError::InvalidBar {
                symbol: series.symbol().to_string(),
                index,
                date: bar.date,
            });
        }

        let (line, signal, hist) = self.macd.raw_series(bars);
        let signal_lookback = self.params.slow_span + self.params.signal_span - 2;

        Ok(IndicatorSet {
            ema_short: self.ema_short.compute(bars),
            ema_medium: self.ema_medium.compute(bars),
            sma_long: self.sma_long.compute(bars),
            rsi: self.rsi.compute(bars),
            macd: super::mask_warmup(line, self.macd.lookback()),
            macd_signal: super::mask_warmup(signal, signal_lookback),
            macd_hist: super::mask_warmup(hist, signal_lookback),
            volume_avg: self.volume_avg.compute(bars),
            volume_ratio: self.volume_ratio.compute(bars),
            high_proximity: self.rolling_high.as_ref().map(|rh| rh.compute(bars)),
        })
    }

    /// Compute indicators and bundle them with the series.
    pub fn enrich(&self, series: TimeSeries) -> Result<EnrichedSeries, IndicatorError> {
        let indicators = self.compute(&series)?;
        Ok(EnrichedSeries { series, indicators })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn series(closes: &[f64]) -> TimeSeries {
        TimeSeries::new("TEST", make_bars(closes)).unwrap()
    }

    fn engine() -> IndicatorEngine {
        IndicatorEngine::new(IndicatorParams::default()).unwrap()
    }

    #[test]
    fn empty_series_gives_empty_set() {
        let set = engine().compute(&TimeSeries::empty("X")).unwrap();
        assert!(set.is_empty());
        assert!(set.row(0).is_none());
    }

    #[test]
    fn short_series_all_undefined() {
        let set = engine().compute(&series(&[100.0, 101.0, 102.0])).unwrap();
        assert_eq!(set.len(), 3);
        for i in 0..3 {
            assert_eq!(set.row(i).unwrap(), IndicatorRow::default());
        }
    }

    #[test]
    fn full_history_defines_everything() {
        let closes: Vec<f64> = (0..220).map(|i| 100.0 + i as f64 * 0.5).collect();
        let enriched = engine().enrich(series(&closes)).unwrap();
        let row = enriched.latest().unwrap();
        assert!(row.ema_short.is_some());
        assert!(row.ema_medium.is_some());
        assert!(row.sma_long.is_some());
        assert!(row.rsi.is_some());
        assert!(row.macd_hist.is_some());
        assert!(row.volume_ratio.is_some());
        assert!(row.high_proximity.is_none());
        // uptrend ordering
        assert!(row.ema_short.unwrap() > row.ema_medium.unwrap());
        assert!(row.ema_medium.unwrap() > row.sma_long.unwrap());
        assert_approx(row.volume_ratio.unwrap(), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_high_only_when_configured() {
        let params = IndicatorParams::default().with_rolling_high(RollingHighParams::default());
        let engine = IndicatorEngine::new(params).unwrap();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let enriched = engine.enrich(series(&closes)).unwrap();
        assert_approx(enriched.latest().unwrap().high_proximity.unwrap(), 100.0, DEFAULT_EPSILON);
        assert_eq!(enriched.indicators().row(48).unwrap().high_proximity, None);
    }

    #[test]
    fn invalid_bar_is_a_computation_fault() {
        let mut bars = make_bars(&[100.0, 101.0, 102.0]);
        bars[1].close = f64::NAN;
        let series = TimeSeries::new("BAD", bars).unwrap();
        let err = engine().compute(&series).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::InvalidBar {
                symbol: "BAD".into(),
                index: 1,
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            }
        );
    }

    #[test]
    fn enrich_does_not_alter_bars() {
        let s = series(&[10.0, 11.0, 12.0]);
        let enriched = engine().enrich(s.clone()).unwrap();
        assert_eq!(enriched.series(), &s);
    }

    #[test]
    fn fresh_cross_flagged_once() {
        // Decline then sharp recovery turns the histogram positive once
        let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        closes.extend((0..30).map(|i| 141.0 + i as f64 * 3.0));
        let set = engine().compute(&series(&closes)).unwrap();
        let crosses = set.fresh_macd_crosses();
        let flagged: Vec<usize> = crosses
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.then_some(i))
            .collect();
        assert_eq!(flagged.len(), 1);
        let i = flagged[0];
        assert!(set.macd_hist[i].unwrap() > 0.0);
        assert!(set.macd_hist[i - 1].unwrap() <= 0.0);
    }

    #[test]
    fn cross_helper_requires_both_values() {
        assert!(is_fresh_bullish_cross(Some(-0.1), Some(0.2)));
        assert!(is_fresh_bullish_cross(Some(0.0), Some(0.01)));
        assert!(!is_fresh_bullish_cross(Some(0.1), Some(0.2)));
        assert!(!is_fresh_bullish_cross(None, Some(0.2)));
        assert!(!is_fresh_bullish_cross(Some(-0.1), Some(0.0)));
    }

    #[test]
    fn invalid_params_rejected() {
        let params = IndicatorParams {
            fast_span: 26,
            slow_span: 12,
            ..IndicatorParams::default()
        };
        assert!(IndicatorEngine::new(params).is_err());

        let params = IndicatorParams {
            volume_window: 0,
            ..IndicatorParams::default()
        };
        assert!(IndicatorEngine::new(params).is_err());
    }

    #[test]
    fn warmup_is_longest_lookback() {
        assert_eq!(engine().warmup(), 199);
        let params = IndicatorParams {
            long_window: 20,
            ..IndicatorParams::default()
        };
        assert_eq!(IndicatorEngine::new(params).unwrap().warmup(), 49);
    }
}
