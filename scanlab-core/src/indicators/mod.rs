//! Technical indicators and the engine that bundles them.
//!
//! Every indicator implements `Indicator`: a full bar series in, a value
//! series of the same length out. Warmup positions are `None`, never a
//! sentinel float, so consumers must branch on presence before comparing.
//!
//! Multi-series indicators (MACD) are exposed as separate named instances
//! per line, keeping the single-series trait unchanged.

pub mod ema;
pub mod engine;
pub mod macd;
pub mod rolling_high;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use ema::Ema;
pub use engine::{
    is_fresh_bullish_cross, EnrichedSeries, IndicatorEngine, IndicatorError, IndicatorParams,
    IndicatorRow, IndicatorSet, RollingHighParams,
};
pub use macd::{Macd, MacdLine};
pub use rolling_high::RollingHighProximity;
pub use rsi::Rsi;
pub use sma::Sma;
pub use volume::{VolumeAverage, VolumeRatio};

use crate::domain::PriceBar;

/// Trait for indicators.
///
/// # Look-ahead guard
/// No value at bar t may depend on bar t+1 or later; computing over a
/// truncated series must reproduce the prefix of the full computation.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading bars whose output is `None`.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a vector of the same length as `bars`.
    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>>;
}

/// Unadjusted exponential recursion seeded from the first value.
///
/// `out[0] = values[0]`, `out[t] = a * values[t] + (1 - a) * out[t-1]` with
/// `a = 2 / (span + 1)`. No warmup masking; callers apply their own.
pub fn ewm(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Hide the first `lookback` positions and any non-finite value.
pub fn mask_warmup(values: Vec<f64>, lookback: usize) -> Vec<Option<f64>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            if i < lookback || !v.is_finite() {
                None
            } else {
                Some(v)
            }
        })
        .collect()
}

/// Trailing simple mean over an inclusive window ending at each position.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    if window == 0 || n < window {
        return out;
    }
    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for i in window..n {
        sum += values[i] - values[i - window];
        out[i] = Some(sum / window as f64);
    }
    out
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high/low = max/min ± 1.0,
/// volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: (open.min(close) - 1.0).max(0.0),
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewm_seeds_from_first_value() {
        // alpha = 0.5
        let out = ewm(&[10.0, 12.0, 14.0], 3);
        assert_approx(out[0], 10.0, DEFAULT_EPSILON);
        assert_approx(out[1], 11.0, DEFAULT_EPSILON);
        assert_approx(out[2], 12.5, DEFAULT_EPSILON);
    }

    #[test]
    fn mask_hides_warmup_and_non_finite() {
        let out = mask_warmup(vec![1.0, 2.0, f64::INFINITY, 4.0], 1);
        assert_eq!(out, vec![None, Some(2.0), None, Some(4.0)]);
    }

    #[test]
    fn rolling_mean_inclusive_window() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn rolling_mean_short_input_is_undefined() {
        assert!(rolling_mean(&[1.0, 2.0], 3).iter().all(Option::is_none));
        assert!(rolling_mean(&[], 3).is_empty());
    }
}
