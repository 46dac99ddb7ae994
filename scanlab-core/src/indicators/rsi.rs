//! Relative Strength Index (RSI), simple-mean variant.
//!
//! avg_gain / avg_loss are plain rolling means of the last `period`
//! bar-over-bar close deltas (no Wilder smoothing).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period (the first delta needs two bars).
//! Edge case: avg_loss == 0 → RSI = 100, including a completely flat window.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut result = vec![None; n];
        if n < self.period + 1 {
            return result;
        }

        // gains[i] / losses[i] describe the move into bar i+1
        let (gains, losses): (Vec<f64>, Vec<f64>) = bars
            .windows(2)
            .map(|w| {
                let delta = w[1].close - w[0].close;
                (delta.max(0.0), (-delta).max(0.0))
            })
            .unzip();

        let mut gain_sum: f64 = gains[..self.period].iter().sum();
        let mut loss_sum: f64 = losses[..self.period].iter().sum();
        result[self.period] = Some(compute_rsi(gain_sum, loss_sum));

        for i in (self.period + 1)..n {
            let enter = i - 1;
            let leave = i - 1 - self.period;
            gain_sum += gains[enter] - gains[leave];
            loss_sum += losses[enter] - losses[leave];
            result[i] = Some(compute_rsi(gain_sum, loss_sum));
        }

        result
    }
}

/// Sums stand in for means: the window length cancels in the ratio.
fn compute_rsi(gain_sum: f64, loss_sum: f64) -> f64 {
    // Rolling subtraction can leave tiny negative residue
    let gain = gain_sum.max(0.0);
    let loss = loss_sum.max(0.0);
    if loss <= f64::EPSILON * gain.max(1.0) {
        return 100.0;
    }
    (100.0 - 100.0 / (1.0 + gain / loss)).clamp(0.0, 100.0)
}
