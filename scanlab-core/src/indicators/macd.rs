//! Moving Average Convergence/Divergence (MACD).
//!
//! Produces three series (exposed as separate Indicator instances):
//! - Line: EMA(fast) - EMA(slow) of close
//! - Signal: EMA(signal) of the line
//! - Histogram: line - signal
//!
//! All recursions are seeded at bar 0 and run unmasked; only the reported
//! values are masked. Lookback: slow - 1 for the line, slow + signal - 2
//! for signal and histogram.

use super::{ewm, mask_warmup, Indicator};
use crate::domain::PriceBar;

/// Which MACD series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    fn with_line(fast: usize, slow: usize, signal: usize, line: MacdLine, label: &str) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD spans must be >= 1");
        assert!(slow > fast, "MACD slow span must exceed fast span");
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("{label}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn line(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Line, "macd")
    }

    pub fn signal(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Signal, "macd_signal")
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::with_line(fast, slow, signal, MacdLine::Histogram, "macd_hist")
    }

    /// Unmasked (line, signal, histogram) recursions.
    pub fn raw_series(&self, bars: &[PriceBar]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = ewm(&closes, self.fast);
        let slow = ewm(&closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ewm(&line, self.signal);
        let hist = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        (line, signal, hist)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Line => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let (line, signal, hist) = self.raw_series(bars);
        let values = match self.line {
            MacdLine::Line => line,
            MacdLine::Signal => signal,
            MacdLine::Histogram => hist,
        };
        mask_warmup(values, self.lookback())
    }
}
