//! Rolling-high proximity.
//!
//! close[t] / max(close[t-window+1..=t]) * 100. The window may be partially
//! filled, but at least `min_periods` bars are required before a value is
//! reported.

use super::Indicator;
use crate::domain::PriceBar;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingHighProximity {
    window: usize,
    min_periods: usize,
    name: String,
}

impl RollingHighProximity {
    pub fn new(window: usize, min_periods: usize) -> Self {
        assert!(window >= 1, "rolling-high window must be >= 1");
        assert!(
            (1..=window).contains(&min_periods),
            "rolling-high min_periods must be in 1..=window"
        );
        Self {
            window,
            min_periods,
            name: format!("high_proximity_{window}"),
        }
    }
}

impl Indicator for RollingHighProximity {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.min_periods - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let mut result = Vec::with_capacity(bars.len());
        // Monotonic deque of indices with decreasing closes
        let mut maxima: VecDeque<usize> = VecDeque::new();

        for (i, bar) in bars.iter().enumerate() {
            while maxima.back().is_some_and(|&j| bars[j].close <= bar.close) {
                maxima.pop_back();
            }
            maxima.push_back(i);
            while maxima.front().is_some_and(|&j| j + self.window <= i) {
                maxima.pop_front();
            }

            let value = if i + 1 < self.min_periods {
                None
            } else {
                maxima
                    .front()
                    .map(|&j| bars[j].close)
                    .filter(|high| *high > 0.0)
                    .map(|high| bar.close / high * 100.0)
            };
            result.push(value);
        }

        result
    }
}
