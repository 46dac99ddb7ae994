//! Volume average and volume ratio.
//!
//! The average is a trailing window of `window` bars that *includes* the
//! current bar. Ratio = volume[t] / average[t], undefined while the average
//! is undefined or zero.
//! Lookback: window - 1.

use super::{rolling_mean, Indicator};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct VolumeAverage {
    window: usize,
    name: String,
}

impl VolumeAverage {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self {
            window,
            name: format!("volume_avg_{window}"),
        }
    }
}

impl Indicator for VolumeAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        rolling_mean(&volumes, self.window)
    }
}

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    average: VolumeAverage,
    name: String,
}

impl VolumeRatio {
    pub fn new(window: usize) -> Self {
        Self {
            average: VolumeAverage::new(window),
            name: format!("volume_ratio_{window}"),
        }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.average.lookback()
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        self.average
            .compute(bars)
            .into_iter()
            .zip(bars)
            .map(|(avg, bar)| avg.filter(|a| *a > 0.0).map(|a| bar.volume as f64 / a))
            .collect()
    }
}
