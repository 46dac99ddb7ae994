//! Market data collaborator.
//!
//! The `MarketDataSource` trait abstracts over whatever supplies universes,
//! snapshots, history and fundamentals, so the pipeline never knows where the
//! data came from. Failures are opaque `anyhow` errors; a symbol missing from
//! a returned map is data absence, not an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::bail;
use chrono::Duration;

use crate::domain::{Fundamentals, Market, Snapshot, Symbol, TimeSeries};

pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Ordered symbol list for a market.
    fn get_universe(&self, market: Market) -> anyhow::Result<Vec<Symbol>>;

    fn get_current_snapshots(&self, symbols: &[Symbol]) -> anyhow::Result<HashMap<Symbol, Snapshot>>;

    /// Daily history covering at least the last `lookback_days` calendar days.
    fn get_historical_series(
        &self,
        symbols: &[Symbol],
        lookback_days: u32,
    ) -> anyhow::Result<HashMap<Symbol, TimeSeries>>;

    /// Never fails: symbols without data get `Fundamentals::placeholder`.
    fn get_fundamentals(&self, symbols: &[Symbol]) -> HashMap<Symbol, Fundamentals>;
}

/// Which collaborator call an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceCall {
    Universe,
    Snapshots,
    History,
}

/// Fixed, in-process data set.
///
/// Records every history request so callers can check which symbols reached
/// the expensive stage.
#[derive(Debug, Default)]
pub struct InMemorySource {
    universes: BTreeMap<Market, Vec<Symbol>>,
    snapshots: HashMap<Symbol, Snapshot>,
    series: HashMap<Symbol, TimeSeries>,
    fundamentals: HashMap<Symbol, Fundamentals>,
    failures: BTreeMap<SourceCall, String>,
    history_requests: Mutex<Vec<Vec<Symbol>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_universe(mut self, market: Market, symbols: &[&str]) -> Self {
        self.universes
            .insert(market, symbols.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshots.insert(snapshot.symbol.clone(), snapshot);
        self
    }

    pub fn with_series(mut self, series: TimeSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        self.fundamentals
            .insert(fundamentals.symbol.clone(), fundamentals);
        self
    }

    /// Make `call` fail with `message` on every invocation.
    pub fn failing(mut self, call: SourceCall, message: impl Into<String>) -> Self {
        self.failures.insert(call, message.into());
        self
    }

    /// Symbol batches passed to `get_historical_series`, in call order.
    pub fn history_requests(&self) -> Vec<Vec<Symbol>> {
        self.history_requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn check(&self, call: SourceCall) -> anyhow::Result<()> {
        match self.failures.get(&call) {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }

    fn trim(series: &TimeSeries, lookback_days: u32) -> anyhow::Result<TimeSeries> {
        let Some(last) = series.last() else {
            return Ok(series.clone());
        };
        let start = last.date - Duration::days(i64::from(lookback_days));
        let bars = series
            .bars()
            .iter()
            .filter(|b| b.date > start)
            .cloned()
            .collect();
        Ok(TimeSeries::new(series.symbol(), bars)?)
    }
}

impl MarketDataSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn get_universe(&self, market: Market) -> anyhow::Result<Vec<Symbol>> {
        self.check(SourceCall::Universe)?;
        Ok(self.universes.get(&market).cloned().unwrap_or_default())
    }

    fn get_current_snapshots(&self, symbols: &[Symbol]) -> anyhow::Result<HashMap<Symbol, Snapshot>> {
        self.check(SourceCall::Snapshots)?;
        Ok(symbols
            .iter()
            .filter_map(|s| self.snapshots.get(s).map(|snap| (s.clone(), snap.clone())))
            .collect())
    }

    fn get_historical_series(
        &self,
        symbols: &[Symbol],
        lookback_days: u32,
    ) -> anyhow::Result<HashMap<Symbol, TimeSeries>> {
        if let Ok(mut log) = self.history_requests.lock() {
            log.push(symbols.to_vec());
        }
        self.check(SourceCall::History)?;
        symbols
            .iter()
            .filter_map(|s| self.series.get(s).map(|series| (s, series)))
            .map(|(s, series)| Ok((s.clone(), Self::trim(series, lookback_days)?)))
            .collect()
    }

    fn get_fundamentals(&self, symbols: &[Symbol]) -> HashMap<Symbol, Fundamentals> {
        symbols
            .iter()
            .map(|s| {
                let f = self
                    .fundamentals
                    .get(s)
                    .cloned()
                    .unwrap_or_else(|| Fundamentals::placeholder(s.clone()));
                (s.clone(), f)
            })
            .collect()
    }
}
