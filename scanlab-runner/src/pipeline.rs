//! Scan pipeline — the staged funnel from a symbol universe to ranked candidates.
//!
//! Stages, each recorded as a `StageCount`:
//! 1. `Unfiltered`: deduplicated universe
//! 2. `Prefiltered`: snapshot present and passing the policy's snapshot gate
//! 3. `Screened`: fundamentals passing the policy's cheap fundamental gate
//! 4. `Enriched`: history present and indicators computed
//! 5. `Scored`: evaluation passed and a candidate was built
//! 6. `Ranked`: sorted by score, truncated to the result limit
//!
//! Every symbol ends with exactly one `SymbolOutcome`. Data absence and
//! per-symbol computation faults never abort the batch; configuration faults
//! (a passing evaluation whose entry type has no target/stop) always do.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use scanlab_core::candidate::{Candidate, CandidateError};
use scanlab_core::config::ConfigError;
use scanlab_core::data::MarketDataSource;
use scanlab_core::domain::{Fundamentals, Snapshot, Symbol};
use scanlab_core::indicators::{EnrichedSeries, IndicatorEngine, IndicatorRow};
use scanlab_core::policy::{CriteriaPolicy, Evaluation};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("policy configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("policy '{policy}' produced an unusable candidate for {symbol}: {source}")]
    Candidate {
        policy: String,
        symbol: String,
        #[source]
        source: CandidateError,
    },
}

/// Funnel stage identifier for tracking where symbols are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Unfiltered,
    Prefiltered,
    Screened,
    Enriched,
    Scored,
    Ranked,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unfiltered => "unfiltered",
            Self::Prefiltered => "prefiltered",
            Self::Screened => "screened",
            Self::Enriched => "enriched",
            Self::Scored => "scored",
            Self::Ranked => "ranked",
        })
    }
}

/// Symbols entering and leaving one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: ScanStage,
    pub passed: usize,
    pub eliminated: usize,
    /// Percent of the stage's input eliminated.
    pub elimination_rate: f64,
}

impl StageCount {
    pub fn new(stage: ScanStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };
        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SymbolOutcome {
    /// Built a candidate; `rank` is its 1-based position when it survived truncation.
    Passed {
        symbol: Symbol,
        score: f64,
        rank: Option<usize>,
    },
    /// Evaluated and failed the checklist.
    Rejected {
        symbol: Symbol,
        raw_score: f64,
        reason: String,
    },
    /// Eliminated by a cheap gate.
    Filtered { symbol: Symbol, stage: ScanStage },
    /// Required data was absent.
    Skipped {
        symbol: Symbol,
        stage: ScanStage,
        reason: String,
    },
    /// Computation fault, isolated to this symbol.
    Failed {
        symbol: Symbol,
        stage: ScanStage,
        error: String,
    },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Passed { symbol, .. }
            | Self::Rejected { symbol, .. }
            | Self::Filtered { symbol, .. }
            | Self::Skipped { symbol, .. }
            | Self::Failed { symbol, .. } => symbol,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Batch summary of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub policy: String,
    /// BLAKE3 fingerprint of the policy configuration.
    pub fingerprint: String,
    pub started_at: DateTime<Utc>,
    /// Ranked output, length at most the result limit.
    pub candidates: Vec<Candidate>,
    /// One entry per stage reached, in funnel order.
    pub funnel: Vec<StageCount>,
    /// One entry per unique symbol, in universe order.
    pub outcomes: Vec<SymbolOutcome>,
    /// Collaborator failures, each treated as absence of the requested data.
    pub collaborator_errors: Vec<String>,
}

impl ScanOutcome {
    pub fn stage(&self, stage: ScanStage) -> Option<&StageCount> {
        self.funnel.iter().find(|s| s.stage == stage)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn outcome_for(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes.iter().find(|o| o.symbol() == symbol)
    }

    /// One-line funnel summary for logs.
    pub fn summary(&self) -> String {
        let funnel = self
            .funnel
            .iter()
            .map(|s| format!("{} {}", s.stage, s.passed))
            .collect::<Vec<_>>()
            .join(" → ");
        format!(
            "{} [{}]: {}; {} failed, {} collaborator errors",
            self.scan_id,
            self.policy,
            funnel,
            self.failures().count(),
            self.collaborator_errors.len()
        )
    }
}

/// Intermediate per-symbol state carried between stages.
struct Survivor {
    symbol: Symbol,
    snapshot: Snapshot,
    fundamentals: Option<Fundamentals>,
}

/// Runs scans for one policy against one data source.
///
/// Holds no state across scans; every `run` works on local data only.
pub struct ScanPipeline<'a> {
    policy: &'a dyn CriteriaPolicy,
    source: &'a dyn MarketDataSource,
    engine: IndicatorEngine,
}

impl<'a> ScanPipeline<'a> {
    pub fn new(
        policy: &'a dyn CriteriaPolicy,
        source: &'a dyn MarketDataSource,
    ) -> Result<Self, ScanError> {
        let engine = IndicatorEngine::new(policy.config().indicators.clone())?;
        Ok(Self {
            policy,
            source,
            engine,
        })
    }

    pub fn policy(&self) -> &dyn CriteriaPolicy {
        self.policy
    }

    /// Run one scan.
    ///
    /// `symbols` defaults to the source's universe for the policy's market;
    /// `max_results` overrides the policy's limit for this call only.
    pub fn run(
        &self,
        symbols: Option<&[Symbol]>,
        max_results: Option<usize>,
    ) -> Result<ScanOutcome, ScanError> {
        let config = self.policy.config();
        let started_at = Utc::now();
        let mut scan = ScanOutcome {
            scan_id: format!("{}_{}", config.name, started_at.format("%Y%m%d_%H%M%S")),
            policy: config.name.clone(),
            fingerprint: config.fingerprint(),
            started_at,
            candidates: Vec::new(),
            funnel: Vec::new(),
            outcomes: Vec::new(),
            collaborator_errors: Vec::new(),
        };
        info!(scan_id = %scan.scan_id, policy = %scan.policy, source = self.source.name(), "Starting scan");

        // 1. Universe
        let universe = self.universe(symbols, &mut scan);
        scan.funnel
            .push(StageCount::new(ScanStage::Unfiltered, universe.len(), universe.len()));
        if universe.is_empty() {
            info!(scan_id = %scan.scan_id, "Empty universe, nothing to scan");
            return Ok(scan);
        }

        // 2. Snapshot gate
        let survivors = self.prefilter(&universe, &mut scan);
        self.record_stage(&mut scan, ScanStage::Prefiltered, universe.len(), survivors.len());
        if survivors.is_empty() {
            return Ok(scan);
        }

        // 3. Fundamental gate
        let before = survivors.len();
        let survivors = self.screen(survivors, &mut scan);
        self.record_stage(&mut scan, ScanStage::Screened, before, survivors.len());
        if survivors.is_empty() {
            return Ok(scan);
        }

        // 4. History and indicators
        let before = survivors.len();
        let enriched = self.enrich(survivors, &mut scan);
        self.record_stage(&mut scan, ScanStage::Enriched, before, enriched.len());

        // 5. Evaluation
        let before = enriched.len();
        let mut candidates = Vec::new();
        for (survivor, series) in enriched {
            if let Some(candidate) = self.score(survivor, &series, &mut scan)? {
                candidates.push(candidate);
            }
        }
        self.record_stage(&mut scan, ScanStage::Scored, before, candidates.len());

        // 6. Ranking: stable, so ties keep universe order
        let limit = max_results.unwrap_or(config.max_results);
        let scored = candidates.len();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);
        for (i, candidate) in candidates.iter().enumerate() {
            for outcome in scan.outcomes.iter_mut() {
                if let SymbolOutcome::Passed { symbol, rank, .. } = outcome {
                    if *symbol == candidate.symbol {
                        *rank = Some(i + 1);
                    }
                }
            }
        }
        self.record_stage(&mut scan, ScanStage::Ranked, scored, candidates.len());
        scan.candidates = candidates;

        info!(
            scan_id = %scan.scan_id,
            candidates = scan.candidates.len(),
            failed = scan.failures().count(),
            "Scan complete"
        );
        Ok(scan)
    }

    fn record_stage(&self, scan: &mut ScanOutcome, stage: ScanStage, input: usize, passed: usize) {
        let count = StageCount::new(stage, input, passed);
        info!(
            scan_id = %scan.scan_id,
            stage = %stage,
            passed = count.passed,
            eliminated = count.eliminated,
            "Stage complete"
        );
        scan.funnel.push(count);
    }

    fn collaborator_failed(&self, scan: &mut ScanOutcome, call: &str, error: anyhow::Error) {
        warn!(scan_id = %scan.scan_id, call, error = %error, "Data source call failed");
        scan.collaborator_errors.push(format!("{call}: {error:#}"));
    }

    /// Requested or market universe, duplicates removed, first occurrence kept.
    fn universe(&self, symbols: Option<&[Symbol]>, scan: &mut ScanOutcome) -> Vec<Symbol> {
        let requested = match symbols {
            Some(list) => list.to_vec(),
            None => match self.source.get_universe(self.policy.config().market) {
                Ok(list) => list,
                Err(e) => {
                    self.collaborator_failed(scan, "get_universe", e);
                    Vec::new()
                }
            },
        };
        let mut seen = HashSet::new();
        requested
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    fn prefilter(&self, universe: &[Symbol], scan: &mut ScanOutcome) -> Vec<Survivor> {
        let mut snapshots = match self.source.get_current_snapshots(universe) {
            Ok(map) => map,
            Err(e) => {
                self.collaborator_failed(scan, "get_current_snapshots", e);
                HashMap::new()
            }
        };

        let mut survivors = Vec::new();
        for symbol in universe {
            let Some(snapshot) = snapshots.remove(symbol) else {
                debug!(symbol = %symbol, "No snapshot");
                scan.outcomes.push(SymbolOutcome::Skipped {
                    symbol: symbol.clone(),
                    stage: ScanStage::Prefiltered,
                    reason: "no snapshot".into(),
                });
                continue;
            };
            if self.policy.prefilter_snapshot(&snapshot) {
                survivors.push(Survivor {
                    symbol: symbol.clone(),
                    snapshot,
                    fundamentals: None,
                });
            } else {
                debug!(symbol = %symbol, change = snapshot.day_change_pct, "Filtered by snapshot gate");
                scan.outcomes.push(SymbolOutcome::Filtered {
                    symbol: symbol.clone(),
                    stage: ScanStage::Prefiltered,
                });
            }
        }
        survivors
    }

    fn screen(&self, survivors: Vec<Survivor>, scan: &mut ScanOutcome) -> Vec<Survivor> {
        let symbols: Vec<Symbol> = survivors.iter().map(|s| s.symbol.clone()).collect();
        let mut fundamentals = self.source.get_fundamentals(&symbols);

        survivors
            .into_iter()
            .filter_map(|mut survivor| {
                let f = fundamentals
                    .remove(&survivor.symbol)
                    .unwrap_or_else(|| Fundamentals::placeholder(survivor.symbol.clone()));
                if self.policy.prefilter_fundamentals(&f) {
                    survivor.fundamentals = Some(f);
                    Some(survivor)
                } else {
                    debug!(symbol = %survivor.symbol, market_cap = f.market_cap, "Filtered by fundamental gate");
                    scan.outcomes.push(SymbolOutcome::Filtered {
                        symbol: survivor.symbol,
                        stage: ScanStage::Screened,
                    });
                    None
                }
            })
            .collect()
    }

    fn enrich(
        &self,
        survivors: Vec<Survivor>,
        scan: &mut ScanOutcome,
    ) -> Vec<(Survivor, EnrichedSeries)> {
        let symbols: Vec<Symbol> = survivors.iter().map(|s| s.symbol.clone()).collect();
        let lookback = self.policy.config().lookback_days;
        let mut history = match self.source.get_historical_series(&symbols, lookback) {
            Ok(map) => map,
            Err(e) => {
                self.collaborator_failed(scan, "get_historical_series", e);
                HashMap::new()
            }
        };

        let mut enriched = Vec::with_capacity(survivors.len());
        for survivor in survivors {
            let Some(series) = history.remove(&survivor.symbol) else {
                debug!(symbol = %survivor.symbol, "No history");
                scan.outcomes.push(SymbolOutcome::Skipped {
                    symbol: survivor.symbol,
                    stage: ScanStage::Enriched,
                    reason: "no history".into(),
                });
                continue;
            };
            match self.engine.enrich(series) {
                Ok(series) => enriched.push((survivor, series)),
                Err(e) => {
                    warn!(symbol = %survivor.symbol, error = %e, "Indicator computation failed");
                    scan.outcomes.push(SymbolOutcome::Failed {
                        symbol: survivor.symbol,
                        stage: ScanStage::Enriched,
                        error: e.to_string(),
                    });
                }
            }
        }
        enriched
    }

    /// Evaluate one symbol; `Ok(None)` for anything that is not a candidate.
    fn score(
        &self,
        survivor: Survivor,
        series: &EnrichedSeries,
        scan: &mut ScanOutcome,
    ) -> Result<Option<Candidate>, ScanError> {
        let Survivor {
            symbol,
            snapshot,
            fundamentals,
        } = survivor;
        let fundamentals = fundamentals.unwrap_or_else(|| Fundamentals::placeholder(symbol.clone()));

        let eval = self.policy.evaluate(&snapshot, series, &fundamentals);
        if !eval.passed {
            debug!(symbol = %symbol, raw_score = eval.raw_score, reason = %eval.reason(), "Rejected");
            scan.outcomes.push(SymbolOutcome::Rejected {
                symbol,
                raw_score: eval.raw_score,
                reason: eval.reason(),
            });
            return Ok(None);
        }

        let (Some(bar), Some(row)) = (series.latest_bar(), series.latest()) else {
            scan.outcomes.push(SymbolOutcome::Failed {
                symbol,
                stage: ScanStage::Scored,
                error: "passing evaluation on an empty series".into(),
            });
            return Ok(None);
        };
        let price = match self.policy.reference_price(&snapshot, series) {
            Some(p) if p.is_finite() && p > 0.0 => p,
            other => {
                warn!(symbol = %symbol, price = ?other, "Unusable reference price");
                scan.outcomes.push(SymbolOutcome::Failed {
                    symbol,
                    stage: ScanStage::Scored,
                    error: format!("unusable reference price {other:?}"),
                });
                return Ok(None);
            }
        };

        let candidate = self
            .build_candidate(&symbol, eval, price, bar.date, snapshot, row, fundamentals)
            .map_err(|source| ScanError::Candidate {
                policy: self.policy.name().to_string(),
                symbol: symbol.clone(),
                source,
            })?;
        debug!(symbol = %symbol, score = candidate.score, entry_type = %candidate.entry_type, "Passed");
        scan.outcomes.push(SymbolOutcome::Passed {
            symbol,
            score: candidate.score,
            rank: None,
        });
        Ok(Some(candidate))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_candidate(
        &self,
        symbol: &str,
        eval: Evaluation,
        price: f64,
        as_of: NaiveDate,
        snapshot: Snapshot,
        indicators: IndicatorRow,
        fundamentals: Fundamentals,
    ) -> Result<Candidate, CandidateError> {
        let entry_type = eval.entry_type.ok_or_else(|| CandidateError::Unclassified {
            symbol: symbol.to_string(),
        })?;
        let levels = self.policy.targets().levels(entry_type, price)?;
        Ok(Candidate {
            symbol: symbol.to_string(),
            market: self.policy.config().market,
            as_of,
            price,
            snapshot,
            indicators,
            fundamentals,
            raw_score: eval.raw_score,
            score: eval.score,
            sector_weight: eval.sector_weight,
            entry_type,
            target: levels.target,
            stop_loss: levels.stop_loss,
            reason: eval.reason(),
        })
    }
}

/// Run one scan and return only the ranked candidates.
pub fn run_scan(
    policy: &dyn CriteriaPolicy,
    source: &dyn MarketDataSource,
    symbols: Option<&[Symbol]>,
    max_results: Option<usize>,
) -> Result<Vec<Candidate>, ScanError> {
    let outcome = ScanPipeline::new(policy, source)?.run(symbols, max_results)?;
    info!(summary = %outcome.summary(), "Scan summary");
    Ok(outcome.candidates)
}
