use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{AnalysisResult, HistoryProvider, Series, SymbolCode};
use strategy::StrategyRegistry;

use crate::consensus::Consensus;

/// What one strategy produced for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum StrategyOutcome {
    Success(AnalysisResult),
    Failure(String),
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StrategyOutcome::Success(_))
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            StrategyOutcome::Success(r) => Some(r),
            StrategyOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StrategyOutcome::Success(_) => None,
            StrategyOutcome::Failure(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub strategy: String,
    pub outcome: StrategyOutcome,
}

/// Every requested strategy's outcome on one symbol, plus their consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    /// In request order.
    pub strategies: Vec<StrategyReport>,
    pub data_points: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// `None` when no strategy succeeded; `error` then says why.
    pub consensus: Option<Consensus>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SymbolReport {
    /// A report where every strategy failed for the same reason.
    pub fn failed(symbol: &str, strategies: &[String], reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            symbol: symbol.to_string(),
            strategies: strategies
                .iter()
                .map(|name| StrategyReport {
                    strategy: name.clone(),
                    outcome: StrategyOutcome::Failure(reason.clone()),
                })
                .collect(),
            data_points: 0,
            start: None,
            end: None,
            consensus: None,
            error: Some(reason),
            timestamp: Utc::now(),
        }
    }

    /// True when at least one strategy succeeded.
    pub fn is_success(&self) -> bool {
        self.consensus.is_some()
    }

    pub fn outcome(&self, strategy: &str) -> Option<&StrategyOutcome> {
        self.strategies
            .iter()
            .find(|r| r.strategy == strategy)
            .map(|r| &r.outcome)
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &AnalysisResult)> {
        self.strategies
            .iter()
            .filter_map(|r| r.outcome.result().map(|res| (r.strategy.as_str(), res)))
    }
}

// ─── Evaluator ────────────────────────────────────────────────────────────────

/// Runs a set of strategies over one symbol's history.
///
/// Synchronous by contract: the batch orchestrator calls it from a blocking
/// task, so the history provider is free to block.
pub struct Evaluator {
    registry: Arc<StrategyRegistry>,
    history: Arc<dyn HistoryProvider>,
    lookback_days: u32,
}

impl Evaluator {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        history: Arc<dyn HistoryProvider>,
        lookback_days: u32,
    ) -> Self {
        Self {
            registry,
            history,
            lookback_days,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    /// Strategy names a request resolves to: all registered ones when empty.
    pub fn resolve(&self, strategies: &[String]) -> Vec<String> {
        if strategies.is_empty() {
            self.registry.list()
        } else {
            strategies.to_vec()
        }
    }

    /// Evaluate `symbol` with `strategies` (empty means all registered).
    ///
    /// Never fails as a whole: problems with the symbol or its data are
    /// reported as a failure of every requested strategy, and a strategy
    /// that errors or panics fails alone.
    pub fn evaluate(&self, symbol: &str, strategies: &[String]) -> SymbolReport {
        let names = self.resolve(strategies);

        if let Err(e) = SymbolCode::parse(symbol) {
            debug!(symbol, error = %e, "Rejected symbol");
            return SymbolReport::failed(symbol, &names, e.to_string());
        }

        let series = match self.history.get(symbol, self.lookback_days) {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol, error = %e, "History fetch failed");
                return SymbolReport::failed(symbol, &names, format!("failed to fetch history: {e}"));
            }
        };
        if series.is_empty() {
            debug!(symbol, "No history");
            return SymbolReport::failed(symbol, &names, format!("no history data for {symbol}"));
        }

        let strategies: Vec<StrategyReport> = names
            .iter()
            .map(|name| StrategyReport {
                strategy: name.clone(),
                outcome: self.run_one(symbol, name, &series),
            })
            .collect();

        let consensus = Consensus::from_results(strategies.iter().filter_map(|r| r.outcome.result()));
        let error = match consensus {
            Some(_) => None,
            None => Some(format!(
                "all strategies failed: {}",
                strategies
                    .iter()
                    .filter_map(|r| r.outcome.error().map(|e| format!("{}: {e}", r.strategy)))
                    .collect::<Vec<_>>()
                    .join("; ")
            )),
        };

        if let Some(c) = &consensus {
            debug!(
                symbol,
                main_signal = %c.main_signal,
                score = c.consensus_score,
                successful = c.successful,
                "Symbol evaluated"
            );
        }

        SymbolReport {
            symbol: symbol.to_string(),
            strategies,
            data_points: series.len(),
            start: series.first_timestamp(),
            end: series.last_timestamp(),
            consensus,
            error,
            timestamp: Utc::now(),
        }
    }

    fn run_one(&self, symbol: &str, name: &str, series: &Series) -> StrategyOutcome {
        let strategy = match self.registry.create(name) {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol, strategy = name, error = %e, "Strategy unavailable");
                return StrategyOutcome::Failure(e.to_string());
            }
        };

        match catch_unwind(AssertUnwindSafe(|| strategy.analyze(series))) {
            Ok(result) => StrategyOutcome::Success(result),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!(symbol, strategy = name, panic = %msg, "Strategy panicked");
                StrategyOutcome::Failure(format!("strategy panicked: {msg}"))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
