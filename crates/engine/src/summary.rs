use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Signal, SignalCounts, SignalMap};

use crate::consensus::Consensus;
use crate::evaluator::SymbolReport;

/// Reasons carried over into a [`SignalHit`].
const HIT_REASONS: usize = 3;

/// Per-strategy tallies across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub signals: SignalCounts,
    /// Mean confidence of successful results per signal; 0.0 with none.
    pub average_confidence: SignalMap<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_symbols: usize,
    /// Symbols where at least one strategy succeeded.
    pub succeeded_symbols: usize,
    pub failed_symbols: usize,
    /// In request order.
    pub strategies: Vec<StrategyStats>,
}

impl BatchSummary {
    /// Fold `reports` (in submission order) into per-strategy statistics.
    pub fn from_reports(reports: &[SymbolReport], strategies: &[String]) -> Self {
        let mut stats: Vec<StrategyStats> = strategies
            .iter()
            .map(|name| StrategyStats {
                strategy: name.clone(),
                ..Default::default()
            })
            .collect();
        let mut confidence_sums = vec![SignalMap::<f64>::default(); stats.len()];

        let mut succeeded_symbols = 0;
        for report in reports {
            if report.is_success() {
                succeeded_symbols += 1;
            }
            for sr in &report.strategies {
                let Some(i) = stats.iter().position(|s| s.strategy == sr.strategy) else {
                    continue;
                };
                let entry = &mut stats[i];
                entry.attempted += 1;
                match sr.outcome.result() {
                    Some(result) => {
                        entry.succeeded += 1;
                        *entry.signals.get_mut(result.signal) += 1;
                        *confidence_sums[i].get_mut(result.signal) += result.confidence;
                    }
                    None => entry.failed += 1,
                }
            }
        }

        for (entry, sums) in stats.iter_mut().zip(&confidence_sums) {
            for signal in Signal::ALL {
                let n = *entry.signals.get(signal);
                if n > 0 {
                    *entry.average_confidence.get_mut(signal) = sums.get(signal) / n as f64;
                }
            }
        }

        Self {
            total_symbols: reports.len(),
            succeeded_symbols,
            failed_symbols: reports.len() - succeeded_symbols,
            strategies: stats,
        }
    }

    pub fn strategy(&self, name: &str) -> Option<&StrategyStats> {
        self.strategies.iter().find(|s| s.strategy == name)
    }
}

// ─── Rankings ─────────────────────────────────────────────────────────────────

/// One successful (symbol, strategy) result picked by [`top_signals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalHit {
    pub symbol: String,
    pub strategy: String,
    pub signal: Signal,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// The `k` most confident results with `signal`, optionally restricted to
/// one strategy. Equal confidences keep submission order.
pub fn top_signals(
    reports: &[SymbolReport],
    signal: Signal,
    strategy: Option<&str>,
    k: usize,
) -> Vec<SignalHit> {
    let mut hits: Vec<SignalHit> = reports
        .iter()
        .flat_map(|report| {
            report
                .successes()
                .filter(move |(name, result)| {
                    result.signal == signal && strategy.map_or(true, |s| s == *name)
                })
                .map(move |(name, result)| SignalHit {
                    symbol: report.symbol.clone(),
                    strategy: name.to_string(),
                    signal: result.signal,
                    confidence: result.confidence,
                    reasons: result.reasons.iter().take(HIT_REASONS).cloned().collect(),
                    timestamp: result.timestamp,
                })
        })
        .collect();

    hits.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    hits.truncate(k);
    hits
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedConsensus {
    pub symbol: String,
    pub consensus: Consensus,
    pub timestamp: DateTime<Utc>,
}

/// Symbols with a consensus, best agreement first. Ties on the score are
/// broken by the main signal's average confidence, then submission order.
pub fn consensus_ranking(reports: &[SymbolReport], limit: usize) -> Vec<RankedConsensus> {
    let mut ranked: Vec<RankedConsensus> = reports
        .iter()
        .filter_map(|report| {
            report.consensus.as_ref().map(|c| RankedConsensus {
                symbol: report.symbol.clone(),
                consensus: c.clone(),
                timestamp: report.timestamp,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.consensus
            .consensus_score
            .total_cmp(&a.consensus.consensus_score)
            .then_with(|| {
                b.consensus
                    .main_confidence()
                    .total_cmp(&a.consensus.main_confidence())
            })
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{StrategyOutcome, StrategyReport};
    use common::AnalysisResult;
    use std::collections::BTreeMap;

    fn ok(strategy: &str, signal: Signal, confidence: f64) -> StrategyReport {
        let reasons = (0..5).map(|i| format!("{strategy} reason {i}")).collect();
        StrategyReport {
            strategy: strategy.into(),
            outcome: StrategyOutcome::Success(AnalysisResult::new(
                signal,
                confidence,
                reasons,
                BTreeMap::new(),
            )),
        }
    }

    fn err(strategy: &str) -> StrategyReport {
        StrategyReport {
            strategy: strategy.into(),
            outcome: StrategyOutcome::Failure("broken".into()),
        }
    }

    fn report(symbol: &str, strategies: Vec<StrategyReport>) -> SymbolReport {
        let consensus = Consensus::from_results(strategies.iter().filter_map(|r| r.outcome.result()));
        SymbolReport {
            symbol: symbol.into(),
            strategies,
            data_points: 100,
            start: None,
            end: None,
            error: consensus.is_none().then(|| "all strategies failed".to_string()),
            consensus,
            timestamp: Utc::now(),
        }
    }

    fn names() -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    fn sample() -> Vec<SymbolReport> {
        vec![
            report("000001.SZ", vec![ok("a", Signal::Buy, 0.6), ok("b", Signal::Buy, 0.9)]),
            report("000002.SZ", vec![ok("a", Signal::Buy, 0.8), err("b")]),
            report("600000.SH", vec![err("a"), err("b")]),
            report("600001.SH", vec![ok("a", Signal::Sell, 0.7), ok("b", Signal::Buy, 0.6)]),
        ]
    }

    #[test]
    fn summary_counts_per_strategy_and_symbol() {
        let s = BatchSummary::from_reports(&sample(), &names());
        assert_eq!(s.total_symbols, 4);
        assert_eq!(s.succeeded_symbols, 3);
        assert_eq!(s.failed_symbols, 1);

        let a = s.strategy("a").unwrap();
        assert_eq!((a.attempted, a.succeeded, a.failed), (4, 3, 1));
        assert_eq!(a.signals, SignalCounts { buy: 2, sell: 1, hold: 0 });
        assert!((a.average_confidence.buy - 0.7).abs() < 1e-12);
        assert_eq!(a.average_confidence.hold, 0.0);

        let b = s.strategy("b").unwrap();
        assert_eq!((b.attempted, b.succeeded, b.failed), (4, 2, 2));
        assert!((b.average_confidence.buy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn summary_ignores_unrequested_strategies() {
        let s = BatchSummary::from_reports(&sample(), &["b".to_string()]);
        assert_eq!(s.strategies.len(), 1);
        assert!(s.strategy("a").is_none());
    }

    #[test]
    fn top_signals_sorts_filters_and_truncates() {
        let reports = sample();
        let hits = top_signals(&reports, Signal::Buy, None, 3);
        let picked: Vec<(&str, &str)> = hits.iter().map(|h| (h.symbol.as_str(), h.strategy.as_str())).collect();
        assert_eq!(picked, vec![("000001.SZ", "b"), ("000002.SZ", "a"), ("000001.SZ", "a")]);
        assert_eq!(hits[0].reasons.len(), 3);
        assert_eq!(hits[0].reasons[0], "b reason 0");

        let only_b = top_signals(&reports, Signal::Buy, Some("b"), 10);
        assert_eq!(only_b.len(), 2);
        assert!(only_b.iter().all(|h| h.strategy == "b"));

        assert!(top_signals(&reports, Signal::Hold, None, 5).is_empty());
    }

    #[test]
    fn equal_confidence_keeps_submission_order() {
        let reports = vec![
            report("000003.SZ", vec![ok("a", Signal::Sell, 0.6)]),
            report("000004.SZ", vec![ok("a", Signal::Sell, 0.6)]),
        ];
        let hits = top_signals(&reports, Signal::Sell, None, 2);
        assert_eq!(hits[0].symbol, "000003.SZ");
        assert_eq!(hits[1].symbol, "000004.SZ");
    }

    #[test]
    fn consensus_ranking_skips_failures_and_breaks_ties_on_confidence() {
        let ranked = consensus_ranking(&sample(), 10);
        let symbols: Vec<&str> = ranked.iter().map(|r| r.symbol.as_str()).collect();
        // 000002 and 000001 both score 1.0; 000002's lone BUY is 0.8 against 0.75.
        assert_eq!(symbols, vec!["000002.SZ", "000001.SZ", "600001.SH"]);
        assert_eq!(consensus_ranking(&sample(), 1).len(), 1);
    }
}
