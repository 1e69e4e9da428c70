//! The built-in strategy variants and the scoring helpers they share.

pub mod adx_trend;
pub mod bollinger;
pub mod kdj;
pub mod ma_crossover;
pub mod macd_cross;
pub mod rsi_reversal;

pub use adx_trend::{AdxTrend, AdxTrendParams};
pub use bollinger::{BollingerReversion, BollingerParams};
pub use kdj::{KdjParams, KdjStochastic};
pub use ma_crossover::{MaCrossover, MaCrossoverParams};
pub use macd_cross::{MacdCross, MacdCrossParams};
pub use rsi_reversal::{RsiReversal, RsiReversalParams};

use std::collections::BTreeMap;

use common::{AnalysisResult, IndicatorValue, Signal};

use crate::indicators::{ops, sma};
use crate::{Frame, Row, StrategyError};

/// Window of the volume average that `volume_ratio` compares against.
pub(crate) const VOLUME_SMA_PERIOD: usize = 20;

/// Confidence of the default HOLD when no rule fires.
pub(crate) const NEUTRAL_CONFIDENCE: f64 = 0.5;

// ─── Shared columns ───────────────────────────────────────────────────────────

/// Inserts `volume_sma` and `volume_ratio` (volume over its 20-bar mean).
pub(crate) fn insert_volume_ratio(frame: &mut Frame) -> Result<(), StrategyError> {
    let volume = frame.volume();
    let volume_sma = sma(&volume, VOLUME_SMA_PERIOD);
    frame.insert("volume_ratio", ops::div(&volume, &volume_sma))?;
    frame.insert("volume_sma", volume_sma)?;
    Ok(())
}

pub(crate) fn last_row(frame: &Frame) -> Result<Row<'_>, StrategyError> {
    frame.last().ok_or(StrategyError::InsufficientData {
        required: 1,
        available: 0,
    })
}

/// Latest values of `names`, in the shape results report them.
pub(crate) fn snapshot(row: &Row<'_>, names: &[&str]) -> BTreeMap<String, IndicatorValue> {
    names
        .iter()
        .map(|name| (name.to_string(), IndicatorValue::Number(row.value(name))))
        .collect()
}

pub(crate) fn hold(reason: impl Into<String>, indicators: BTreeMap<String, IndicatorValue>) -> AnalysisResult {
    AnalysisResult::new(Signal::Hold, NEUTRAL_CONFIDENCE, vec![reason.into()], indicators)
}

// ─── Base-plus-bonus scoring ──────────────────────────────────────────────────

/// A primary trigger sets the base confidence; each corroborating
/// condition that holds adds its bonus and its reason.
#[derive(Debug, Clone)]
pub(crate) struct Scored {
    confidence: f64,
    reasons: Vec<String>,
}

impl Scored {
    pub fn base(confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            confidence,
            reasons: vec![reason.into()],
        }
    }

    pub fn bonus(mut self, holds: bool, amount: f64, reason: impl FnOnce() -> String) -> Self {
        if holds {
            self.confidence += amount;
            self.reasons.push(reason());
        }
        self
    }

    /// Final result, confidence capped at 1.0.
    pub fn finish(self, signal: Signal, indicators: BTreeMap<String, IndicatorValue>) -> AnalysisResult {
        AnalysisResult::new(signal, self.confidence.min(1.0), self.reasons, indicators)
    }
}

// ─── Fraction-satisfied scoring ───────────────────────────────────────────────

/// Ordered conditions scored as the fraction that hold.
#[derive(Debug, Clone, Default)]
pub(crate) struct Checklist {
    total: usize,
    satisfied: Vec<String>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, holds: bool, reason: impl FnOnce() -> String) {
        self.total += 1;
        if holds {
            self.satisfied.push(reason());
        }
    }

    pub fn score(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.satisfied.len() as f64 / self.total as f64
        }
    }

    pub fn into_reasons(self) -> Vec<String> {
        self.satisfied
    }
}

/// `rsi(42.0)` style label used in reasons.
pub(crate) fn label(name: &str, value: f64) -> String {
    format!("{name}({value:.1})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_caps_at_one() {
        let result = Scored::base(0.85, "trigger")
            .bonus(true, 0.1, || "a".into())
            .bonus(true, 0.05, || "b".into())
            .bonus(true, 0.05, || "c".into())
            .finish(Signal::Buy, BTreeMap::new());
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reasons, vec!["trigger", "a", "b", "c"]);
    }

    #[test]
    fn scored_skips_failed_conditions() {
        let result = Scored::base(0.7, "trigger")
            .bonus(false, 0.1, || "a".into())
            .bonus(true, 0.05, || "b".into())
            .finish(Signal::Sell, BTreeMap::new());
        assert!((result.confidence - 0.75).abs() < 1e-12);
        assert_eq!(result.reasons, vec!["trigger", "b"]);
    }

    #[test]
    fn checklist_scores_fraction() {
        let mut list = Checklist::new();
        list.check(true, || "one".into());
        list.check(false, || "two".into());
        list.check(true, || "three".into());
        list.check(false, || "four".into());
        assert_eq!(list.score(), 0.5);
        assert_eq!(list.into_reasons(), vec!["one", "three"]);
        assert_eq!(Checklist::new().score(), 0.0);
    }
}
