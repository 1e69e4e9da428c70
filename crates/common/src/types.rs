use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV interval. Undefined values arrive as non-finite floats (NaN)
/// and are cleaned out by [`Series::cleaned`] where they matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Traded amount (price × volume in quote currency).
    pub amount: f64,
}

/// Ordered bars for a single symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl Series {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Sorted ascending by timestamp, one bar per timestamp (the last one
    /// supplied wins), bars with an undefined close dropped.
    pub fn cleaned(&self) -> Series {
        let mut bars: Vec<Bar> = self
            .bars
            .iter()
            .copied()
            .filter(|b| b.close.is_finite())
            .collect();
        // Stable sort keeps supply order among equal timestamps.
        bars.sort_by_key(|b| b.timestamp);

        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Series::new(self.symbol.clone(), deduped)
    }
}

/// Discrete recommendation emitted by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// All signals in tie-break priority order.
    pub const ALL: [Signal; 3] = [Signal::Buy, Signal::Sell, Signal::Hold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Signal {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            other => Err(crate::Error::Other(format!("unknown signal '{other}'"))),
        }
    }
}

/// One value per signal. Used for vote counts and per-signal averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMap<T> {
    pub buy: T,
    pub sell: T,
    pub hold: T,
}

impl<T> SignalMap<T> {
    pub fn get(&self, signal: Signal) -> &T {
        match signal {
            Signal::Buy => &self.buy,
            Signal::Sell => &self.sell,
            Signal::Hold => &self.hold,
        }
    }

    pub fn get_mut(&mut self, signal: Signal) -> &mut T {
        match signal {
            Signal::Buy => &mut self.buy,
            Signal::Sell => &mut self.sell,
            Signal::Hold => &mut self.hold,
        }
    }
}

/// Vote count per signal.
pub type SignalCounts = SignalMap<usize>;

/// A reported indicator value: numeric, or a text marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Number(f64),
    Text(String),
}

impl IndicatorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndicatorValue::Number(v) => Some(*v),
            IndicatorValue::Text(_) => None,
        }
    }
}

impl From<f64> for IndicatorValue {
    fn from(v: f64) -> Self {
        IndicatorValue::Number(v)
    }
}

impl From<&str> for IndicatorValue {
    fn from(v: &str) -> Self {
        IndicatorValue::Text(v.to_string())
    }
}

impl From<String> for IndicatorValue {
    fn from(v: String) -> Self {
        IndicatorValue::Text(v)
    }
}

/// Outcome of one strategy over one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub signal: Signal,
    /// Certainty in `[0, 1]`.
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub indicators: BTreeMap<String, IndicatorValue>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(
        signal: Signal,
        confidence: f64,
        reasons: Vec<String>,
        indicators: BTreeMap<String, IndicatorValue>,
    ) -> Self {
        Self {
            signal,
            confidence,
            reasons,
            indicators,
            timestamp: Utc::now(),
        }
    }

    /// HOLD with zero confidence and no indicators.
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::new(Signal::Hold, 0.0, vec![reason.into()], BTreeMap::new())
    }

    /// Replace non-finite numbers with neutral values: confidence becomes
    /// 0.0 (and is clamped into `[0, 1]`), numeric indicators become 0.0.
    pub fn sanitized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        for value in self.indicators.values_mut() {
            if let IndicatorValue::Number(v) = value {
                if !v.is_finite() {
                    *v = 0.0;
                }
            }
        }
        self
    }
}

/// Lifecycle of a persisted batch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
        }
    }
}
