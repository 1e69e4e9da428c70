use serde::{Deserialize, Serialize};

use common::{AnalysisResult, Signal, SignalCounts, SignalMap};

/// Agreement at or above this share of votes is a strong recommendation.
pub const STRONG_AGREEMENT: f64 = 0.7;
/// Agreement at or above this share (and below strong) is a lean.
pub const LEAN_AGREEMENT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusBand {
    Strong,
    Lean,
    Divergent,
}

impl ConsensusBand {
    pub fn from_score(score: f64) -> Self {
        if score >= STRONG_AGREEMENT {
            ConsensusBand::Strong
        } else if score >= LEAN_AGREEMENT {
            ConsensusBand::Lean
        } else {
            ConsensusBand::Divergent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusBand::Strong => "strong",
            ConsensusBand::Lean => "lean",
            ConsensusBand::Divergent => "divergent, hold",
        }
    }
}

impl std::fmt::Display for ConsensusBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote across the strategies that succeeded on one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub signal_distribution: SignalCounts,
    /// Mean confidence of the strategies voting each signal; 0.0 with no votes.
    pub average_confidence: SignalMap<f64>,
    /// Most voted signal. Ties go to BUY, then SELL, then HOLD.
    pub main_signal: Signal,
    /// Votes for the main signal over the number of successful strategies.
    pub consensus_score: f64,
    pub successful: usize,
    pub band: ConsensusBand,
    pub recommendation: String,
}

impl Consensus {
    /// `None` when there is nothing to vote on.
    pub fn from_results<'a, I>(results: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a AnalysisResult>,
    {
        let mut counts = SignalCounts::default();
        let mut confidence_sum = SignalMap::<f64>::default();
        for result in results {
            *counts.get_mut(result.signal) += 1;
            *confidence_sum.get_mut(result.signal) += result.confidence;
        }

        let successful = counts.buy + counts.sell + counts.hold;
        if successful == 0 {
            return None;
        }

        let mut average_confidence = SignalMap::<f64>::default();
        for signal in Signal::ALL {
            let n = *counts.get(signal);
            *average_confidence.get_mut(signal) = if n > 0 {
                confidence_sum.get(signal) / n as f64
            } else {
                0.0
            };
        }

        // Signal::ALL is in priority order and only a strictly larger count
        // displaces the current pick.
        let mut main_signal = Signal::Buy;
        for signal in Signal::ALL {
            if counts.get(signal) > counts.get(main_signal) {
                main_signal = signal;
            }
        }

        let main_votes = *counts.get(main_signal);
        let consensus_score = main_votes as f64 / successful as f64;
        let band = ConsensusBand::from_score(consensus_score);
        let main_confidence = *average_confidence.get(main_signal);
        let recommendation = match band {
            ConsensusBand::Strong => format!(
                "strong {main_signal} - {main_votes}/{successful} strategies agree (avg confidence {:.1}%)",
                main_confidence * 100.0
            ),
            ConsensusBand::Lean => format!(
                "lean {main_signal} - {main_votes}/{successful} strategies support (avg confidence {:.1}%)",
                main_confidence * 100.0
            ),
            ConsensusBand::Divergent => {
                "divergent signals - hold or analyze further".to_string()
            }
        };

        Some(Self {
            signal_distribution: counts,
            average_confidence,
            main_signal,
            consensus_score,
            successful,
            band,
            recommendation,
        })
    }

    /// Average confidence of the strategies that voted for the main signal.
    pub fn main_confidence(&self) -> f64 {
        *self.average_confidence.get(self.main_signal)
    }
}
