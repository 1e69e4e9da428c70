pub mod config;
pub mod error;
pub mod frame;
pub mod indicators;
pub mod registry;
pub mod strategies;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use error::StrategyError;
pub use frame::{Frame, Row};
pub use registry::StrategyRegistry;

use common::{AnalysisResult, Bar, Series};
use tracing::{debug, warn};

/// Columns every input series must carry at least one defined value for.
pub const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// All strategy implementations must satisfy this trait.
///
/// Implementors supply the two pure steps, indicator enrichment and the
/// decision on the latest bar. [`Strategy::analyze`] wraps them with the
/// validation, cleaning and sanitizing every strategy shares, and is the
/// only entry point callers should use.
pub trait Strategy: Send + Sync {
    /// Name of this strategy instance, as registered.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Minimum number of bars needed for a meaningful decision.
    fn startup_window(&self) -> usize;

    /// Enrich a cleaned series with indicator columns and flags.
    /// Must not depend on anything but `series`.
    fn compute_indicators(&self, series: &Series) -> Result<Frame, StrategyError>;

    /// Decide on the most recent row of `frame`.
    fn decide(&self, frame: &Frame) -> Result<AnalysisResult, StrategyError>;

    /// Validate, clean, enrich, decide and sanitize. Never fails: any problem
    /// becomes a HOLD with zero confidence and a reason saying what went wrong.
    fn analyze(&self, series: &Series) -> AnalysisResult {
        if let Err(e) = validate(series, self.startup_window()) {
            debug!(strategy = %self.name(), symbol = %series.symbol, reason = %e, "Series rejected");
            return AnalysisResult::hold(e.to_string());
        }

        let cleaned = series.cleaned();
        if cleaned.len() < self.startup_window() {
            let e = StrategyError::InsufficientData {
                required: self.startup_window(),
                available: cleaned.len(),
            };
            debug!(strategy = %self.name(), symbol = %series.symbol, reason = %e, "Series rejected after cleaning");
            return AnalysisResult::hold(e.to_string());
        }

        match self
            .compute_indicators(&cleaned)
            .and_then(|frame| self.decide(&frame))
        {
            Ok(result) => result.sanitized(),
            Err(e) => {
                warn!(strategy = %self.name(), symbol = %series.symbol, error = %e, "Strategy analysis failed");
                AnalysisResult::hold(format!("analysis error: {e}"))
            }
        }
    }
}

/// Check a raw series before any computation.
///
/// A column counts as missing when none of its values is defined. An empty
/// series is reported as insufficient data rather than as missing columns.
pub fn validate(series: &Series, startup_window: usize) -> Result<(), StrategyError> {
    if series.is_empty() {
        return Err(StrategyError::InsufficientData {
            required: startup_window,
            available: 0,
        });
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !series.bars.iter().any(|b| field(b, name).is_finite()))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StrategyError::MissingColumns(missing));
    }

    if series.len() < startup_window {
        return Err(StrategyError::InsufficientData {
            required: startup_window,
            available: series.len(),
        });
    }
    Ok(())
}

fn field(bar: &Bar, name: &str) -> f64 {
    match name {
        "open" => bar.open,
        "high" => bar.high,
        "low" => bar.low,
        "close" => bar.close,
        "volume" => bar.volume,
        _ => f64::NAN,
    }
}
