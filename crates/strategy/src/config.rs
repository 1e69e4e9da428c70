use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::StrategyError;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "rsi_reversal"
///
/// [[strategy]]
/// type = "macd_cross"
/// name = "macd_fast"
///
/// [strategy.params]
/// fast = 8
/// slow = 17
/// signal = 9
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier, one of the built-in ids such as "kdj".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Name the instance is registered under; defaults to the type.
    #[serde(default)]
    pub name: Option<String>,
    /// Indicator-specific parameters. Anything not given keeps its default.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyConfig {
    pub fn registered_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.strategy_type)
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StrategyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrategyError::Config(format!(
                "failed to read strategy config at '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&content).map_err(|e| match e {
            StrategyError::Config(msg) => {
                StrategyError::Config(format!("{msg} (in '{}')", path.display()))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, StrategyError> {
        toml::from_str(content)
            .map_err(|e| StrategyError::Config(format!("failed to parse strategy config: {e}")))
    }
}

// ─── Parameter lookup ─────────────────────────────────────────────────────────

/// Float parameter; integers are accepted too. Absent keys yield `default`.
pub(crate) fn param_f64(
    params: &HashMap<String, toml::Value>,
    key: &str,
    default: f64,
) -> Result<f64, StrategyError> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_float()
            .or_else(|| v.as_integer().map(|i| i as f64))
            .ok_or_else(|| invalid(key, "expected a number")),
    }
}

/// Non-negative integer parameter. Absent keys yield `default`.
pub(crate) fn param_usize(
    params: &HashMap<String, toml::Value>,
    key: &str,
    default: usize,
) -> Result<usize, StrategyError> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_integer()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| invalid(key, "expected a non-negative integer")),
    }
}

fn invalid(key: &str, reason: &str) -> StrategyError {
    StrategyError::InvalidParam {
        name: key.to_string(),
        reason: reason.to_string(),
    }
}
