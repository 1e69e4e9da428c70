use std::time::Duration;

use crate::{Error, Result};

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Database holding bars, the universe ranking and analysis results
    pub database_url: String,

    // Optional TOML file overriding the built-in strategy set
    pub strategy_config_path: Option<String>,

    // Strategies to run; empty means every registered strategy
    pub strategies: Vec<String>,

    // Batch
    pub batch_workers: usize,
    pub lookback_days: u32,
    pub universe_limit: usize,
    pub progress_interval: Duration,
    pub task_timeout: Option<Duration>,
    pub batch_name: Option<String>,
}

impl Config {
    /// Load configuration from the environment. Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` delegates here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Required environment variable 'DATABASE_URL' is not set. Check your .env file."
                        .to_string(),
                )
            })?;

        let batch_workers: usize = parse_or(&lookup, "BATCH_WORKERS", 4)?;
        if batch_workers == 0 {
            return Err(Error::Config("BATCH_WORKERS must be at least 1".to_string()));
        }

        let strategies = lookup("STRATEGIES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            database_url,
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH"),
            strategies,
            batch_workers,
            lookback_days: parse_or(&lookup, "LOOKBACK_DAYS", 30)?,
            universe_limit: parse_or(&lookup, "UNIVERSE_LIMIT", 1000)?,
            progress_interval: Duration::from_secs(parse_or(&lookup, "PROGRESS_INTERVAL_SECS", 5)?),
            task_timeout: match lookup("TASK_TIMEOUT_SECS") {
                Some(v) => Some(Duration::from_secs(parse_value("TASK_TIMEOUT_SECS", &v)?)),
                None => None,
            },
            batch_name: lookup("BATCH_NAME"),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has an invalid value: '{value}'")))
}
