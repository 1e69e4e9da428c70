use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// Snapshot handed to a progress callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    /// Symbol whose completion triggered this update.
    pub symbol: String,
}

impl ProgressUpdate {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

impl std::fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%) - {}",
            self.completed,
            self.total,
            self.percent(),
            self.symbol
        )
    }
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Callback that logs each update at info level.
pub fn log_progress() -> ProgressCallback {
    Arc::new(|update: &ProgressUpdate| {
        info!(
            completed = update.completed,
            total = update.total,
            symbol = %update.symbol,
            "Progress {update}"
        );
    })
}

/// Lets at most one update through per `interval`. The first always passes.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
