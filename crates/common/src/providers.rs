use async_trait::async_trait;

use crate::{AnalysisResult, BatchStatus, Result, Series};

/// Source of historical bars.
///
/// Called synchronously from inside a batch task, so implementations may
/// block. An unknown symbol or a quiet period is an empty [`Series`], not an
/// error; `Err` is reserved for the provider itself being unavailable.
pub trait HistoryProvider: Send + Sync {
    /// Bars for `symbol` covering the last `lookback_days` days.
    /// `symbol` may use either notation accepted by [`crate::SymbolCode`].
    fn get(&self, symbol: &str, lookback_days: u32) -> Result<Series>;
}

/// Supplies the symbol universe when a batch is started without an explicit list.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Up to `limit` identifiers, most relevant first.
    async fn top_symbols(&self, limit: usize) -> Result<Vec<String>>;
}

/// Destination for finished analysis results.
///
/// The engine depends only on this contract, never on a schema.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Open a batch record in the `running` state and return its id.
    async fn create_batch(
        &self,
        strategies: &[String],
        total_symbols: usize,
        name: Option<&str>,
    ) -> Result<i64>;

    /// Store one result and return its record id.
    async fn save(
        &self,
        result: &AnalysisResult,
        symbol: &str,
        strategy: &str,
        batch_id: Option<i64>,
    ) -> Result<i64>;

    /// Move a batch to `status`. Repeating a transition that already
    /// happened is a no-op, not an error.
    async fn update_batch_status(
        &self,
        batch_id: i64,
        status: BatchStatus,
        success_count: usize,
        fail_count: usize,
    ) -> Result<()>;
}
