use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{BatchStatus, Config, PersistenceSink, Signal, UniverseProvider};

use crate::evaluator::{panic_message, Evaluator, SymbolReport};
use crate::progress::{ProgressCallback, ProgressThrottle, ProgressUpdate};
use crate::summary::{self, BatchSummary, RankedConsensus, SignalHit};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub workers: usize,
    pub universe_limit: usize,
    pub progress_interval: Duration,
    /// Log a progress line every this many completions; 0 disables it.
    pub log_every: usize,
    pub task_timeout: Option<Duration>,
    pub batch_name: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            universe_limit: 1000,
            progress_interval: Duration::from_secs(5),
            log_every: 10,
            task_timeout: None,
            batch_name: None,
        }
    }
}

impl From<&Config> for BatchConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            workers: cfg.batch_workers,
            universe_limit: cfg.universe_limit,
            progress_interval: cfg.progress_interval,
            task_timeout: cfg.task_timeout,
            batch_name: cfg.batch_name.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no symbols to analyze")]
    NoSymbols,

    #[error("no symbol list given and no universe provider attached")]
    NoUniverse,

    #[error("universe provider failed: {0}")]
    Universe(#[source] common::Error),

    #[error("could not open batch record: {0}")]
    Sink(#[source] common::Error),

    /// The run finished but closing it out in the sink failed.
    #[error("persisting batch results failed: {error}")]
    Persistence {
        #[source]
        error: common::Error,
        run: Box<BatchRun>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceReport {
    pub saved: usize,
    /// Failed strategy outcomes plus rejected writes.
    pub failed: usize,
}

/// A finished batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub run_id: Uuid,
    /// Sink batch id, when a sink is attached.
    pub batch_id: Option<i64>,
    pub symbols: Vec<String>,
    pub strategies: Vec<String>,
    /// One report per symbol, in submission order.
    pub results: Vec<SymbolReport>,
    pub summary: BatchSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub persistence: PersistenceReport,
}

impl BatchRun {
    pub fn report(&self, symbol: &str) -> Option<&SymbolReport> {
        self.results.iter().find(|r| r.symbol == symbol)
    }

    pub fn top_signals(&self, signal: Signal, strategy: Option<&str>, k: usize) -> Vec<SignalHit> {
        summary::top_signals(&self.results, signal, strategy, k)
    }

    pub fn consensus_ranking(&self, limit: usize) -> Vec<RankedConsensus> {
        summary::consensus_ranking(&self.results, limit)
    }
}

// ─── Orchestrator ─────────────────────────────────────────────────────────────

/// Fans single-symbol evaluations out over a fixed pool of workers.
///
/// Workers pull `(index, symbol)` pairs off a shared queue and run each
/// evaluation on the blocking pool. A single aggregator drains finished
/// reports; the index puts them back in submission order before anything
/// is summed, so the outcome does not depend on scheduling.
pub struct BatchOrchestrator {
    evaluator: Arc<Evaluator>,
    universe: Option<Arc<dyn UniverseProvider>>,
    sink: Option<Arc<dyn PersistenceSink>>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(evaluator: Arc<Evaluator>, config: BatchConfig) -> Self {
        Self {
            evaluator,
            universe: None,
            sink: None,
            config,
        }
    }

    pub fn with_universe(mut self, universe: Arc<dyn UniverseProvider>) -> Self {
        self.universe = Some(universe);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Evaluate `symbols` (or the universe's top symbols when `None`) with
    /// `strategies` (empty means all registered).
    pub async fn run(
        &self,
        symbols: Option<Vec<String>>,
        strategies: &[String],
        progress: Option<ProgressCallback>,
    ) -> Result<BatchRun, BatchError> {
        let symbols = self.resolve_symbols(symbols).await?;
        let strategies = Arc::new(self.evaluator.resolve(strategies));
        let total = symbols.len();
        let workers = self.config.workers.clamp(1, total);
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            %run_id,
            symbols = total,
            strategies = strategies.len(),
            workers,
            "Batch started"
        );

        let batch_id = match &self.sink {
            Some(sink) => Some(
                sink.create_batch(&strategies, total, self.config.batch_name.as_deref())
                    .await
                    .map_err(BatchError::Sink)?,
            ),
            None => None,
        };

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for (index, symbol) in symbols.iter().enumerate() {
            if queue_tx.send((index, symbol.clone())).is_err() {
                break;
            }
        }
        drop(queue_tx);
        let queue = Arc::new(Mutex::new(queue_rx));

        let (report_tx, mut report_rx) = mpsc::channel(workers * 2);
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&queue),
                    report_tx.clone(),
                    Arc::clone(&self.evaluator),
                    Arc::clone(&strategies),
                    self.config.task_timeout,
                ))
            })
            .collect();
        drop(report_tx);

        let mut slots: Vec<Option<SymbolReport>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        let mut throttle = ProgressThrottle::new(self.config.progress_interval);
        while let Some((index, report)) = report_rx.recv().await {
            completed += 1;
            if self.config.log_every > 0 && completed % self.config.log_every == 0 {
                info!(%run_id, completed, total, "Batch progress");
            }
            if let Some(callback) = &progress {
                if throttle.ready(Instant::now()) {
                    callback(&ProgressUpdate {
                        completed,
                        total,
                        symbol: report.symbol.clone(),
                    });
                }
            }
            slots[index] = Some(report);
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(%run_id, error = %e, "Batch worker aborted");
            }
        }

        let results: Vec<SymbolReport> = slots
            .into_iter()
            .zip(&symbols)
            .map(|(slot, symbol)| {
                slot.unwrap_or_else(|| {
                    SymbolReport::failed(symbol, &strategies, "task produced no report")
                })
            })
            .collect();
        let summary = BatchSummary::from_reports(&results, &strategies);

        let mut run = BatchRun {
            run_id,
            batch_id,
            symbols,
            strategies: strategies.to_vec(),
            results,
            summary,
            started_at,
            finished_at: Utc::now(),
            persistence: PersistenceReport::default(),
        };

        if let (Some(sink), Some(batch_id)) = (&self.sink, batch_id) {
            run.persistence = save_results(sink.as_ref(), batch_id, &run.results).await;
            if let Err(error) = sink
                .update_batch_status(
                    batch_id,
                    BatchStatus::Completed,
                    run.persistence.saved,
                    run.persistence.failed,
                )
                .await
            {
                error!(%run_id, batch_id, error = %error, "Failed to complete batch record");
                return Err(BatchError::Persistence {
                    error,
                    run: Box::new(run),
                });
            }
        }

        info!(
            %run_id,
            succeeded = run.summary.succeeded_symbols,
            failed = run.summary.failed_symbols,
            saved = run.persistence.saved,
            elapsed_ms = (run.finished_at - run.started_at).num_milliseconds(),
            "Batch finished"
        );
        Ok(run)
    }

    async fn resolve_symbols(&self, symbols: Option<Vec<String>>) -> Result<Vec<String>, BatchError> {
        let symbols = match symbols {
            Some(list) => list,
            None => {
                let universe = self.universe.as_ref().ok_or(BatchError::NoUniverse)?;
                let list = universe
                    .top_symbols(self.config.universe_limit)
                    .await
                    .map_err(BatchError::Universe)?;
                info!(count = list.len(), limit = self.config.universe_limit, "Loaded universe");
                list
            }
        };
        if symbols.is_empty() {
            return Err(BatchError::NoSymbols);
        }
        Ok(symbols)
    }
}

async fn worker(
    id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<(usize, String)>>>,
    reports: mpsc::Sender<(usize, SymbolReport)>,
    evaluator: Arc<Evaluator>,
    strategies: Arc<Vec<String>>,
    timeout: Option<Duration>,
) {
    let mut done = 0usize;
    loop {
        let next = queue.lock().await.recv().await;
        let Some((index, symbol)) = next else { break };
        let report = evaluate_isolated(&evaluator, &symbol, &strategies, timeout).await;
        done += 1;
        if reports.send((index, report)).await.is_err() {
            warn!(worker = id, "Aggregator gone, stopping worker");
            break;
        }
    }
    debug!(worker = id, tasks = done, "Worker finished");
}

/// One symbol on the blocking pool. Panics and timeouts become a failed report.
async fn evaluate_isolated(
    evaluator: &Arc<Evaluator>,
    symbol: &str,
    strategies: &Arc<Vec<String>>,
    timeout: Option<Duration>,
) -> SymbolReport {
    let task = {
        let evaluator = Arc::clone(evaluator);
        let strategies = Arc::clone(strategies);
        let symbol = symbol.to_string();
        tokio::task::spawn_blocking(move || evaluator.evaluate(&symbol, &strategies))
    };

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(symbol, timeout_ms = limit.as_millis() as u64, "Symbol task timed out");
                return SymbolReport::failed(
                    symbol,
                    strategies,
                    format!("timed out after {:.1}s", limit.as_secs_f64()),
                );
            }
        },
        None => task.await,
    };

    match joined {
        Ok(report) => report,
        Err(e) if e.is_panic() => {
            let msg = panic_message(e.into_panic().as_ref());
            error!(symbol, panic = %msg, "Symbol task panicked");
            SymbolReport::failed(symbol, strategies, format!("task panicked: {msg}"))
        }
        Err(e) => {
            error!(symbol, error = %e, "Symbol task cancelled");
            SymbolReport::failed(symbol, strategies, format!("task cancelled: {e}"))
        }
    }
}

async fn save_results(
    sink: &dyn PersistenceSink,
    batch_id: i64,
    results: &[SymbolReport],
) -> PersistenceReport {
    let mut report = PersistenceReport::default();
    for symbol_report in results {
        for sr in &symbol_report.strategies {
            let strategy = sr.strategy.as_str();
            let Some(result) = sr.outcome.result() else {
                report.failed += 1;
                continue;
            };
            match sink.save(result, &symbol_report.symbol, strategy, Some(batch_id)).await {
                Ok(_) => report.saved += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        batch_id,
                        symbol = %symbol_report.symbol,
                        strategy,
                        error = %e,
                        "Failed to save result"
                    );
                }
            }
        }
    }
    report
}
