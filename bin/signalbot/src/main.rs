use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, Signal};
use engine::{log_progress, BatchConfig, BatchError, BatchOrchestrator, BatchRun, Evaluator};
use store::SqliteStore;
use strategy::{StrategyFileConfig, StrategyRegistry};

const TOP_SIGNALS: usize = 10;
const TOP_CONSENSUS: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    info!(
        workers = cfg.batch_workers,
        lookback_days = cfg.lookback_days,
        universe_limit = cfg.universe_limit,
        "SignalBot starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let store = Arc::new(
        SqliteStore::connect(&cfg.database_url)
            .await
            .with_context(|| format!("opening database at {}", cfg.database_url))?,
    );
    info!("Database ready");

    // ── Strategy registry ─────────────────────────────────────────────────────
    let registry = match &cfg.strategy_config_path {
        Some(path) => StrategyRegistry::from_config(&StrategyFileConfig::load(path)?)?,
        None => StrategyRegistry::with_builtin(),
    };
    info!(strategies = ?registry.list(), "Strategies ready");

    // ── Batch ─────────────────────────────────────────────────────────────────
    let evaluator = Evaluator::new(Arc::new(registry), store.clone(), cfg.lookback_days);
    let orchestrator = BatchOrchestrator::new(Arc::new(evaluator), BatchConfig::from(&cfg))
        .with_universe(store.clone())
        .with_sink(store.clone());

    let run = match orchestrator
        .run(None, &cfg.strategies, Some(log_progress()))
        .await
    {
        Ok(run) => run,
        Err(BatchError::Persistence { error, run }) => {
            warn!(error = %error, "Batch finished but its record could not be closed");
            *run
        }
        Err(e) => return Err(e).context("batch run failed"),
    };

    report(&run)?;
    Ok(())
}

fn report(run: &BatchRun) -> anyhow::Result<()> {
    let summary = &run.summary;
    info!(
        run_id = %run.run_id,
        batch_id = ?run.batch_id,
        symbols = summary.total_symbols,
        succeeded = summary.succeeded_symbols,
        failed = summary.failed_symbols,
        saved = run.persistence.saved,
        "Batch summary"
    );

    for stats in &summary.strategies {
        info!(
            strategy = %stats.strategy,
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            buy = stats.signals.buy,
            sell = stats.signals.sell,
            hold = stats.signals.hold,
            avg_buy_confidence = %format!("{:.3}", stats.average_confidence.buy),
            avg_sell_confidence = %format!("{:.3}", stats.average_confidence.sell),
            "Strategy summary"
        );
    }

    for signal in [Signal::Buy, Signal::Sell] {
        for (rank, hit) in run.top_signals(signal, None, TOP_SIGNALS).iter().enumerate() {
            info!(
                rank = rank + 1,
                %signal,
                symbol = %hit.symbol,
                strategy = %hit.strategy,
                confidence = %format!("{:.3}", hit.confidence),
                reasons = %hit.reasons.join("; "),
                "Top signal"
            );
        }
    }

    for (rank, entry) in run.consensus_ranking(TOP_CONSENSUS).iter().enumerate() {
        info!(
            rank = rank + 1,
            symbol = %entry.symbol,
            score = %format!("{:.2}", entry.consensus.consensus_score),
            "{}",
            entry.consensus.recommendation
        );
    }

    debug!(summary = %serde_json::to_string(summary)?, "Batch summary (json)");
    Ok(())
}
