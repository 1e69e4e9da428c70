use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::runtime::Handle;
use tracing::{debug, info};

use common::{
    AnalysisResult, Bar, BatchStatus, Error, HistoryProvider, IndicatorValue, PersistenceSink,
    Result, Series, Signal, SymbolCode, UniverseProvider,
};

/// SQLite-backed bar history, symbol universe and result store.
///
/// Async throughout, except for [`HistoryProvider::get`], which blocks on the
/// runtime the store was opened on. Call it from a blocking thread
/// (`spawn_blocking`), never from inside an async task.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    handle: Handle,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database. A single connection that never expires,
    /// so every query sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("../../migrations").run(&pool).await?;
        debug!("Store migrations applied");
        Ok(Self {
            pool,
            handle: Handle::current(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ─── Bars ─────────────────────────────────────────────────────────────────

    /// Upsert `bars` for `symbol`. Returns the number of rows written.
    pub async fn insert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<u64> {
        let key = storage_key(symbol);
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for bar in bars {
            written += sqlx::query(
                r#"
                INSERT INTO bars (symbol, ts, open, high, low, close, volume, amount)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(symbol, ts) DO UPDATE SET
                    open = excluded.open, high = excluded.high, low = excluded.low,
                    close = excluded.close, volume = excluded.volume, amount = excluded.amount
                "#,
            )
            .bind(&key)
            .bind(bar.timestamp.timestamp())
            .bind(defined(bar.open))
            .bind(defined(bar.high))
            .bind(defined(bar.low))
            .bind(defined(bar.close))
            .bind(defined(bar.volume))
            .bind(defined(bar.amount))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        debug!(symbol = %key, written, "Bars stored");
        Ok(written)
    }

    /// Bars for `symbol` at or after `since`, oldest first.
    pub async fn bars_since(&self, symbol: &str, since: DateTime<Utc>) -> Result<Series> {
        let key = storage_key(symbol);
        let rows = sqlx::query(
            r#"SELECT ts, open, high, low, close, volume, amount
               FROM bars WHERE symbol = ?1 AND ts >= ?2 ORDER BY ts ASC"#,
        )
        .bind(&key)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;

        let bars = rows
            .iter()
            .map(|row| -> Result<Bar> {
                let ts: i64 = row.try_get("ts")?;
                Ok(Bar {
                    timestamp: DateTime::from_timestamp(ts, 0)
                        .ok_or_else(|| Error::History(format!("bad bar timestamp {ts} for {key}")))?,
                    open: undefined_as_nan(row.try_get("open")?),
                    high: undefined_as_nan(row.try_get("high")?),
                    low: undefined_as_nan(row.try_get("low")?),
                    close: undefined_as_nan(row.try_get("close")?),
                    volume: undefined_as_nan(row.try_get("volume")?),
                    amount: undefined_as_nan(row.try_get("amount")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Series::new(key, bars))
    }

    // ─── Results ──────────────────────────────────────────────────────────────

    /// Most recent stored result for (`symbol`, `strategy`).
    pub async fn latest_result(&self, symbol: &str, strategy: &str) -> Result<Option<StoredResult>> {
        let row = sqlx::query(
            r#"SELECT id, batch_id, symbol, strategy, signal, confidence, reasons, indicators, analyzed_at
               FROM analysis_results WHERE symbol = ?1 AND strategy = ?2
               ORDER BY analyzed_at DESC, id DESC LIMIT 1"#,
        )
        .bind(storage_key(symbol))
        .bind(strategy)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<StoredResult> {
            let signal: String = row.try_get("signal")?;
            let reasons: String = row.try_get("reasons")?;
            let indicators: String = row.try_get("indicators")?;
            let analyzed_at: String = row.try_get("analyzed_at")?;
            let result = AnalysisResult {
                signal: Signal::from_str(&signal)?,
                confidence: row.try_get("confidence")?,
                reasons: serde_json::from_str(&reasons)?,
                indicators: serde_json::from_str::<BTreeMap<String, IndicatorValue>>(&indicators)?,
                timestamp: parse_stamp(&analyzed_at)?,
            };
            Ok(StoredResult {
                id: row.try_get("id")?,
                batch_id: row.try_get("batch_id")?,
                symbol: row.try_get("symbol")?,
                strategy: row.try_get("strategy")?,
                result,
            })
        })
        .transpose()
    }

    /// Delete results analyzed more than `days_to_keep` days ago.
    pub async fn clear_old_results(&self, days_to_keep: u32) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days_to_keep));
        let deleted = sqlx::query("DELETE FROM analysis_results WHERE analyzed_at < ?1")
            .bind(stamp(cutoff))
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(days_to_keep, deleted, "Old analysis results cleared");
        Ok(deleted)
    }

    pub async fn batch(&self, batch_id: i64) -> Result<Option<BatchRecord>> {
        let row = sqlx::query(
            r#"SELECT id, name, strategies, total_symbols, success_count, fail_count, status,
                      started_at, finished_at
               FROM analysis_batches WHERE id = ?1"#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<BatchRecord> {
            let strategies: String = row.try_get("strategies")?;
            let status: String = row.try_get("status")?;
            let started_at: String = row.try_get("started_at")?;
            let finished_at: Option<String> = row.try_get("finished_at")?;
            Ok(BatchRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                strategies: serde_json::from_str(&strategies)?,
                total_symbols: row.try_get("total_symbols")?,
                success_count: row.try_get("success_count")?,
                fail_count: row.try_get("fail_count")?,
                status: parse_status(&status)?,
                started_at: parse_stamp(&started_at)?,
                finished_at: finished_at.as_deref().map(parse_stamp).transpose()?,
            })
        })
        .transpose()
    }
}

/// A result read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: i64,
    pub batch_id: Option<i64>,
    pub symbol: String,
    pub strategy: String,
    pub result: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub id: i64,
    pub name: String,
    pub strategies: Vec<String>,
    pub total_symbols: i64,
    pub success_count: i64,
    pub fail_count: i64,
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ─── Collaborator contracts ───────────────────────────────────────────────────

impl HistoryProvider for SqliteStore {
    fn get(&self, symbol: &str, lookback_days: u32) -> Result<Series> {
        let since = Utc::now() - chrono::Duration::days(i64::from(lookback_days));
        self.handle.block_on(self.bars_since(symbol, since))
    }
}

#[async_trait]
impl UniverseProvider for SqliteStore {
    /// Symbols ranked by average traded amount over all stored bars.
    async fn top_symbols(&self, limit: usize) -> Result<Vec<String>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"SELECT symbol FROM bars GROUP BY symbol
               ORDER BY AVG(amount) DESC, symbol ASC LIMIT ?1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get("symbol").map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl PersistenceSink for SqliteStore {
    async fn create_batch(
        &self,
        strategies: &[String],
        total_symbols: usize,
        name: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now();
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("batch_{}", now.format("%Y%m%d_%H%M%S")));
        let id = sqlx::query(
            r#"INSERT INTO analysis_batches (name, strategies, total_symbols, status, started_at)
               VALUES (?1, ?2, ?3, 'running', ?4)"#,
        )
        .bind(&name)
        .bind(serde_json::to_string(strategies)?)
        .bind(total_symbols as i64)
        .bind(stamp(now))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        info!(batch_id = id, name = %name, total_symbols, "Batch record opened");
        Ok(id)
    }

    async fn save(
        &self,
        result: &AnalysisResult,
        symbol: &str,
        strategy: &str,
        batch_id: Option<i64>,
    ) -> Result<i64> {
        let result = result.clone().sanitized();
        let id = sqlx::query(
            r#"INSERT INTO analysis_results
               (batch_id, symbol, strategy, signal, confidence, reasons, indicators, analyzed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )
        .bind(batch_id)
        .bind(storage_key(symbol))
        .bind(strategy)
        .bind(result.signal.as_str())
        .bind(result.confidence)
        .bind(serde_json::to_string(&result.reasons)?)
        .bind(serde_json::to_string(&result.indicators)?)
        .bind(stamp(result.timestamp))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn update_batch_status(
        &self,
        batch_id: i64,
        status: BatchStatus,
        success_count: usize,
        fail_count: usize,
    ) -> Result<()> {
        let finished_at = match status {
            BatchStatus::Completed => Some(stamp(Utc::now())),
            BatchStatus::Running => None,
        };
        let updated = sqlx::query(
            r#"UPDATE analysis_batches
               SET status = ?1, success_count = ?2, fail_count = ?3, finished_at = ?4
               WHERE id = ?5 AND status = 'running'"#,
        )
        .bind(status.to_string())
        .bind(success_count as i64)
        .bind(fail_count as i64)
        .bind(finished_at)
        .bind(batch_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM analysis_batches WHERE id = ?1")
                .bind(batch_id)
                .fetch_optional(&self.pool)
                .await?;
            if exists.is_none() {
                return Err(Error::Persistence(format!("batch {batch_id} not found")));
            }
            debug!(batch_id, %status, "Batch already closed, status left unchanged");
        } else {
            info!(batch_id, %status, success_count, fail_count, "Batch status updated");
        }
        Ok(())
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Bars and results are keyed by suffix notation so either spelling finds them.
fn storage_key(symbol: &str) -> String {
    SymbolCode::parse(symbol)
        .map(|code| code.to_suffix_notation())
        .unwrap_or_else(|_| symbol.trim().to_string())
}

fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn undefined_as_nan(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

/// Fixed-width UTC timestamps, so text comparison orders them correctly.
fn stamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_stamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("bad timestamp '{s}': {e}")))
}

fn parse_status(s: &str) -> Result<BatchStatus> {
    match s {
        "running" => Ok(BatchStatus::Running),
        "completed" => Ok(BatchStatus::Completed),
        other => Err(Error::Persistence(format!("unknown batch status '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bars(n: i64, start: DateTime<Utc>, amount: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                timestamp: start + Duration::minutes(15 * i),
                open: 10.0,
                high: 10.5,
                low: 9.5,
                close: 10.0 + i as f64 * 0.01,
                volume: 100.0,
                amount,
            })
            .collect()
    }

    fn result(signal: Signal, confidence: f64) -> AnalysisResult {
        let mut indicators = BTreeMap::new();
        indicators.insert("rsi".to_string(), IndicatorValue::Number(42.5));
        indicators.insert("trend".to_string(), IndicatorValue::from("up"));
        AnalysisResult::new(signal, confidence, vec!["first".into(), "second".into()], indicators)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn history_reads_recent_bars_in_either_notation() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        // ten days old, then a fresh run of bars
        store.insert_bars("600000.SH", &bars(4, now - Duration::days(10), 1.0)).await.unwrap();
        store.insert_bars("sh.600000", &bars(6, now - Duration::hours(3), 1.0)).await.unwrap();

        let reader = store.clone();
        let series = tokio::task::spawn_blocking(move || reader.get("sh.600000", 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(series.symbol, "600000.SH");
        assert_eq!(series.len(), 6);
        assert!(series.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let reader = store.clone();
        let all = tokio::task::spawn_blocking(move || reader.get("600000.SH", 30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(all.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_symbol_is_an_empty_series() {
        let store = SqliteStore::in_memory().await.unwrap();
        let reader = store.clone();
        let series = tokio::task::spawn_blocking(move || reader.get("000001.SZ", 30))
            .await
            .unwrap()
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn reinserting_bars_overwrites() {
        let store = SqliteStore::in_memory().await.unwrap();
        let start = Utc::now() - Duration::hours(1);
        store.insert_bars("000001.SZ", &bars(3, start, 5.0)).await.unwrap();
        store.insert_bars("000001.SZ", &bars(3, start, 9.0)).await.unwrap();
        let series = store.bars_since("000001.SZ", start - Duration::minutes(1)).await.unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.bars.iter().all(|b| b.amount == 9.0));
    }

    #[tokio::test]
    async fn undefined_values_store_as_null_and_read_back_as_nan() {
        let store = SqliteStore::in_memory().await.unwrap();
        let start = Utc::now() - Duration::hours(1);
        let mut gappy = bars(2, start, 5.0);
        gappy[1].close = f64::NAN;
        gappy[1].volume = f64::INFINITY;
        assert_eq!(store.insert_bars("000001.SZ", &gappy).await.unwrap(), 2);

        let nulls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bars WHERE close IS NULL")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(nulls, 1);

        let series = store.bars_since("000001.SZ", start - Duration::minutes(1)).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].close, 10.0);
        assert!(series.bars[1].close.is_nan());
        assert!(series.bars[1].volume.is_nan());
        assert_eq!(series.bars[1].amount, 5.0);
    }

    #[tokio::test]
    async fn universe_ranks_by_average_amount() {
        let store = SqliteStore::in_memory().await.unwrap();
        let start = Utc::now() - Duration::hours(2);
        store.insert_bars("000001.SZ", &bars(3, start, 100.0)).await.unwrap();
        store.insert_bars("600000.SH", &bars(3, start, 900.0)).await.unwrap();
        store.insert_bars("000002.SZ", &bars(3, start, 500.0)).await.unwrap();

        assert_eq!(
            store.top_symbols(10).await.unwrap(),
            vec!["600000.SH", "000002.SZ", "000001.SZ"]
        );
        assert_eq!(store.top_symbols(1).await.unwrap(), vec!["600000.SH"]);
    }

    #[tokio::test]
    async fn saved_results_round_trip_through_latest() {
        let store = SqliteStore::in_memory().await.unwrap();
        let batch = store.create_batch(&["kdj".to_string()], 1, None).await.unwrap();
        store.save(&result(Signal::Sell, 0.4), "000001.SZ", "kdj", Some(batch)).await.unwrap();
        let second = result(Signal::Buy, 0.75);
        let id = store.save(&second, "sz.000001", "kdj", Some(batch)).await.unwrap();

        let latest = store.latest_result("000001.SZ", "kdj").await.unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.batch_id, Some(batch));
        assert_eq!(latest.result.signal, Signal::Buy);
        assert_eq!(latest.result.confidence, 0.75);
        assert_eq!(latest.result.reasons, vec!["first", "second"]);
        assert_eq!(latest.result.indicators["trend"], IndicatorValue::from("up"));
        assert_eq!(latest.result.indicators["rsi"].as_f64(), Some(42.5));

        assert!(store.latest_result("000001.SZ", "macd_cross").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_finite_values_are_stored_neutral() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut r = result(Signal::Hold, f64::NAN);
        r.indicators.insert("adx".into(), IndicatorValue::Number(f64::INFINITY));
        store.save(&r, "000001.SZ", "adx_trend", None).await.unwrap();

        let latest = store.latest_result("000001.SZ", "adx_trend").await.unwrap().unwrap();
        assert_eq!(latest.result.confidence, 0.0);
        assert_eq!(latest.result.indicators["adx"].as_f64(), Some(0.0));
        assert_eq!(latest.batch_id, None);
    }

    #[tokio::test]
    async fn batch_completes_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let strategies = vec!["kdj".to_string(), "bollinger".to_string()];
        let id = store.create_batch(&strategies, 12, Some("nightly")).await.unwrap();

        let open = store.batch(id).await.unwrap().unwrap();
        assert_eq!(open.status, BatchStatus::Running);
        assert_eq!(open.name, "nightly");
        assert_eq!(open.strategies, strategies);
        assert!(open.finished_at.is_none());

        store.update_batch_status(id, BatchStatus::Completed, 10, 2).await.unwrap();
        // repeating the transition is a no-op
        store.update_batch_status(id, BatchStatus::Completed, 0, 0).await.unwrap();

        let done = store.batch(id).await.unwrap().unwrap();
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!((done.success_count, done.fail_count), (10, 2));
        assert!(done.finished_at.is_some());

        let err = store
            .update_batch_status(999, BatchStatus::Completed, 0, 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("batch 999 not found"));
    }

    #[tokio::test]
    async fn default_batch_name_is_timestamped() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_batch(&[], 0, None).await.unwrap();
        assert!(store.batch(id).await.unwrap().unwrap().name.starts_with("batch_"));
    }

    #[tokio::test]
    async fn old_results_are_cleared() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut old = result(Signal::Buy, 0.6);
        old.timestamp = Utc::now() - Duration::days(40);
        store.save(&old, "000001.SZ", "kdj", None).await.unwrap();
        store.save(&result(Signal::Buy, 0.6), "000002.SZ", "kdj", None).await.unwrap();

        assert_eq!(store.clear_old_results(30).await.unwrap(), 1);
        assert!(store.latest_result("000001.SZ", "kdj").await.unwrap().is_none());
        assert!(store.latest_result("000002.SZ", "kdj").await.unwrap().is_some());
    }
}
