//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (integrity) | `23xxx` | `Constraint` | CHECK / FK / unique rejected the write |
//! | Database (other) | Any other | `Query` | Serialization failures, syntax, etc. |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` | Store unreachable |
//! | Other | N/A | `Query` | Decoding failures, unexpected rows |
//!
//! ## Locking
//!
//! Consumption and emptying lock the target row with `SELECT ... FOR UPDATE`
//! before deciding anything, so two transactions can never both observe
//! `amount > 0` on the same batch and both decrement it.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use milkbot_core::{Aggregate, Amount, BatchId};
use milkbot_inventory::{AvailableBatch, Batch, BatchCommand, BatchEvent, LeaderboardEntry, LedgerKind};

use super::r#trait::{Exhausted, InventoryStore, InventoryTx, StoreError};
use crate::config::DatabaseConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_inventory.sql");

/// How often a locked selection is re-issued after losing a race (see
/// [`PostgresTx::lock_next_available`]).
const LOCK_RETRIES: usize = 3;

const SELECT_NEXT_AVAILABLE_FOR_UPDATE: &str = r#"
    SELECT id, original_amount, amount, expiration_date
    FROM batches
    WHERE amount > 0
    ORDER BY expiration_date ASC, id ASC
    LIMIT 1
    FOR UPDATE
"#;

const SELECT_BATCH_FOR_UPDATE: &str = r#"
    SELECT id, original_amount, amount, expiration_date
    FROM batches
    WHERE id = $1
    FOR UPDATE
"#;

const TOP_BUYERS: &str = r#"
    SELECT buyer_name AS name, SUM(amount) AS total
    FROM purchases
    GROUP BY buyer_name
    ORDER BY total DESC, name COLLATE "C" ASC
    LIMIT $1
"#;

const TOP_DRINKERS: &str = r#"
    SELECT drinker_name AS name, SUM(amount) AS total
    FROM consumption
    GROUP BY drinker_name
    ORDER BY total DESC, name COLLATE "C" ASC
    LIMIT $1
"#;

/// Postgres-backed inventory store.
///
/// Uses an SQLx connection pool (thread-safe, `Send + Sync`); every mutation
/// runs in an explicit transaction obtained from [`InventoryStore::begin`].
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    /// Create a new PostgresInventoryStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool from configuration.
    ///
    /// TLS is required unless the connection string chooses an `sslmode`
    /// itself.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| map_sqlx_error("parse_database_url", e))?;
        if !config.url.contains("sslmode") {
            options = options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }

    #[instrument(skip(self), err)]
    async fn list_available(&self) -> Result<Vec<AvailableBatch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, amount, expiration_date
            FROM batches
            WHERE amount > 0
            ORDER BY expiration_date ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_available", e))?;

        rows.iter()
            .map(|row| {
                Ok(AvailableBatch {
                    batch_id: BatchId::new(get(row, "id")?),
                    remaining_amount: get(row, "amount")?,
                    expiration_date: get(row, "expiration_date")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, original_amount, amount, expiration_date
            FROM batches
            WHERE id = $1
            "#,
        )
        .bind(batch_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_batch", e))?;

        row.as_ref().map(batch_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn ledger_totals(
        &self,
        ledger: LedgerKind,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let sql = match ledger {
            LedgerKind::Purchases => TOP_BUYERS,
            LedgerKind::Consumption => TOP_DRINKERS,
        };

        let rows = sqlx::query(sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ledger_totals", e))?;

        rows.iter()
            .map(|row| {
                let name: String = get(row, "name")?;
                let total: Decimal = get(row, "total")?;
                Ok(LeaderboardEntry::new(name, total.normalize()))
            })
            .collect()
    }
}

/// One open Postgres transaction. Dropping it rolls back.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    async fn write_remaining(&mut self, batch: &Batch) -> Result<(), StoreError> {
        sqlx::query("UPDATE batches SET amount = $2 WHERE id = $1")
            .bind(batch.id_typed().get())
            .bind(batch.remaining_amount())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_remaining", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryTx for PostgresTx {
    #[instrument(skip(self, buyer_name), err)]
    async fn insert_batch(
        &mut self,
        buyer_name: &str,
        amount: Amount,
        expiration_date: NaiveDate,
    ) -> Result<BatchId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO batches (original_amount, amount, expiration_date)
            VALUES ($1, $1, $2)
            RETURNING id
            "#,
        )
        .bind(amount.value())
        .bind(expiration_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_batch", e))?;
        let batch_id = BatchId::new(get(&row, "id")?);

        sqlx::query(
            r#"
            INSERT INTO purchases (buyer_name, amount, batch_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(buyer_name)
        .bind(amount.value())
        .bind(batch_id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase", e))?;

        Ok(batch_id)
    }

    /// Locked FIFO selection.
    ///
    /// Under READ COMMITTED, `ORDER BY ... LIMIT 1 FOR UPDATE` that queued
    /// behind a concurrent winner re-checks `amount > 0` once the winner
    /// commits; if the row no longer qualifies it is dropped and the statement
    /// returns nothing even when other batches are still stocked. Re-issuing
    /// the statement picks up the next batch from a fresh snapshot.
    async fn lock_next_available(&mut self) -> Result<Option<Batch>, StoreError> {
        for attempt in 1..=LOCK_RETRIES {
            let row = sqlx::query(SELECT_NEXT_AVAILABLE_FOR_UPDATE)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("lock_next_available", e))?;
            if let Some(row) = row {
                return batch_from_row(&row).map(Some);
            }

            let stocked: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM batches WHERE amount > 0)")
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(|e| map_sqlx_error("check_stock", e))?;
            if !stocked {
                return Ok(None);
            }
            debug!(attempt, "locked selection lost a race; retrying");
        }

        Ok(None)
    }

    async fn lock_batch(&mut self, batch_id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = sqlx::query(SELECT_BATCH_FOR_UPDATE)
            .bind(batch_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_batch", e))?;

        row.as_ref().map(batch_from_row).transpose()
    }

    #[instrument(skip(self, drinker_name), err)]
    async fn record_consumption(
        &mut self,
        drinker_name: &str,
        amount: Amount,
        batch_id: BatchId,
    ) -> Result<Option<Batch>, StoreError> {
        let Some(mut batch) = self.lock_batch(batch_id).await? else {
            return Ok(None);
        };
        let events = batch
            .execute(&BatchCommand::Consume { amount })
            .map_err(|e| StoreError::Corrupt(format!("batch {batch_id}: {e}")))?;
        if events.is_empty() {
            return Ok(None);
        }

        self.write_remaining(&batch).await?;
        sqlx::query(
            r#"
            INSERT INTO consumption (drinker_name, amount, batch_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(drinker_name)
        .bind(amount.value())
        .bind(batch_id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_consumption", e))?;

        Ok(Some(batch))
    }

    #[instrument(skip(self), err)]
    async fn set_exhausted(&mut self, batch_id: BatchId) -> Result<Option<Exhausted>, StoreError> {
        let Some(mut batch) = self.lock_batch(batch_id).await? else {
            return Ok(None);
        };
        let events = batch
            .execute(&BatchCommand::Empty)
            .map_err(|e| StoreError::Corrupt(format!("batch {batch_id}: {e}")))?;

        let discarded = match events.first() {
            Some(BatchEvent::Emptied { discarded, .. }) => {
                self.write_remaining(&batch).await?;
                *discarded
            }
            _ => Decimal::ZERO,
        };

        Ok(Some(Exhausted { batch, discarded }))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Query(format!("failed to read column {column}: {e}")))
}

fn batch_from_row(row: &PgRow) -> Result<Batch, StoreError> {
    let batch_id = BatchId::new(get(row, "id")?);
    let original: Decimal = get(row, "original_amount")?;
    let original = Amount::new(original)
        .map_err(|e| StoreError::Corrupt(format!("batch {batch_id}: {e}")))?;

    Batch::restore(
        batch_id,
        original,
        get(row, "amount")?,
        get(row, "expiration_date")?,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            // Class 23: integrity constraint violation.
            match db_err.code() {
                Some(code) if code.starts_with("23") => StoreError::Constraint(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("timed out acquiring a connection in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        _ => StoreError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_map_to_unavailable() {
        assert!(matches!(
            map_sqlx_error("begin", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("begin", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn leaderboards_break_ties_in_byte_order() {
        for sql in [TOP_BUYERS, TOP_DRINKERS] {
            assert!(sql.contains(r#"name COLLATE "C" ASC"#));
        }
    }

    #[test]
    fn other_failures_map_to_query() {
        let err = map_sqlx_error("get_batch", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Query(msg) if msg.contains("get_batch")));
    }

    /// Live tests run only when `MILKBOT_TEST_DATABASE_URL` points at a
    /// disposable database.
    async fn live_store() -> Option<PostgresInventoryStore> {
        let url = std::env::var("MILKBOT_TEST_DATABASE_URL").ok()?;
        let config = DatabaseConfig {
            url,
            max_connections: 8,
            acquire_timeout: std::time::Duration::from_secs(5),
        };
        let store = PostgresInventoryStore::connect(&config).await.ok()?;
        store.ensure_schema().await.ok()?;
        sqlx::query("TRUNCATE consumption, purchases, batches RESTART IDENTITY")
            .execute(&*store.pool)
            .await
            .ok()?;
        Some(store)
    }

    // Truncates the shared database; keep live checks in this one test.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn live_locked_selection_serializes_drinkers() {
        let Some(store) = live_store().await else {
            return;
        };
        let date = |d| NaiveDate::from_ymd_opt(2030, 1, d).unwrap();

        let late = store.add_batch("A", Amount::ONE, date(10)).await.unwrap();
        let early = store.add_batch("B", Amount::ONE, date(5)).await.unwrap();
        let listing = store.list_available().await.unwrap();
        assert_eq!(listing[0].batch_id, early);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut tx = store.begin().await?;
                    let Some(batch) = tx.lock_next_available().await? else {
                        tx.rollback().await?;
                        return Ok::<_, StoreError>(None);
                    };
                    let consumed = tx
                        .record_consumption(&format!("d{i}"), Amount::ONE, batch.id_typed())
                        .await?;
                    tx.commit().await?;
                    Ok(consumed.map(|b| b.id_typed()))
                })
            })
            .collect();

        let mut consumed = Vec::new();
        for handle in handles {
            if let Some(id) = handle.await.unwrap().unwrap() {
                consumed.push(id);
            }
        }
        consumed.sort();
        let mut expected = vec![late, early];
        expected.sort();
        assert_eq!(consumed, expected);
        assert!(store.list_available().await.unwrap().is_empty());

        let emptied = store.set_exhausted(late).await.unwrap().unwrap();
        assert_eq!(emptied.discarded, Decimal::ZERO);
        assert!(store.set_exhausted(BatchId::new(999)).await.unwrap().is_none());

        // Tied totals rank by byte order, same as the in-memory store.
        for name in ["b", "B", "a"] {
            store.add_batch(name, Amount::ONE, date(20)).await.unwrap();
        }
        let names: Vec<String> = store
            .ledger_totals(LedgerKind::Purchases, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        let expected: Vec<String> = milkbot_inventory::rank_totals(
            ["A", "B", "b", "B", "a"].map(|n| (n, Decimal::ONE)),
            10,
        )
        .into_iter()
        .map(|e| e.name)
        .collect();
        assert_eq!(names, expected);
        assert_eq!(names, vec!["B", "A", "a", "b"]);
    }
}
