use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use milkbot_core::{Amount, BatchId};
use milkbot_inventory::{AvailableBatch, Batch, LeaderboardEntry, LedgerKind};

/// Inventory store operation error.
///
/// These are **persistence errors** (connectivity, transactions, constraints)
/// as opposed to domain errors (validation, invariants). Any of them aborts the
/// current unit of work without partial writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached (pool closed, timeout, IO).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A database constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Any other query or transaction failure.
    #[error("query failed: {0}")]
    Query(String),

    /// A stored row does not satisfy the batch invariants.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Outcome of forcing a batch to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    /// Batch state after the operation (always exhausted).
    pub batch: Batch,
    /// Amount that was still left; zero when the batch was already exhausted.
    pub discarded: Decimal,
}

/// Durable record of batches plus the purchase and consumption ledgers.
///
/// ## Consistency
///
/// - Every mutation of a batch's remaining amount happens inside an
///   [`InventoryTx`], together with its ledger row, and becomes visible only on
///   commit.
/// - Reads (`list_available`, `get_batch`, `ledger_totals`) take no locks and
///   see the latest committed state.
/// - Implementations must not cache inventory between calls.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open a unit of work. Dropping it without `commit()` discards its writes.
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError>;

    /// Available batches in selection order `(expiration_date, id)`.
    async fn list_available(&self) -> Result<Vec<AvailableBatch>, StoreError>;

    /// Load one batch, exhausted or not.
    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<Batch>, StoreError>;

    /// Totals per name over one ledger, ranked by total descending then name
    /// ascending in byte order, truncated to `limit`.
    async fn ledger_totals(
        &self,
        ledger: LedgerKind,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError>;

    /// Create a batch and its purchase record atomically.
    async fn add_batch(
        &self,
        buyer_name: &str,
        amount: Amount,
        expiration_date: NaiveDate,
    ) -> Result<BatchId, StoreError> {
        let mut tx = self.begin().await?;
        let batch_id = tx.insert_batch(buyer_name, amount, expiration_date).await?;
        tx.commit().await?;
        Ok(batch_id)
    }

    /// Force a batch to zero in its own transaction (idempotent).
    ///
    /// Returns `None` for unknown ids.
    async fn set_exhausted(&self, batch_id: BatchId) -> Result<Option<Exhausted>, StoreError> {
        let mut tx = self.begin().await?;
        let outcome = tx.set_exhausted(batch_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }
}

/// One all-or-nothing unit of work against the inventory.
///
/// Batches returned by the `lock_*` methods stay exclusively held until the
/// transaction commits or rolls back, so a concurrent transaction cannot observe
/// the same remaining amount and decrement it again.
#[async_trait]
pub trait InventoryTx: Send {
    /// Insert a full batch and the purchase record that references it.
    async fn insert_batch(
        &mut self,
        buyer_name: &str,
        amount: Amount,
        expiration_date: NaiveDate,
    ) -> Result<BatchId, StoreError>;

    /// Lock and return the earliest-expiring available batch (ties: lowest id).
    async fn lock_next_available(&mut self) -> Result<Option<Batch>, StoreError>;

    /// Lock and return one batch by id, exhausted or not.
    async fn lock_batch(&mut self, batch_id: BatchId) -> Result<Option<Batch>, StoreError>;

    /// Append a consumption record and decrement the batch by `amount`
    /// (clamped at zero).
    ///
    /// Returns the batch after the decrement, or `None` (and writes nothing)
    /// when the batch is unknown or already exhausted.
    async fn record_consumption(
        &mut self,
        drinker_name: &str,
        amount: Amount,
        batch_id: BatchId,
    ) -> Result<Option<Batch>, StoreError>;

    /// Force the batch's remaining amount to zero (idempotent).
    ///
    /// Returns `None` for unknown ids.
    async fn set_exhausted(&mut self, batch_id: BatchId) -> Result<Option<Exhausted>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        (**self).begin().await
    }

    async fn list_available(&self) -> Result<Vec<AvailableBatch>, StoreError> {
        (**self).list_available().await
    }

    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<Batch>, StoreError> {
        (**self).get_batch(batch_id).await
    }

    async fn ledger_totals(
        &self,
        ledger: LedgerKind,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        (**self).ledger_totals(ledger, limit).await
    }

    async fn add_batch(
        &self,
        buyer_name: &str,
        amount: Amount,
        expiration_date: NaiveDate,
    ) -> Result<BatchId, StoreError> {
        (**self).add_batch(buyer_name, amount, expiration_date).await
    }

    async fn set_exhausted(&self, batch_id: BatchId) -> Result<Option<Exhausted>, StoreError> {
        (**self).set_exhausted(batch_id).await
    }
}
