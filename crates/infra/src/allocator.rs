//! FIFO-by-expiry allocation of consume and empty operations.
//!
//! Every operation runs as one transaction:
//!
//! ```text
//! begin
//!   ↓
//! 1. Select the target batch and lock it (one atomic step)
//!   ↓
//! 2. Check availability (nothing available → rollback, no ledger write)
//!   ↓
//! 3. Write the decrement / exhaustion and the ledger row
//!   ↓
//! commit
//! ```
//!
//! Two concurrent consumers of a single-unit batch therefore serialize on the
//! row lock: the first decrements and commits, the second sees nothing left.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use milkbot_core::{Amount, BatchId};
use milkbot_inventory::participant_name;

use crate::error::InventoryError;
use crate::store::{InventoryStore, InventoryTx, StoreError};

/// Result of a successful drink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumed {
    pub batch_id: BatchId,
    pub drinker_name: String,
    pub amount: Amount,
    pub remaining_amount: Decimal,
    pub expiration_date: NaiveDate,
}

/// Result of emptying a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emptied {
    pub batch_id: BatchId,
    /// Zero when the batch was already exhausted.
    pub discarded: Decimal,
    pub expiration_date: NaiveDate,
}

/// Result of a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchased {
    pub batch_id: BatchId,
    pub buyer_name: String,
    pub amount: Amount,
    pub expiration_date: NaiveDate,
}

/// Allocates consume/empty operations to batches.
///
/// Holds only the injected store handle; no inventory state is kept between
/// calls.
#[derive(Debug, Clone)]
pub struct Allocator<S> {
    store: S,
}

impl<S> Allocator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> Allocator<S>
where
    S: InventoryStore,
{
    /// Earliest-expiring available batch, locked for the rest of `tx`.
    pub async fn select_for_consumption(
        &self,
        tx: &mut dyn InventoryTx,
    ) -> Result<Option<BatchId>, StoreError> {
        Ok(tx.lock_next_available().await?.map(|b| b.id_typed()))
    }

    /// Same rule as [`Self::select_for_consumption`]; used by the operator
    /// correction that retires the oldest carton.
    pub async fn select_for_emptying(
        &self,
        tx: &mut dyn InventoryTx,
    ) -> Result<Option<BatchId>, StoreError> {
        Ok(tx.lock_next_available().await?.map(|b| b.id_typed()))
    }

    /// Record a purchase: a new full batch plus its purchase record.
    #[instrument(skip(self, buyer_name), err)]
    pub async fn purchase(
        &self,
        buyer_name: &str,
        amount: Amount,
        expiration_date: NaiveDate,
    ) -> Result<Purchased, InventoryError> {
        let buyer_name = participant_name(buyer_name)?;
        let batch_id = self
            .store
            .add_batch(&buyer_name, amount, expiration_date)
            .await?;

        info!(%batch_id, %amount, %expiration_date, "batch purchased");
        Ok(Purchased {
            batch_id,
            buyer_name,
            amount,
            expiration_date,
        })
    }

    /// Drink one unit from the earliest-expiring batch.
    #[instrument(skip(self, drinker_name), err)]
    pub async fn consume_one(&self, drinker_name: &str) -> Result<Consumed, InventoryError> {
        let drinker_name = participant_name(drinker_name)?;
        let amount = Amount::ONE;

        let mut tx = self.store.begin().await?;
        let Some(batch_id) = self.select_for_consumption(tx.as_mut()).await? else {
            tx.rollback().await?;
            return Err(InventoryError::EmptyInventory);
        };
        let Some(batch) = tx.record_consumption(&drinker_name, amount, batch_id).await? else {
            tx.rollback().await?;
            return Err(InventoryError::EmptyInventory);
        };
        tx.commit().await?;

        info!(%batch_id, remaining = %batch.remaining_amount(), "milk consumed");
        Ok(Consumed {
            batch_id,
            drinker_name,
            amount,
            remaining_amount: batch.remaining_amount(),
            expiration_date: batch.expiration_date(),
        })
    }

    /// Retire the earliest-expiring available batch.
    #[instrument(skip(self), err)]
    pub async fn empty_oldest(&self) -> Result<Emptied, InventoryError> {
        let mut tx = self.store.begin().await?;
        let Some(batch_id) = self.select_for_emptying(tx.as_mut()).await? else {
            tx.rollback().await?;
            return Err(InventoryError::EmptyInventory);
        };
        self.exhaust_and_commit(tx, batch_id).await
    }

    /// Retire a specific batch. Emptying an exhausted batch is a no-op.
    #[instrument(skip(self), err)]
    pub async fn empty_selected(&self, batch_id: BatchId) -> Result<Emptied, InventoryError> {
        let mut tx = self.store.begin().await?;
        if tx.lock_batch(batch_id).await?.is_none() {
            tx.rollback().await?;
            return Err(InventoryError::BatchNotFound(batch_id));
        }
        self.exhaust_and_commit(tx, batch_id).await
    }

    async fn exhaust_and_commit(
        &self,
        mut tx: Box<dyn InventoryTx>,
        batch_id: BatchId,
    ) -> Result<Emptied, InventoryError> {
        let Some(outcome) = tx.set_exhausted(batch_id).await? else {
            tx.rollback().await?;
            return Err(InventoryError::BatchNotFound(batch_id));
        };
        tx.commit().await?;

        info!(%batch_id, discarded = %outcome.discarded, "batch emptied");
        Ok(Emptied {
            batch_id,
            discarded: outcome.discarded,
            expiration_date: outcome.batch.expiration_date(),
        })
    }
}
