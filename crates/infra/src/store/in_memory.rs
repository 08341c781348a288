use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use milkbot_core::{Aggregate, Amount, BatchId};
use milkbot_inventory::{
    next_available, rank_totals, sort_available, AvailableBatch, Batch, BatchCommand, BatchEvent,
    ConsumptionRecord, LeaderboardEntry, LedgerKind, PurchaseRecord,
};

use super::r#trait::{Exhausted, InventoryStore, InventoryTx, StoreError};

#[derive(Debug, Clone, Default)]
struct State {
    last_batch_id: i64,
    batches: BTreeMap<BatchId, Batch>,
    purchases: Vec<PurchaseRecord>,
    consumption: Vec<ConsumptionRecord>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Transactions are serialized by a store-wide writer
/// lock held for the lifetime of each [`InventoryTx`]; writes are staged on a
/// private copy of the state and swapped in on commit, so readers only ever
/// see committed state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    committed: Arc<RwLock<State>>,
    writer: Arc<Mutex<()>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit()` fail as if the store became unreachable.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Committed batches, including exhausted ones, by id.
    pub fn batches(&self) -> Result<Vec<Batch>, StoreError> {
        Ok(self.read()?.batches.values().cloned().collect())
    }

    /// Committed purchase ledger, in insertion order.
    pub fn purchases(&self) -> Result<Vec<PurchaseRecord>, StoreError> {
        Ok(self.read()?.purchases.clone())
    }

    /// Committed consumption ledger, in insertion order.
    pub fn consumption(&self) -> Result<Vec<ConsumptionRecord>, StoreError> {
        Ok(self.read()?.consumption.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.committed
            .read()
            .map_err(|_| StoreError::Query("lock poisoned".to_string()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        let guard = self.writer.clone().lock_owned().await;
        let staged = self.read()?.clone();

        Ok(Box::new(InMemoryTx {
            _guard: guard,
            committed: self.committed.clone(),
            staged,
            fail_next_commit: self.fail_next_commit.clone(),
        }))
    }

    async fn list_available(&self) -> Result<Vec<AvailableBatch>, StoreError> {
        let mut available: Vec<AvailableBatch> = self
            .read()?
            .batches
            .values()
            .filter_map(Batch::to_available)
            .collect();
        sort_available(&mut available);
        Ok(available)
    }

    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.read()?.batches.get(&batch_id).cloned())
    }

    async fn ledger_totals(
        &self,
        ledger: LedgerKind,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let state = self.read()?;
        let ranked = match ledger {
            LedgerKind::Purchases => rank_totals(
                state
                    .purchases
                    .iter()
                    .map(|r| (r.buyer_name.as_str(), r.amount.value())),
                limit,
            ),
            LedgerKind::Consumption => rank_totals(
                state
                    .consumption
                    .iter()
                    .map(|r| (r.drinker_name.as_str(), r.amount.value())),
                limit,
            ),
        };
        Ok(ranked)
    }
}

struct InMemoryTx {
    _guard: OwnedMutexGuard<()>,
    committed: Arc<RwLock<State>>,
    staged: State,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryTx {
    fn execute(
        &mut self,
        batch_id: BatchId,
        command: BatchCommand,
    ) -> Result<Option<(Batch, Vec<BatchEvent>)>, StoreError> {
        let Some(batch) = self.staged.batches.get_mut(&batch_id) else {
            return Ok(None);
        };
        let events = batch
            .execute(&command)
            .map_err(|e| StoreError::Corrupt(format!("batch {batch_id}: {e}")))?;
        Ok(Some((batch.clone(), events)))
    }
}

#[async_trait]
impl InventoryTx for InMemoryTx {
    async fn insert_batch(
        &mut self,
        buyer_name: &str,
        amount: Amount,
        expiration_date: NaiveDate,
    ) -> Result<BatchId, StoreError> {
        self.staged.last_batch_id += 1;
        let batch_id = BatchId::new(self.staged.last_batch_id);

        self.staged
            .batches
            .insert(batch_id, Batch::purchased(batch_id, amount, expiration_date));
        self.staged.purchases.push(PurchaseRecord {
            buyer_name: buyer_name.to_string(),
            amount,
            batch_id,
        });

        Ok(batch_id)
    }

    async fn lock_next_available(&mut self) -> Result<Option<Batch>, StoreError> {
        // The writer lock held by this transaction already excludes every
        // other writer.
        Ok(next_available(self.staged.batches.values()).cloned())
    }

    async fn lock_batch(&mut self, batch_id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.staged.batches.get(&batch_id).cloned())
    }

    async fn record_consumption(
        &mut self,
        drinker_name: &str,
        amount: Amount,
        batch_id: BatchId,
    ) -> Result<Option<Batch>, StoreError> {
        let Some((batch, events)) = self.execute(batch_id, BatchCommand::Consume { amount })? else {
            return Ok(None);
        };
        if events.is_empty() {
            return Ok(None);
        }

        self.staged.consumption.push(ConsumptionRecord {
            drinker_name: drinker_name.to_string(),
            amount,
            batch_id,
        });

        Ok(Some(batch))
    }

    async fn set_exhausted(&mut self, batch_id: BatchId) -> Result<Option<Exhausted>, StoreError> {
        let Some((batch, events)) = self.execute(batch_id, BatchCommand::Empty)? else {
            return Ok(None);
        };
        let discarded = match events.first() {
            Some(BatchEvent::Emptied { discarded, .. }) => *discarded,
            _ => Decimal::ZERO,
        };

        Ok(Some(Exhausted { batch, discarded }))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "connection lost before commit".to_string(),
            ));
        }

        let this = *self;
        let mut committed = this
            .committed
            .write()
            .map_err(|_| StoreError::Query("lock poisoned".to_string()))?;
        *committed = this.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
