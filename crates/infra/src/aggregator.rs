//! Leaderboards over the purchase and consumption ledgers.

use serde::Serialize;
use tracing::instrument;

use milkbot_inventory::{LeaderboardEntry, LedgerKind};

use crate::store::{InventoryStore, StoreError};

/// Both boards, computed from the same request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub drinkers: Vec<LeaderboardEntry>,
    pub buyers: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn is_empty(&self) -> bool {
        self.drinkers.is_empty() && self.buyers.is_empty()
    }
}

/// Read-only ranking service. Every call recomputes from the ledgers.
#[derive(Debug, Clone)]
pub struct Aggregator<S> {
    store: S,
}

impl<S> Aggregator<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err)]
    pub async fn top_drinkers(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.store.ledger_totals(LedgerKind::Consumption, limit).await
    }

    #[instrument(skip(self), err)]
    pub async fn top_buyers(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.store.ledger_totals(LedgerKind::Purchases, limit).await
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Leaderboard, StoreError> {
        Ok(Leaderboard {
            drinkers: self.top_drinkers(limit).await?,
            buyers: self.top_buyers(limit).await?,
        })
    }
}
