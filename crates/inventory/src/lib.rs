//! Inventory domain module.
//!
//! This crate contains the business rules for the shared milk stock: the batch
//! state machine, the FIFO-by-expiry selection rule and leaderboard ranking,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod batch;
pub mod ledger;
pub mod selection;

pub use batch::{AvailableBatch, Batch, BatchCommand, BatchEvent};
pub use ledger::{
    participant_name, rank_totals, ConsumptionRecord, LeaderboardEntry, LedgerKind,
    PurchaseRecord, MAX_NAME_CHARS,
};
pub use selection::{next_available, sort_available, SelectionKey};
