//! Inventory store boundary.
//!
//! Defines the storage-facing abstraction for batches and ledgers, with a
//! Postgres implementation for production and an in-memory one for tests/dev.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{Exhausted, InventoryStore, InventoryTx, StoreError};
