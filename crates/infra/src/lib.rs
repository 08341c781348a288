//! Infrastructure layer: stores, allocation, leaderboards, config.

pub mod aggregator;
pub mod allocator;
pub mod config;
pub mod error;
pub mod store;

pub use aggregator::{Aggregator, Leaderboard};
pub use allocator::{Allocator, Consumed, Emptied, Purchased};
pub use config::{Config, ConfigError, DatabaseConfig};
pub use error::InventoryError;
