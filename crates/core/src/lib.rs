//! `milkbot-core`: domain building blocks shared by every crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod amount;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use amount::Amount;
pub use error::DomainError;
pub use id::{BatchId, CommandId};
pub use value_object::ValueObject;
