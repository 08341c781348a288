//! Application-level error model for inventory operations.

use thiserror::Error;

use milkbot_core::{BatchId, DomainError};

use crate::store::StoreError;

/// Failure of one inventory operation.
///
/// - `Validation`: bad input, nothing was written.
/// - `EmptyInventory` / `BatchNotFound`: informational, nothing was written.
/// - `Persistence`: the store failed; the transaction was not committed.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no milk available")]
    EmptyInventory,

    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            // Invariant breaks surface from stored state, not from user input.
            DomainError::InvariantViolation(msg) => Self::Persistence(StoreError::Corrupt(msg)),
        }
    }
}
