//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a milk batch (one purchased carton).
///
/// Assigned by the store at creation time and monotonically increasing, which
/// makes it usable as the FIFO tie-breaker between batches that expire on the
/// same day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(i64);

impl BatchId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for BatchId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<BatchId> for i64 {
    fn from(value: BatchId) -> Self {
        value.0
    }
}

impl FromStr for BatchId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::invalid_id(format!("BatchId: {e}")))?;
        if raw <= 0 {
            return Err(DomainError::invalid_id("BatchId: must be positive"));
        }
        Ok(Self(raw))
    }
}

/// Correlation identifier of one inbound chat command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Fresh time-ordered (UUIDv7) identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CommandId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_parses_trimmed_positive_integers() {
        assert_eq!(" 42 ".parse::<BatchId>().unwrap(), BatchId::new(42));
    }

    #[test]
    fn batch_id_rejects_zero_negative_and_garbage() {
        assert!("0".parse::<BatchId>().is_err());
        assert!("-3".parse::<BatchId>().is_err());
        assert!("abc".parse::<BatchId>().is_err());
    }

    #[test]
    fn batch_ids_order_numerically() {
        assert!(BatchId::new(2) < BatchId::new(10));
    }

    #[test]
    fn command_ids_are_unique() {
        assert_ne!(CommandId::new(), CommandId::new());
    }
}
