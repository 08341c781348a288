use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use milkbot_core::{Aggregate, AggregateRoot, Amount, BatchId, DomainError};

use crate::selection::SelectionKey;

/// Aggregate root: one purchased carton of milk.
///
/// `remaining_amount` always stays within `0..=original_amount`. A batch with
/// nothing left is *exhausted*: terminal, and invisible to selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    original_amount: Amount,
    remaining_amount: Decimal,
    expiration_date: NaiveDate,
    version: u64,
}

impl Batch {
    /// A freshly purchased batch (`remaining == original`).
    pub fn purchased(id: BatchId, amount: Amount, expiration_date: NaiveDate) -> Self {
        Self {
            id,
            original_amount: amount,
            remaining_amount: amount.value(),
            expiration_date,
            version: 0,
        }
    }

    /// Rebuild a batch from stored state, rejecting rows that break the
    /// amount invariant.
    pub fn restore(
        id: BatchId,
        original_amount: Amount,
        remaining_amount: Decimal,
        expiration_date: NaiveDate,
    ) -> Result<Self, DomainError> {
        if remaining_amount < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "batch {id}: remaining amount {remaining_amount} is negative"
            )));
        }
        if remaining_amount > original_amount.value() {
            return Err(DomainError::invariant(format!(
                "batch {id}: remaining amount {remaining_amount} exceeds original {original_amount}"
            )));
        }
        Ok(Self {
            id,
            original_amount,
            remaining_amount,
            expiration_date,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn original_amount(&self) -> Amount {
        self.original_amount
    }

    pub fn remaining_amount(&self) -> Decimal {
        self.remaining_amount
    }

    pub fn expiration_date(&self) -> NaiveDate {
        self.expiration_date
    }

    pub fn is_available(&self) -> bool {
        self.remaining_amount > Decimal::ZERO
    }

    pub fn is_exhausted(&self) -> bool {
        !self.is_available()
    }

    pub fn selection_key(&self) -> SelectionKey {
        SelectionKey::new(self.expiration_date, self.id)
    }

    /// Listing view of this batch, or `None` when exhausted.
    pub fn to_available(&self) -> Option<AvailableBatch> {
        self.is_available().then(|| AvailableBatch {
            batch_id: self.id,
            remaining_amount: self.remaining_amount,
            expiration_date: self.expiration_date,
        })
    }
}

impl AggregateRoot for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// One row of the availability listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableBatch {
    pub batch_id: BatchId,
    pub remaining_amount: Decimal,
    pub expiration_date: NaiveDate,
}

impl AvailableBatch {
    pub fn selection_key(&self) -> SelectionKey {
        SelectionKey::new(self.expiration_date, self.batch_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchCommand {
    /// Take `amount` out of the batch (clamped at zero).
    Consume { amount: Amount },
    /// Operator correction: force the batch to zero.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchEvent {
    Consumed {
        batch_id: BatchId,
        requested: Amount,
        remaining: Decimal,
    },
    Emptied {
        batch_id: BatchId,
        discarded: Decimal,
    },
}

impl Aggregate for Batch {
    type Command = BatchCommand;
    type Event = BatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BatchEvent::Consumed { remaining, .. } => {
                self.remaining_amount = *remaining;
            }
            BatchEvent::Emptied { .. } => {
                self.remaining_amount = Decimal::ZERO;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        // Exhausted is terminal: every command is a no-op.
        if self.is_exhausted() {
            return Ok(vec![]);
        }

        match command {
            BatchCommand::Consume { amount } => {
                let remaining = (self.remaining_amount - amount.value()).max(Decimal::ZERO);
                Ok(vec![BatchEvent::Consumed {
                    batch_id: self.id,
                    requested: *amount,
                    remaining,
                }])
            }
            BatchCommand::Empty => Ok(vec![BatchEvent::Emptied {
                batch_id: self.id,
                discarded: self.remaining_amount,
            }]),
        }
    }
}
