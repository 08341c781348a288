//! Positive decimal quantity (litres for purchases, units for consumption).

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// A strictly positive quantity with at most [`Amount::MAX_SCALE`] decimals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// One unit; the amount recorded for a single drink.
    pub const ONE: Amount = Amount(Decimal::ONE);

    /// Maximum number of decimal places accepted.
    pub const MAX_SCALE: u32 = 3;

    /// Upper bound for a single purchase or consumption.
    pub const MAX: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be positive"));
        }
        if value > Self::MAX {
            return Err(DomainError::validation(format!(
                "amount must be at most {}",
                Self::MAX
            )));
        }
        let value = value.normalize();
        if value.scale() > Self::MAX_SCALE {
            return Err(DomainError::validation(format!(
                "amount allows at most {} decimals",
                Self::MAX_SCALE
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl ValueObject for Amount {}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Accepts both `1.5` and `1,5`.
impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::validation("amount is missing"));
        }
        let normalized = s.replace(',', ".");
        let value = Decimal::from_str(&normalized)
            .map_err(|_| DomainError::validation(format!("'{s}' is not a number")))?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}
