use std::{fmt, str::FromStr};

use rust_decimal::Decimal;

use crate::{EngineError, ResultEngine};

/// Fraction digits kept on persisted balances.
pub const MONEY_SCALE: u32 = 2;

/// A strictly positive amount of money moved by a transfer.
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
/// use rust_decimal::Decimal;
///
/// assert!(Amount::new(Decimal::new(1050, 2)).is_ok());
/// assert!(Amount::new(Decimal::ZERO).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> ResultEngine<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::InvalidParameters(
                "Transfer amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parses a balance read back from a decimal text column.
pub(crate) fn decimal_from_column(column: &str, value: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(value.trim()).map_err(|err| {
        EngineError::Database(sea_orm::DbErr::Type(format!(
            "column {column} holds an invalid decimal {value:?}: {err}"
        )))
    })
}

/// Renders a balance for a decimal text column.
pub(crate) fn decimal_to_column(value: Decimal) -> String {
    value.normalize().to_string()
}
