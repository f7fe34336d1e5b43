//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use rust_decimal::Decimal;

/// Move `amount` from the account of `sender_id` to the account of
/// `recipient_id`.
///
/// `sender_id` is the verified identity of the caller; it is never read from
/// ambient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferCmd {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub amount: Decimal,
}

impl TransferCmd {
    #[must_use]
    pub fn new(sender_id: i64, recipient_id: i64, amount: Decimal) -> Self {
        Self {
            sender_id,
            recipient_id,
            amount,
        }
    }
}

/// Register a user together with the account it owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterUserCmd {
    pub username: String,
    pub initial_balance: Decimal,
}

impl RegisterUserCmd {
    #[must_use]
    pub fn new(username: impl Into<String>, initial_balance: Decimal) -> Self {
        Self {
            username: username.into(),
            initial_balance,
        }
    }
}
