//! Balance invariant policy.
//!
//! Pure rules over account snapshots; nothing here reads or writes storage.
//! The funds and cap rules must be evaluated against snapshots loaded under
//! row lock.
//!
//! The cap of an account is pinned to the balance it was opened with:
//!
//! ```text
//! cap = initial_balance × cap_multiplier
//! ```
//!
//! A transfer is accepted only if `recipient.balance + amount <= cap`, and an
//! accrual tick grows a balance to `min(round(balance × accrual_rate), cap)`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{Account, Amount, EngineError, ResultEngine, money::MONEY_SCALE};

/// Parameter validity: distinct parties and a strictly positive amount.
pub fn validate_parameters(
    sender_id: i64,
    recipient_id: i64,
    amount: Decimal,
) -> ResultEngine<Amount> {
    if sender_id == recipient_id {
        return Err(EngineError::InvalidParameters(
            "Cannot transfer money to the same account".to_string(),
        ));
    }
    Amount::new(amount)
}

/// Highest balance `account` may reach.
pub fn balance_cap(account: &Account, cap_multiplier: Decimal) -> ResultEngine<Decimal> {
    account
        .initial_balance
        .checked_mul(cap_multiplier)
        .ok_or_else(|| {
            EngineError::Overflow(format!(
                "cap of account {} overflows",
                account.user_id
            ))
        })
}

/// Sufficient funds on the sender and room under the recipient's cap.
pub fn check_transfer(
    sender: &Account,
    recipient: &Account,
    amount: Amount,
    cap_multiplier: Decimal,
) -> ResultEngine<()> {
    if sender.balance < amount.value() {
        return Err(EngineError::InsufficientFunds(format!(
            "user {} with balance {} can not transfer {}",
            sender.user_id, sender.balance, amount
        )));
    }

    let cap = balance_cap(recipient, cap_multiplier)?;
    let credited = recipient
        .balance
        .checked_add(amount.value())
        .ok_or_else(|| EngineError::Overflow(format!("credit of {amount} overflows")))?;
    if credited > cap {
        return Err(EngineError::RecipientCapExceeded(format!(
            "user {} would reach {} above the cap of {}",
            recipient.user_id, credited, cap
        )));
    }
    Ok(())
}

/// Balance of `account` after one accrual tick.
///
/// A balance already at or above the cap is returned unchanged.
pub fn accrued_balance(
    account: &Account,
    accrual_rate: Decimal,
    cap_multiplier: Decimal,
) -> ResultEngine<Decimal> {
    let cap = balance_cap(account, cap_multiplier)?
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    if account.balance >= cap {
        return Ok(account.balance);
    }
    let grown = account
        .balance
        .checked_mul(accrual_rate)
        .ok_or_else(|| {
            EngineError::Overflow(format!("accrual of account {} overflows", account.user_id))
        })?
        .round_dp(MONEY_SCALE);
    Ok(grown.min(cap))
}
