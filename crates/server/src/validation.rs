//! Request body checks run before the engine is called.

use std::collections::BTreeMap;

use api_types::transfer::TransferNew;
use engine::MONEY_SCALE;
use rust_decimal::Decimal;

use crate::ServerError;

const MAX_INTEGER_DIGITS: usize = 10;

fn min_amount() -> Decimal {
    Decimal::new(1, MONEY_SCALE)
}

fn max_amount() -> Decimal {
    Decimal::new(1_000_000, 0)
}

/// Number of digits left of the decimal point.
fn integer_digits(value: Decimal) -> usize {
    let integer = value.trunc().abs();
    if integer.is_zero() {
        1
    } else {
        integer.normalize().to_string().len()
    }
}

/// Validated transfer parameters: recipient id and amount.
pub(crate) fn transfer(payload: &TransferNew) -> Result<(i64, Decimal), ServerError> {
    let mut fields = BTreeMap::new();

    let recipient_id = match payload.recipient_id {
        None => {
            fields.insert("recipientId".to_string(), "is required".to_string());
            None
        }
        Some(id) if id <= 0 => {
            fields.insert("recipientId".to_string(), "must be positive".to_string());
            None
        }
        Some(id) => Some(id),
    };

    let amount = match payload.amount {
        None => {
            fields.insert("amount".to_string(), "is required".to_string());
            None
        }
        Some(amount) => {
            let normalized = amount.normalize();
            if normalized.scale() > MONEY_SCALE || integer_digits(normalized) > MAX_INTEGER_DIGITS
            {
                fields.insert(
                    "amount".to_string(),
                    format!(
                        "must have at most {MAX_INTEGER_DIGITS} integer and {MONEY_SCALE} fraction digits"
                    ),
                );
                None
            } else if amount < min_amount() {
                fields.insert(
                    "amount".to_string(),
                    format!("must be at least {}", min_amount()),
                );
                None
            } else if amount > max_amount() {
                fields.insert(
                    "amount".to_string(),
                    format!("must be at most {}", max_amount()),
                );
                None
            } else {
                Some(amount)
            }
        }
    };

    match (recipient_id, amount) {
        (Some(recipient_id), Some(amount)) if fields.is_empty() => Ok((recipient_id, amount)),
        _ => Err(ServerError::Validation(fields)),
    }
}
