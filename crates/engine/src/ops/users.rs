use rust_decimal::Decimal;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    Account, EngineError, RegisterUserCmd, ResultEngine, ledger, money::MONEY_SCALE, users,
};

use super::{Engine, with_tx};

fn normalize_username(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidParameters(
            "username must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_initial_balance(value: Decimal) -> ResultEngine<Decimal> {
    if value < Decimal::ZERO {
        return Err(EngineError::InvalidParameters(
            "initial balance must not be negative".to_string(),
        ));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(EngineError::InvalidParameters(format!(
            "initial balance must have at most {MONEY_SCALE} fraction digits"
        )));
    }
    Ok(value)
}

impl Engine {
    /// Creates a user and the account it owns, in one transaction.
    ///
    /// The account is seeded with `initial_balance`, which also becomes the
    /// basis of its cap.
    pub async fn register_user(&self, cmd: RegisterUserCmd) -> ResultEngine<Account> {
        let username = normalize_username(&cmd.username)?;
        let initial_balance = validate_initial_balance(cmd.initial_balance)?;

        let account = with_tx!(self, |db_tx| {
            let exists = users::Entity::find()
                .filter(users::Column::Username.eq(username.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(username));
            }

            let user = users::ActiveModel {
                id: ActiveValue::NotSet,
                username: ActiveValue::Set(username.clone()),
            }
            .insert(&db_tx)
            .await?;
            ledger::open(&db_tx, user.id, initial_balance).await
        })?;
        tracing::info!(
            "registered user {username} ({}) with balance {initial_balance}",
            account.user_id
        );
        Ok(account)
    }

    /// Opens the account of an existing user that has none yet.
    pub async fn open_account(
        &self,
        user_id: i64,
        initial_balance: Decimal,
    ) -> ResultEngine<Account> {
        let initial_balance = validate_initial_balance(initial_balance)?;

        let account = with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .is_none()
            {
                return Err(EngineError::InvalidParameters(format!(
                    "user {user_id} not found"
                )));
            }
            if ledger::exists(&db_tx, user_id).await? {
                return Err(EngineError::ExistingKey(format!("account of user {user_id}")));
            }
            ledger::open(&db_tx, user_id, initial_balance).await
        })?;
        tracing::info!("opened account of user {user_id} with balance {initial_balance}");
        Ok(account)
    }
}
