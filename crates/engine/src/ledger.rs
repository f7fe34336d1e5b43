//! Account ledger store.
//!
//! Reads for update take an exclusive row lock (`SELECT ... FOR UPDATE` on
//! backends that support it; SQLite serializes writers on the database file
//! instead) which is held until the surrounding transaction ends. Callers
//! touching several accounts must load them in [`lock_order`].
//!
//! [`lock_order`]: crate::locks::lock_order

use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, prelude::*,
};

use crate::{Account, EngineError, ResultEngine, accounts, money::decimal_to_column};

/// Loads the account owned by `user_id` and locks its row for the rest of
/// `db_tx`.
pub(crate) async fn load_for_update(
    db_tx: &DatabaseTransaction,
    user_id: i64,
) -> ResultEngine<Account> {
    let model = accounts::Entity::find()
        .filter(accounts::Column::UserId.eq(user_id))
        .lock_exclusive()
        .one(db_tx)
        .await
        .map_err(EngineError::from_ledger)?
        .ok_or(EngineError::AccountNotFound(user_id))?;
    Account::try_from(model)
}

/// Writes the balance of `account` as part of `db_tx`.
pub(crate) async fn save(db_tx: &DatabaseTransaction, account: &Account) -> ResultEngine<()> {
    accounts::balance_update(account)
        .update(db_tx)
        .await
        .map_err(EngineError::from_ledger)?;
    Ok(())
}

/// Inserts the account of `user_id`, seeded with `initial_balance`.
pub(crate) async fn open(
    db_tx: &DatabaseTransaction,
    user_id: i64,
    initial_balance: Decimal,
) -> ResultEngine<Account> {
    let stored = decimal_to_column(initial_balance);
    let model = accounts::ActiveModel {
        id: ActiveValue::NotSet,
        user_id: ActiveValue::Set(user_id),
        balance: ActiveValue::Set(stored.clone()),
        initial_balance: ActiveValue::Set(stored),
    }
    .insert(db_tx)
    .await?;
    Account::try_from(model)
}

/// Fast existence check, taken without any lock.
pub(crate) async fn exists<C: ConnectionTrait>(db: &C, user_id: i64) -> ResultEngine<bool> {
    let count = accounts::Entity::find()
        .filter(accounts::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Owners of every account, in lock order.
pub(crate) async fn owners<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<i64>> {
    let owners = accounts::Entity::find()
        .select_only()
        .column(accounts::Column::UserId)
        .order_by_asc(accounts::Column::UserId)
        .into_tuple::<i64>()
        .all(db)
        .await?;
    Ok(owners)
}

pub(crate) async fn find<C: ConnectionTrait>(db: &C, user_id: i64) -> ResultEngine<Option<Account>> {
    accounts::Entity::find()
        .filter(accounts::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .map(Account::try_from)
        .transpose()
}

pub(crate) async fn all<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<Account>> {
    accounts::Entity::find()
        .order_by_asc(accounts::Column::UserId)
        .all(db)
        .await?
        .into_iter()
        .map(Account::try_from)
        .collect()
}
