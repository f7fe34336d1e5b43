//! The module contains `Account` struct and its implementation.

use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};

use crate::{
    EngineError, ResultEngine,
    money::{decimal_from_column, decimal_to_column},
};

/// An account.
///
/// This is an immutable snapshot of a ledger row. Mutations build a new
/// snapshot with [`Account::with_balance`] which is then written back through
/// the ledger store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    /// Identity of the owning user. Accounts are addressed by owner.
    pub user_id: i64,
    pub balance: Decimal,
    /// Balance the account was opened with. Caps are computed against it.
    pub initial_balance: Decimal,
}

impl Account {
    #[must_use]
    pub fn with_balance(&self, balance: Decimal) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_id: i64,
    /// Decimal rendered as text.
    pub balance: String,
    /// Decimal rendered as text.
    pub initial_balance: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            balance: decimal_from_column("balance", &model.balance)?,
            initial_balance: decimal_from_column("initial_balance", &model.initial_balance)?,
        })
    }
}

/// Builds the update touching only the balance of `account`.
pub(crate) fn balance_update(account: &Account) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Unchanged(account.id),
        balance: ActiveValue::Set(decimal_to_column(account.balance)),
        ..Default::default()
    }
}
