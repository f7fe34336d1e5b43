//! Lease table backend.
//!
//! A lease is a row of `account_locks`. Acquisition is a single upsert that
//! only overwrites an existing row when its lease has expired, so the check
//! and the set happen in one statement on the database side.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseConnection, QueryFilter, entity::prelude::*, sea_query::OnConflict,
};
use uuid::Uuid;

use super::{Lease, LockKey, LockManager};
use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "account_locks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub lock_key: String,
    /// Fencing token of the current holder.
    pub token: String,
    /// Expiry as unix milliseconds.
    pub expires_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lock manager storing leases in the database.
#[derive(Clone, Debug)]
pub struct SqlLockManager {
    database: DatabaseConnection,
}

impl SqlLockManager {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

fn ttl_millis(ttl: Duration) -> ResultEngine<i64> {
    i64::try_from(ttl.as_millis())
        .map_err(|_| EngineError::Overflow(format!("lock ttl {ttl:?} is too large")))
}

#[async_trait]
impl LockManager for SqlLockManager {
    async fn acquire(&self, key: &LockKey, ttl: Duration) -> ResultEngine<Option<Lease>> {
        let now = Utc::now().timestamp_millis();
        let expires_at = now
            .checked_add(ttl_millis(ttl)?)
            .ok_or_else(|| EngineError::Overflow(format!("lock ttl {ttl:?} is too large")))?;
        let token = Uuid::new_v4();

        let lease = ActiveModel {
            lock_key: ActiveValue::Set(key.as_str().to_string()),
            token: ActiveValue::Set(token.to_string()),
            expires_at: ActiveValue::Set(expires_at),
        };
        let reclaim_expired = OnConflict::column(Column::LockKey)
            .update_columns([Column::Token, Column::ExpiresAt])
            .action_and_where(Column::ExpiresAt.lte(now))
            .to_owned();

        let written = Entity::insert(lease)
            .on_conflict(reclaim_expired)
            .exec_without_returning(&self.database)
            .await?;

        Ok((written == 1).then(|| Lease {
            key: key.clone(),
            token,
        }))
    }

    async fn release(&self, lease: &Lease) -> ResultEngine<bool> {
        let deleted = Entity::delete_many()
            .filter(Column::LockKey.eq(lease.key.as_str()))
            .filter(Column::Token.eq(lease.token.to_string()))
            .exec(&self.database)
            .await?;
        Ok(deleted.rows_affected > 0)
    }
}
