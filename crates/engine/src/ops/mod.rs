use std::{
    fmt,
    sync::{Arc, atomic::AtomicBool},
};

use sea_orm::DatabaseConnection;

use crate::{
    Account, ResultEngine,
    ledger,
    locks::{InMemoryLockManager, LockManager, SqlLockManager},
    settings::{EngineSettings, LockBackend},
};

mod accrual;
mod transfers;
mod users;

pub use accrual::{AccrualReport, run_accrual_schedule};
pub use transfers::{TransferOutcome, TransferStage};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    locks: Arc<dyn LockManager>,
    settings: EngineSettings,
    accrual_running: AtomicBool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Snapshot of the account owned by `user_id`.
    pub async fn account(&self, user_id: i64) -> ResultEngine<Account> {
        ledger::find(&self.database, user_id)
            .await?
            .ok_or(crate::EngineError::AccountNotFound(user_id))
    }

    /// Snapshots of every account ordered by owner.
    pub async fn accounts(&self) -> ResultEngine<Vec<Account>> {
        ledger::all(&self.database).await
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    settings: EngineSettings,
    locks: Option<Arc<dyn LockManager>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> EngineBuilder {
        self.settings = settings;
        self
    }

    /// Use `locks` instead of the backend named by the settings.
    pub fn lock_manager(mut self, locks: Arc<dyn LockManager>) -> EngineBuilder {
        self.locks = Some(locks);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let locks: Arc<dyn LockManager> = match self.locks {
            Some(locks) => locks,
            None => match self.settings.lock_backend {
                LockBackend::Memory => Arc::new(InMemoryLockManager::new()),
                LockBackend::Database => Arc::new(SqlLockManager::new(self.database.clone())),
            },
        };
        tracing::debug!(
            "engine built with {:?} lock backend",
            self.settings.lock_backend
        );
        Ok(Engine {
            database: self.database,
            locks,
            settings: self.settings,
            accrual_running: AtomicBool::new(false),
        })
    }
}
