//! Funds-transfer engine.
//!
//! Money moves between accounts only through [`Engine::transfer`] and
//! [`Engine::accrue_balances`]. Both take the distributed lock of every
//! account they touch in canonical order and then mutate the ledger inside one
//! transaction holding the row locks, in the same order.

pub use accounts::Account;
pub use commands::{RegisterUserCmd, TransferCmd};
pub use error::EngineError;
pub use locks::{
    InMemoryLockManager, Lease, LockKey, LockManager, LockSet, SqlLockManager, lock_order,
};
pub use money::{Amount, MONEY_SCALE};
pub use ops::{
    AccrualReport, Engine, EngineBuilder, TransferOutcome, TransferStage, run_accrual_schedule,
};
pub use settings::{EngineSettings, LockBackend};

mod accounts;
mod commands;
mod error;
mod ledger;
pub mod locks;
mod money;
mod ops;
pub mod policy;
mod settings;
mod users;

pub type ResultEngine<T> = Result<T, EngineError>;
