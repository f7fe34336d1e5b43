//! Process-wide engine parameters.
//!
//! The values are supplied by the application configuration; the defaults
//! below are only used when nothing is configured.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Backend used by the distributed lock manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Leases live in the memory of this process.
    Memory,
    /// Leases live in the `account_locks` table, shared by every process that
    /// uses the same database.
    #[default]
    Database,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Lifetime of a distributed lock lease.
    pub lock_ttl: Duration,
    /// Factor bounding a balance relative to the account's initial balance.
    pub cap_multiplier: Decimal,
    /// Growth factor applied by every accrual tick.
    pub accrual_rate: Decimal,
    /// Period between two accrual ticks.
    pub accrual_interval: Duration,
    pub lock_backend: LockBackend,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(10),
            cap_multiplier: Decimal::new(207, 2),
            accrual_rate: Decimal::new(110, 2),
            accrual_interval: Duration::from_secs(30),
            lock_backend: LockBackend::Database,
        }
    }
}
