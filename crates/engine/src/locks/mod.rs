//! Distributed lock manager.
//!
//! A lock is a lease on a key derived from an account owner's identity. Every
//! successful acquisition is stamped with a fresh fencing token and only a
//! release presenting that token removes the lease, so a holder whose lease
//! expired and was handed to someone else cannot release the new holder's
//! lock.
//!
//! Two backends are provided:
//!
//! - [`InMemoryLockManager`]: leases live in this process.
//! - [`SqlLockManager`]: leases live in the `account_locks` table and are
//!   shared by every process connected to the same database.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use uuid::Uuid;

use crate::ResultEngine;

mod memory;
mod sql;

pub use memory::InMemoryLockManager;
pub use sql::SqlLockManager;

const KEY_PREFIX: &str = "account_lock:";

/// Key of the lock guarding the account owned by a user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn for_user(user_id: i64) -> Self {
        Self(format!("{KEY_PREFIX}{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of a successful acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    pub key: LockKey,
    /// Fencing token issued for this acquisition.
    pub token: Uuid,
}

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Atomically creates the lease for `key` if there is no live one.
    ///
    /// Returns `None` when another caller holds an unexpired lease.
    async fn acquire(&self, key: &LockKey, ttl: Duration) -> ResultEngine<Option<Lease>>;

    /// Removes the lease if the stored token still matches.
    ///
    /// Releasing an expired, reclaimed or already released lease is not an
    /// error; the return value tells whether something was removed.
    async fn release(&self, lease: &Lease) -> ResultEngine<bool>;
}

/// Sorts user identities in the canonical lock order (ascending) and drops
/// duplicates.
///
/// Every operation touching more than one account takes its locks, distributed
/// and row level, in this order.
pub fn lock_order(user_ids: &[i64]) -> Vec<i64> {
    let mut ordered = user_ids.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

/// The leases held by one operation.
///
/// [`LockSet::release`] must be awaited on every exit path. If the set is
/// dropped while still holding leases (a panic or a cancelled future) the
/// release is handed to the runtime, and failing that the leases expire with
/// their TTL.
pub struct LockSet {
    manager: Arc<dyn LockManager>,
    leases: Vec<Lease>,
}

impl LockSet {
    fn new(manager: Arc<dyn LockManager>) -> Self {
        Self {
            manager,
            leases: Vec::new(),
        }
    }

    /// Acquires the locks of `user_ids` in canonical order.
    ///
    /// Fails fast: if any lock is busy, the ones already taken are released
    /// and [`EngineError::LockAcquisitionFailed`] is returned.
    ///
    /// [`EngineError::LockAcquisitionFailed`]: crate::EngineError::LockAcquisitionFailed
    pub async fn acquire_all(
        manager: Arc<dyn LockManager>,
        user_ids: &[i64],
        ttl: Duration,
    ) -> ResultEngine<Self> {
        let mut set = Self::new(manager);
        for user_id in lock_order(user_ids) {
            let key = LockKey::for_user(user_id);
            match set.manager.acquire(&key, ttl).await {
                Ok(Some(lease)) => {
                    tracing::debug!("acquired {key}");
                    set.leases.push(lease);
                }
                Ok(None) => {
                    set.release().await;
                    return Err(crate::EngineError::LockAcquisitionFailed(key.to_string()));
                }
                Err(err) => {
                    set.release().await;
                    return Err(err);
                }
            }
        }
        Ok(set)
    }

    /// Acquires whichever locks of `user_ids` are free, in canonical order.
    ///
    /// Returns the set and the identities whose lock was busy.
    pub async fn acquire_available(
        manager: Arc<dyn LockManager>,
        user_ids: &[i64],
        ttl: Duration,
    ) -> ResultEngine<(Self, Vec<i64>)> {
        let mut set = Self::new(manager);
        let mut busy = Vec::new();
        for user_id in lock_order(user_ids) {
            let key = LockKey::for_user(user_id);
            match set.manager.acquire(&key, ttl).await {
                Ok(Some(lease)) => set.leases.push(lease),
                Ok(None) => busy.push(user_id),
                Err(err) => {
                    set.release().await;
                    return Err(err);
                }
            }
        }
        Ok((set, busy))
    }

    pub fn leases(&self) -> &[Lease] {
        &self.leases
    }

    /// Releases every held lease in reverse acquisition order.
    ///
    /// Release failures are logged, never surfaced: the lease still expires
    /// with its TTL.
    pub async fn release(&mut self) {
        while let Some(lease) = self.leases.pop() {
            match self.manager.release(&lease).await {
                Ok(true) => tracing::debug!("released {}", lease.key),
                Ok(false) => tracing::warn!("lease {} was already gone on release", lease.key),
                Err(err) => tracing::error!("failed to release {}: {err}", lease.key),
            }
        }
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        if self.leases.is_empty() {
            return;
        }
        let leases = std::mem::take(&mut self.leases);
        let manager = Arc::clone(&self.manager);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for lease in leases.iter().rev() {
                        if let Err(err) = manager.release(lease).await {
                            tracing::error!("failed to release {}: {err}", lease.key);
                        }
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    "{} lease(s) dropped outside a runtime, leaving them to expire",
                    leases.len()
                );
            }
        }
    }
}
