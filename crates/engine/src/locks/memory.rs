use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use super::{Lease, LockKey, LockManager};
use crate::ResultEngine;

#[derive(Debug)]
struct Entry {
    token: Uuid,
    expires_at: Instant,
}

/// Lock manager keeping its leases in this process.
///
/// Suitable for a single instance deployment and for tests. The map is
/// guarded by a synchronous mutex that is never held across an await point,
/// which makes the check and the insert of [`LockManager::acquire`] one atomic
/// step.
#[derive(Debug, Default)]
pub struct InMemoryLockManager {
    leases: Mutex<HashMap<LockKey, Entry>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<LockKey, Entry>> {
        // A poisoned map is still consistent: every mutation is a single
        // insert or remove.
        self.leases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &LockKey, ttl: Duration) -> ResultEngine<Option<Lease>> {
        let now = Instant::now();
        let mut leases = self.entries();
        if let Some(entry) = leases.get(key)
            && entry.expires_at > now
        {
            return Ok(None);
        }

        let token = Uuid::new_v4();
        leases.insert(
            key.clone(),
            Entry {
                token,
                expires_at: now + ttl,
            },
        );
        Ok(Some(Lease {
            key: key.clone(),
            token,
        }))
    }

    async fn release(&self, lease: &Lease) -> ResultEngine<bool> {
        let mut leases = self.entries();
        match leases.get(&lease.key) {
            Some(entry) if entry.token == lease.token => {
                leases.remove(&lease.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
