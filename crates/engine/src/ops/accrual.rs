//! Periodic balance accrual.
//!
//! A tick goes through the same concurrency control as a transfer: the
//! distributed lock of every account is requested in canonical order, then
//! the locked accounts are loaded under row lock, grown and written back in a
//! single ledger transaction. Accounts whose lock is busy are left for the
//! next tick.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use sea_orm::{DatabaseTransaction, TransactionTrait};
use tokio::time::MissedTickBehavior;

use crate::{
    EngineError, ResultEngine, ledger,
    locks::{LockSet, lock_order},
    policy,
};

use super::Engine;

/// Result of one accrual tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccrualReport {
    /// Accounts whose balance changed.
    pub updated: usize,
    /// Accounts already at their cap.
    pub unchanged: usize,
    /// Owners whose account was locked by someone else.
    pub skipped: Vec<i64>,
}

/// Clears the running flag when a tick ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Engine {
    /// Runs one accrual tick over every account.
    ///
    /// At most one tick runs at a time on an engine; an overlapping call fails
    /// with [`EngineError::AccrualInProgress`].
    pub async fn accrue_balances(&self) -> ResultEngine<AccrualReport> {
        if self
            .accrual_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("accrual tick refused, previous tick still running");
            return Err(EngineError::AccrualInProgress);
        }
        let _running = RunningGuard(&self.accrual_running);

        let owners = ledger::owners(&self.database).await?;
        let (mut locks, skipped) =
            LockSet::acquire_available(Arc::clone(&self.locks), &owners, self.settings.lock_ttl)
                .await?;
        for user_id in &skipped {
            tracing::warn!("account of user {user_id} is locked, skipped by this accrual tick");
        }
        let locked: Vec<i64> = owners
            .into_iter()
            .filter(|user_id| !skipped.contains(user_id))
            .collect();

        let applied = self.accrue_locked(&locked).await;
        locks.release().await;

        let report = AccrualReport {
            skipped,
            ..applied?
        };
        tracing::info!(
            "accrual tick committed: {} updated, {} unchanged, {} skipped",
            report.updated,
            report.unchanged,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn accrue_locked(&self, user_ids: &[i64]) -> ResultEngine<AccrualReport> {
        let db_tx = self
            .database
            .begin()
            .await
            .map_err(EngineError::from_ledger)?;
        match self.accrue_in_tx(&db_tx, user_ids).await {
            Ok(report) => {
                db_tx.commit().await.map_err(EngineError::from_ledger)?;
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback) = db_tx.rollback().await {
                    tracing::error!("failed to roll back accrual tick: {rollback}");
                }
                Err(err)
            }
        }
    }

    async fn accrue_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        user_ids: &[i64],
    ) -> ResultEngine<AccrualReport> {
        let mut report = AccrualReport::default();
        for user_id in lock_order(user_ids) {
            let account = match ledger::load_for_update(db_tx, user_id).await {
                Ok(account) => account,
                // Removed together with its owner since the owners were listed.
                Err(EngineError::AccountNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            let next = policy::accrued_balance(
                &account,
                self.settings.accrual_rate,
                self.settings.cap_multiplier,
            )?;
            if next == account.balance {
                report.unchanged += 1;
                continue;
            }
            ledger::save(db_tx, &account.with_balance(next)).await?;
            report.updated += 1;
        }
        Ok(report)
    }
}

/// Runs [`Engine::accrue_balances`] every `accrual_interval`, forever.
///
/// Each tick is awaited before the next one is scheduled; ticks missed while
/// a slow run was in progress are skipped, not replayed.
pub async fn run_accrual_schedule(engine: Arc<Engine>) {
    let period = engine.settings.accrual_interval;
    if period.is_zero() {
        tracing::error!("accrual interval must be greater than zero, scheduler not started");
        return;
    }
    tracing::info!("accrual scheduled every {period:?}");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match engine.accrue_balances().await {
            Ok(_) => {}
            Err(EngineError::AccrualInProgress) => {}
            Err(err) => tracing::error!("accrual tick failed: {err}"),
        }
    }
}
