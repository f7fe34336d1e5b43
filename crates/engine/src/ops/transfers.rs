//! Transfer coordinator.
//!
//! A transfer walks through the stages of [`TransferStage`]:
//!
//! 1. `Validating`: parameters and existence, no lock attempted.
//! 2. `LockAcquisition`: both distributed locks, in canonical order, fail
//!    fast.
//! 3. `Locked`: one ledger transaction, both rows loaded under row lock in the
//!    same order, funds and cap checked on those snapshots.
//! 4. `Applying`: debit, credit, persist, commit.
//!
//! The ledger transaction is always closed (committed or rolled back) before
//! the distributed locks are released, and the locks are released on every
//! path that acquired them.

use std::{fmt, sync::Arc};

use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{
    Account, Amount, EngineError, ResultEngine, TransferCmd, ledger,
    locks::{LockSet, lock_order},
    policy,
};

use super::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStage {
    Validating,
    LockAcquisition,
    Locked,
    Applying,
    Committed,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Validating => "validating",
            Self::LockAcquisition => "acquiring locks",
            Self::Locked => "locked",
            Self::Applying => "applying",
            Self::Committed => "committed",
        };
        f.write_str(stage)
    }
}

/// Balances of both parties as committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    pub sender: Account,
    pub recipient: Account,
}

impl Engine {
    /// Moves money between the accounts of two users.
    ///
    /// All or nothing: on any error both balances are left exactly as they
    /// were before the call.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<TransferOutcome> {
        let mut stage = TransferStage::Validating;
        let result = self.run_transfer(cmd, &mut stage).await;
        match &result {
            Ok(outcome) => tracing::info!(
                "transfer of {} from user {} to user {} committed, balances {} / {}",
                cmd.amount,
                cmd.sender_id,
                cmd.recipient_id,
                outcome.sender.balance,
                outcome.recipient.balance
            ),
            Err(err @ EngineError::Database(_)) => tracing::error!(
                "transfer from user {} to user {} failed while {stage}: {err}",
                cmd.sender_id,
                cmd.recipient_id
            ),
            Err(err) => tracing::warn!(
                "transfer of {} from user {} to user {} rejected while {stage}: {err}",
                cmd.amount,
                cmd.sender_id,
                cmd.recipient_id
            ),
        }
        result
    }

    async fn run_transfer(
        &self,
        cmd: TransferCmd,
        stage: &mut TransferStage,
    ) -> ResultEngine<TransferOutcome> {
        let TransferCmd {
            sender_id,
            recipient_id,
            amount,
        } = cmd;

        let amount = policy::validate_parameters(sender_id, recipient_id, amount)?;
        if !ledger::exists(&self.database, sender_id).await? {
            return Err(EngineError::SenderNotFound(sender_id));
        }
        if !ledger::exists(&self.database, recipient_id).await? {
            return Err(EngineError::RecipientNotFound(recipient_id));
        }

        *stage = TransferStage::LockAcquisition;
        let mut locks = LockSet::acquire_all(
            Arc::clone(&self.locks),
            &[sender_id, recipient_id],
            self.settings.lock_ttl,
        )
        .await?;

        *stage = TransferStage::Locked;
        let applied = self
            .apply_locked(sender_id, recipient_id, amount, stage)
            .await;
        locks.release().await;
        applied
    }

    /// Runs the ledger transaction of a transfer whose distributed locks are
    /// held. Returns only once the transaction is closed.
    async fn apply_locked(
        &self,
        sender_id: i64,
        recipient_id: i64,
        amount: Amount,
        stage: &mut TransferStage,
    ) -> ResultEngine<TransferOutcome> {
        let db_tx = self
            .database
            .begin()
            .await
            .map_err(EngineError::from_ledger)?;

        match self
            .apply_in_tx(&db_tx, sender_id, recipient_id, amount, stage)
            .await
        {
            Ok(outcome) => {
                db_tx.commit().await.map_err(EngineError::from_ledger)?;
                *stage = TransferStage::Committed;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback) = db_tx.rollback().await {
                    tracing::error!("failed to roll back transfer: {rollback}");
                }
                Err(err)
            }
        }
    }

    async fn apply_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        sender_id: i64,
        recipient_id: i64,
        amount: Amount,
        stage: &mut TransferStage,
    ) -> ResultEngine<TransferOutcome> {
        let mut sender = None;
        let mut recipient = None;
        for user_id in lock_order(&[sender_id, recipient_id]) {
            let account = ledger::load_for_update(db_tx, user_id)
                .await
                .map_err(|err| match err {
                    EngineError::AccountNotFound(id) if id == sender_id => {
                        EngineError::SenderNotFound(id)
                    }
                    EngineError::AccountNotFound(id) => EngineError::RecipientNotFound(id),
                    other => other,
                })?;
            if user_id == sender_id {
                sender = Some(account);
            } else {
                recipient = Some(account);
            }
        }
        let Some(sender) = sender else {
            return Err(EngineError::SenderNotFound(sender_id));
        };
        let Some(recipient) = recipient else {
            return Err(EngineError::RecipientNotFound(recipient_id));
        };

        policy::check_transfer(&sender, &recipient, amount, self.settings.cap_multiplier)?;

        *stage = TransferStage::Applying;
        let debited = sender
            .balance
            .checked_sub(amount.value())
            .ok_or_else(|| EngineError::Overflow(format!("debit of {amount} overflows")))?;
        let credited = recipient
            .balance
            .checked_add(amount.value())
            .ok_or_else(|| EngineError::Overflow(format!("credit of {amount} overflows")))?;
        let sender = sender.with_balance(debited);
        let recipient = recipient.with_balance(credited);

        ledger::save(db_tx, &sender).await?;
        ledger::save(db_tx, &recipient).await?;

        Ok(TransferOutcome { sender, recipient })
    }
}
