use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Account, Engine, EngineError, EngineSettings, InMemoryLockManager, LockBackend, LockKey,
    LockManager, RegisterUserCmd, SqlLockManager, TransferCmd,
};
use migration::MigratorTrait;

async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn engine_with_db() -> Engine {
    Engine::builder()
        .database(database().await)
        .build()
        .await
        .unwrap()
}

async fn engine_with_locks(locks: Arc<dyn LockManager>) -> Engine {
    Engine::builder()
        .database(database().await)
        .lock_manager(locks)
        .build()
        .await
        .unwrap()
}

async fn register(engine: &Engine, username: &str, balance: Decimal) -> Account {
    engine
        .register_user(RegisterUserCmd::new(username, balance))
        .await
        .unwrap()
}

async fn balances(engine: &Engine, a: &Account, b: &Account) -> (Decimal, Decimal) {
    (
        engine.account(a.user_id).await.unwrap().balance,
        engine.account(b.user_id).await.unwrap().balance,
    )
}

#[tokio::test]
async fn committed_transfer_moves_funds() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(500)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    let outcome = engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap();

    assert_eq!(outcome.sender.balance, dec!(400));
    assert_eq!(outcome.recipient.balance, dec!(300));
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(400), dec!(300)));
}

#[tokio::test]
async fn transfers_keep_cents_exact() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(10.10)).await;
    let bob = register(&engine, "bob", dec!(5.00)).await;

    engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(0.30)))
        .await
        .unwrap();

    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(9.80), dec!(5.30)));
}

#[tokio::test]
async fn zero_and_negative_amounts_are_rejected() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(500)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    for amount in [dec!(0), dec!(-100)] {
        let err = engine
            .transfer(TransferCmd::new(alice.user_id, bob.user_id, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameters(_)));
    }
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(500), dec!(200)));
}

#[tokio::test]
async fn self_transfer_is_rejected() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(500)).await;

    let err = engine
        .transfer(TransferCmd::new(alice.user_id, alice.user_id, dec!(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidParameters(_)));
    assert_eq!(engine.account(alice.user_id).await.unwrap().balance, dec!(500));
}

#[tokio::test]
async fn insufficient_funds_leave_balances_unchanged() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(50)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    let err = engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(50), dec!(200)));
}

#[tokio::test]
async fn recipient_cap_is_enforced() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(5000)).await;
    let bob = register(&engine, "bob", dec!(1000)).await;

    // 1000 + 1200 = 2200 > 1000 × 2.07.
    let err = engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(1200)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RecipientCapExceeded(_)));
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(5000), dec!(1000)));

    // Exactly up to the cap is accepted.
    engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(1070)))
        .await
        .unwrap();
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(3930), dec!(2070)));

    // The cap stays pinned to the opening balance.
    let err = engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(0.01)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RecipientCapExceeded(_)));
}

#[tokio::test]
async fn unknown_parties_are_reported() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(500)).await;

    let err = engine
        .transfer(TransferCmd::new(alice.user_id, 999, dec!(10)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::RecipientNotFound(999));

    let err = engine
        .transfer(TransferCmd::new(999, alice.user_id, dec!(10)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::SenderNotFound(999));

    assert_eq!(engine.account(alice.user_id).await.unwrap().balance, dec!(500));
}

#[tokio::test]
async fn held_lock_fails_fast_without_side_effects() {
    let locks: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
    let engine = engine_with_locks(Arc::clone(&locks)).await;
    let alice = register(&engine, "alice", dec!(500)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    let held = locks
        .acquire(&LockKey::for_user(bob.user_id), Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    let err = engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::LockAcquisitionFailed(format!("account_lock:{}", bob.user_id))
    );
    assert!(err.is_retryable());
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(500), dec!(200)));

    // The sender's lock was handed back; once bob's is free the retry commits.
    assert!(locks.release(&held).await.unwrap());
    engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap();
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(400), dec!(300)));
}

#[tokio::test]
async fn locks_are_released_after_rejections() {
    let locks: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
    let engine = engine_with_locks(Arc::clone(&locks)).await;
    let alice = register(&engine, "alice", dec!(50)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap_err();

    for user_id in [alice.user_id, bob.user_id] {
        let lease = locks
            .acquire(&LockKey::for_user(user_id), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(lease.is_some(), "lock of user {user_id} leaked");
    }
}

#[tokio::test]
async fn database_lock_backend_transfers() {
    let db = database().await;
    let engine = Engine::builder()
        .database(db)
        .settings(EngineSettings {
            lock_backend: LockBackend::Database,
            ..EngineSettings::default()
        })
        .build()
        .await
        .unwrap();
    let alice = register(&engine, "alice", dec!(500)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    for _ in 0..3 {
        engine
            .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(10)))
            .await
            .unwrap();
    }
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(470), dec!(230)));
}

#[tokio::test]
async fn configured_database_backend_sees_foreign_leases() {
    let db = database().await;
    let engine = Engine::builder()
        .database(db.clone())
        .settings(EngineSettings {
            lock_backend: LockBackend::Database,
            ..EngineSettings::default()
        })
        .build()
        .await
        .unwrap();
    let alice = register(&engine, "alice", dec!(500)).await;
    let bob = register(&engine, "bob", dec!(200)).await;

    // Another process holding bob's lease in the shared table.
    let other = SqlLockManager::new(db);
    let held = other
        .acquire(&LockKey::for_user(bob.user_id), Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    let err = engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::LockAcquisitionFailed(format!("account_lock:{}", bob.user_id))
    );

    assert!(other.release(&held).await.unwrap());
    engine
        .transfer(TransferCmd::new(alice.user_id, bob.user_id, dec!(100)))
        .await
        .unwrap();
    assert_eq!(balances(&engine, &alice, &bob).await, (dec!(400), dec!(300)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opposite_transfers_conserve_funds() {
    let engine = Arc::new(
        Engine::builder()
            .database(database().await)
            .settings(EngineSettings {
                lock_backend: LockBackend::Memory,
                ..EngineSettings::default()
            })
            .build()
            .await
            .unwrap(),
    );
    let alice = register(&engine, "alice", dec!(1000)).await;
    let bob = register(&engine, "bob", dec!(1000)).await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..50 {
        let engine = Arc::clone(&engine);
        let (from, to) = if i % 2 == 0 {
            (alice.user_id, bob.user_id)
        } else {
            (bob.user_id, alice.user_id)
        };
        tasks.spawn(async move { engine.transfer(TransferCmd::new(from, to, dec!(10))).await });
    }

    let finished = tokio::time::timeout(Duration::from_secs(30), async {
        let mut committed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(outcome) => {
                    assert!(outcome.sender.balance >= Decimal::ZERO);
                    assert!(outcome.recipient.balance >= Decimal::ZERO);
                    committed += 1;
                }
                Err(err) => assert!(err.is_retryable(), "unexpected rejection: {err}"),
            }
        }
        committed
    })
    .await
    .expect("transfers deadlocked");
    assert!(finished > 0);

    let (a, b) = balances(&engine, &alice, &bob).await;
    assert_eq!(a + b, dec!(2000));
    assert!(a >= Decimal::ZERO && b >= Decimal::ZERO);
}

#[tokio::test]
async fn registration_rules() {
    let engine = engine_with_db().await;
    let alice = register(&engine, "alice", dec!(120.50)).await;
    assert_eq!(alice.balance, dec!(120.50));
    assert_eq!(alice.initial_balance, dec!(120.50));

    let err = engine
        .register_user(RegisterUserCmd::new("alice", dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("alice".to_string()));

    let err = engine
        .register_user(RegisterUserCmd::new("carol", dec!(-1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameters(_)));

    let err = engine
        .open_account(alice.user_id, dec!(10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let err = engine.open_account(999, dec!(10)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameters(_)));

    let accounts = engine.accounts().await.unwrap();
    assert_eq!(accounts, vec![alice]);
}
