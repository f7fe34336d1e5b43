use std::time::Duration;

use sea_orm::{Database, DatabaseConnection};

use engine::{LockKey, LockManager, SqlLockManager};
use migration::MigratorTrait;

async fn manager() -> (SqlLockManager, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (SqlLockManager::new(db.clone()), db)
}

#[tokio::test]
async fn live_lease_blocks_second_acquire() {
    let (locks, _db) = manager().await;
    let key = LockKey::for_user(1);

    let lease = locks
        .acquire(&key, Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();
    assert!(locks.acquire(&key, Duration::from_secs(10)).await.unwrap().is_none());

    // Other keys are independent.
    assert!(
        locks
            .acquire(&LockKey::for_user(2), Duration::from_secs(10))
            .await
            .unwrap()
            .is_some()
    );

    assert!(locks.release(&lease).await.unwrap());
    assert!(!locks.release(&lease).await.unwrap());
    assert!(locks.acquire(&key, Duration::from_secs(10)).await.unwrap().is_some());
}

#[tokio::test]
async fn expired_lease_is_reclaimed_with_a_new_token() {
    let (locks, _db) = manager().await;
    let key = LockKey::for_user(1);

    let stale = locks
        .acquire(&key, Duration::from_millis(1))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fresh = locks
        .acquire(&key, Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stale.token, fresh.token);

    // The stale holder can not release the reclaimed lease.
    assert!(!locks.release(&stale).await.unwrap());
    assert!(locks.acquire(&key, Duration::from_secs(10)).await.unwrap().is_none());
    assert!(locks.release(&fresh).await.unwrap());
}
