//! Two callers contending for one lock, end to end

use std::{sync::Arc, time::Duration};

use crate::client::{AcquireRequest, LockClient, LockClientConfig, Release};
use crate::store::{FileStore, LockStore, MemoryStore};
use crate::tests::ManualClock;
use crate::{DurationValue, LockError};

fn caller<S: LockStore>(store: S, clock: &ManualClock, holder: &str) -> LockClient<S> {
    let config = LockClientConfig {
        holder: Some(holder.to_owned()),
        ..Default::default()
    };
    LockClient::with_config(store, config).with_clock(Arc::new(clock.clone()))
}

async fn crashed_holder_is_reclaimed<S: LockStore>(store: S) {
    let clock = ManualClock::new();
    let a = caller(store.clone(), &clock, "a");
    let b = caller(store, &clock, "b");
    let lease_duration: DurationValue = "10s".parse().expect("duration");
    let no_wait: DurationValue = "0s".parse().expect("duration");

    let a1 = a
        .acquire(&AcquireRequest::new("build-lock", lease_duration.into()))
        .await
        .expect("a acquires a free lock");

    let err = b
        .acquire(
            &AcquireRequest::new("build-lock", lease_duration.into())
                .with_wait_timeout(no_wait.into()),
        )
        .await
        .expect_err("a holds the lock");
    assert!(matches!(err, LockError::Unavailable { .. }));

    // a stops renewing
    clock.advance(Duration::from_secs(11));
    let b1 = b
        .acquire(&AcquireRequest::new("build-lock", lease_duration.into()))
        .await
        .expect("b reclaims the expired lease");
    assert!(b1.reclaimed());
    assert_ne!(a1.lease_id(), b1.lease_id());

    let status = b
        .inspect("build-lock")
        .await
        .expect("inspect")
        .expect("held");
    assert_eq!(status.record.holder.as_deref(), Some("b"));

    assert_eq!(
        a.release("build-lock", a1.lease_id()).await.expect("release"),
        Release::NotHeld
    );
    assert_eq!(
        b.release("build-lock", b1.lease_id()).await.expect("release"),
        Release::Released
    );
    assert!(b.inspect("build-lock").await.expect("inspect").is_none());
}

#[tokio::test]
async fn test_crashed_holder_on_memory_store() {
    crashed_holder_is_reclaimed(MemoryStore::new()).await;
}

#[tokio::test]
async fn test_crashed_holder_on_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    crashed_holder_is_reclaimed(FileStore::open(dir.path()).expect("open store")).await;
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = ManualClock::new();
    let first = caller(FileStore::open(dir.path()).expect("open"), &clock, "first");
    let lease = first
        .acquire(&AcquireRequest::new("deploy/prod", Duration::from_secs(60)))
        .await
        .expect("acquire");
    drop(first);

    let second = caller(FileStore::open(dir.path()).expect("reopen"), &clock, "second");
    assert!(matches!(
        second
            .acquire(&AcquireRequest::new("deploy/prod", Duration::from_secs(60)))
            .await,
        Err(LockError::Unavailable { .. })
    ));
    let renewed = second
        .renew("deploy/prod", lease.lease_id(), Duration::from_secs(60))
        .await
        .expect("lease id is enough to renew from another handle");
    assert_eq!(
        second
            .release("deploy/prod", renewed.lease_id())
            .await
            .expect("release"),
        Release::Released
    );
}
