use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use jobwrapper::fs::mock::MockFileSystem;
use jobwrapper::fs::RealFileSystem;
use jobwrapper::lock::{
    DoneReason, FileLocker, INITIAL_BACKOFF, LockContext, LockError, Locker, MAX_BACKOFF, MockLocker,
    next_backoff,
};
use jobwrapper_test_utils::{init_tracing, with_timeout};

fn file_locker(dir: &TempDir) -> FileLocker {
    FileLocker::with_paths(dir.path(), ".lockfile", Arc::new(RealFileSystem))
}

#[tokio::test]
async fn acquire_release_lifecycle() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);
    let ctx = LockContext::background().with_timeout(Duration::from_secs(5));

    locker.acquire(&ctx, "backup").await.unwrap();
    assert!(locker.is_held("backup"));

    match locker.acquire(&ctx, "backup").await {
        Err(LockError::AlreadyHeld(group)) => assert_eq!(group, "backup"),
        other => panic!("expected AlreadyHeld, got {:?}", other),
    }

    locker.release("backup").unwrap();
    assert!(!locker.is_held("backup"));

    match locker.release("backup") {
        Err(e @ LockError::NotHeld(_)) => assert_eq!(e.to_string(), "lock backup does not exist"),
        other => panic!("expected NotHeld, got {:?}", other),
    }
}

#[tokio::test]
async fn lock_file_is_created_and_kept_after_release() {
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);
    let ctx = LockContext::background();

    locker.acquire(&ctx, "nightly").await.unwrap();
    let path = dir.path().join("nightly").join(".lockfile");
    assert_eq!(locker.lock_file_path("nightly"), path);
    assert!(path.is_file());

    locker.release("nightly").unwrap();
    assert!(path.is_file());
}

#[tokio::test]
async fn reacquire_after_release_in_same_process() {
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);
    let ctx = LockContext::background().with_timeout(Duration::from_secs(2));

    for _ in 0..3 {
        locker.acquire(&ctx, "backup").await.unwrap();
        locker.release("backup").unwrap();
    }
}

#[tokio::test]
async fn reentrant_acquire_fails_without_waiting() {
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);
    let ctx = LockContext::background().with_timeout(Duration::from_secs(30));

    locker.acquire(&ctx, "backup").await.unwrap();

    let start = Instant::now();
    let err = locker.acquire(&ctx, "backup").await.unwrap_err();
    assert!(matches!(err, LockError::AlreadyHeld(_)));
    assert!(
        start.elapsed() < Duration::from_millis(50),
        "re-entrant acquire took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn release_without_acquire_is_rejected() {
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);

    assert!(matches!(locker.release("never"), Err(LockError::NotHeld(_))));
}

#[tokio::test]
async fn times_out_when_held_elsewhere() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let holder = file_locker(&dir);
    let waiter = file_locker(&dir);

    holder
        .acquire(&LockContext::background(), "backup")
        .await
        .unwrap();

    let ctx = LockContext::background().with_timeout(Duration::from_millis(200));
    let start = Instant::now();
    let err = with_timeout(waiter.acquire(&ctx, "backup")).await.unwrap_err();
    let elapsed = start.elapsed();

    match err {
        LockError::TimedOut(group) => assert_eq!(group, "backup"),
        other => panic!("expected TimedOut, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(190), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "returned late: {:?}", elapsed);
    assert!(!waiter.is_held("backup"));
}

#[tokio::test]
async fn cancellation_stops_waiting() {
    let dir = TempDir::new().unwrap();
    let holder = file_locker(&dir);
    let waiter = file_locker(&dir);

    holder
        .acquire(&LockContext::background(), "backup")
        .await
        .unwrap();

    let token = CancellationToken::new();
    let ctx = LockContext::new(token.clone()).with_timeout(Duration::from_secs(60));
    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        });
    }

    let start = Instant::now();
    let err = with_timeout(waiter.acquire(&ctx, "backup")).await.unwrap_err();
    assert!(matches!(err, LockError::Cancelled(_)), "got {:?}", err);
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn already_cancelled_context_does_not_take_lock() {
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);
    let token = CancellationToken::new();
    token.cancel();

    let err = locker
        .acquire(&LockContext::new(token), "backup")
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Cancelled(_)));
    assert!(!locker.is_held("backup"));

    // The handle is still usable afterwards.
    locker
        .acquire(&LockContext::background(), "backup")
        .await
        .unwrap();
}

#[tokio::test]
async fn waiter_gets_lock_after_release() {
    let dir = TempDir::new().unwrap();
    let holder = Arc::new(file_locker(&dir));
    let waiter = Arc::new(file_locker(&dir));

    holder
        .acquire(&LockContext::background(), "backup")
        .await
        .unwrap();

    let task = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move {
            let ctx = LockContext::background().with_timeout(Duration::from_secs(5));
            waiter.acquire(&ctx, "backup").await
        })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!task.is_finished());
    holder.release("backup").unwrap();

    with_timeout(task).await.unwrap().unwrap();
    assert!(waiter.is_held("backup"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_lockers_are_mutually_exclusive() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let locker = file_locker(&dir);
        let active = Arc::clone(&active);
        let max_seen = Arc::clone(&max_seen);
        tasks.push(tokio::spawn(async move {
            let ctx = LockContext::background().with_timeout(Duration::from_secs(10));
            locker.acquire(&ctx, "shared").await.unwrap();

            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            active.fetch_sub(1, Ordering::SeqCst);

            locker.release("shared").unwrap();
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_groups_do_not_contend() {
    let dir = TempDir::new().unwrap();
    let a = file_locker(&dir);
    let b = file_locker(&dir);
    let ctx = LockContext::background().with_timeout(Duration::from_millis(50));

    a.acquire(&ctx, "backup").await.unwrap();
    b.acquire(&ctx, "reports").await.unwrap();
}

#[tokio::test]
async fn directory_creation_failure_is_reported() {
    let fs = MockFileSystem::new();
    fs.deny("/locks");
    let locker = FileLocker::with_paths("/locks", ".lockfile", Arc::new(fs));

    let err = locker
        .acquire(&LockContext::background(), "backup")
        .await
        .unwrap_err();
    match err {
        LockError::CreateDir { group, dir, .. } => {
            assert_eq!(group, "backup");
            assert_eq!(dir, std::path::PathBuf::from("/locks/backup"));
        }
        other => panic!("expected CreateDir, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_group_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let locker = file_locker(&dir);

    for group in ["", "..", "a/b"] {
        let err = locker
            .acquire(&LockContext::background(), group)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::InvalidGroup(_)), "group {group:?}: {err:?}");
    }
}

#[tokio::test]
async fn mock_locker_lifecycle() {
    let locker = MockLocker::new();
    let ctx = LockContext::background();

    locker.acquire(&ctx, "backup").await.unwrap();
    assert!(locker.is_held("backup"));
    assert!(matches!(
        locker.acquire(&ctx, "backup").await,
        Err(LockError::AlreadyHeld(_))
    ));
    locker.release("backup").unwrap();
    assert!(matches!(locker.release("backup"), Err(LockError::NotHeld(_))));
}

#[tokio::test]
async fn mock_locker_hooks_override_defaults() {
    let locker = MockLocker::new()
        .on_acquire(|group| Err(LockError::TimedOut(group.to_string())))
        .on_release(|_| Ok(()));
    let ctx = LockContext::background();

    assert!(matches!(
        locker.acquire(&ctx, "backup").await,
        Err(LockError::TimedOut(_))
    ));
    locker.release("backup").unwrap();
}

#[tokio::test]
async fn context_keeps_the_earliest_deadline() {
    let ctx = LockContext::background().with_timeout(Duration::from_millis(50));
    let first = ctx.deadline().unwrap();
    let ctx = ctx.with_timeout(Duration::from_secs(60));
    assert_eq!(ctx.deadline(), Some(first));

    let earlier = first - Duration::from_millis(10);
    assert_eq!(ctx.with_deadline(earlier).deadline(), Some(earlier));
}

#[tokio::test]
async fn context_reports_why_it_fired() {
    let ctx = LockContext::background().with_timeout(Duration::from_millis(20));
    assert_eq!(ctx.check(), None);
    assert_eq!(with_timeout(ctx.done()).await, DoneReason::DeadlineExceeded);
    assert_eq!(ctx.check(), Some(DoneReason::DeadlineExceeded));

    let ctx = LockContext::background().with_timeout(Duration::from_secs(60));
    ctx.token().cancel();
    assert_eq!(ctx.check(), Some(DoneReason::Cancelled));
    assert_eq!(ctx.done().await, DoneReason::Cancelled);
}

#[test]
fn backoff_doubles_from_100ms_and_caps_at_15s() {
    assert_eq!(INITIAL_BACKOFF, Duration::from_millis(100));
    assert_eq!(MAX_BACKOFF, Duration::from_secs(15));

    let mut waits = vec![INITIAL_BACKOFF];
    while waits.len() < 12 {
        waits.push(next_backoff(*waits.last().unwrap()));
    }
    let millis: Vec<u128> = waits.iter().map(Duration::as_millis).collect();
    assert_eq!(
        millis,
        vec![100, 200, 400, 800, 1600, 3200, 6400, 12800, 15000, 15000, 15000, 15000]
    );
}

#[test]
fn backoff_never_drops_below_the_floor() {
    assert_eq!(next_backoff(Duration::ZERO), INITIAL_BACKOFF);
    assert_eq!(next_backoff(Duration::from_millis(1)), INITIAL_BACKOFF);
    assert_eq!(next_backoff(Duration::MAX), MAX_BACKOFF);
}

#[tokio::test]
async fn unrepresentable_timeout_leaves_context_unbounded() {
    let ctx = LockContext::background().with_timeout(Duration::MAX);
    assert_eq!(ctx.deadline(), None);
    assert_eq!(ctx.check(), None);

    let bounded = LockContext::background()
        .with_timeout(Duration::from_secs(1))
        .with_timeout(Duration::MAX);
    assert!(bounded.deadline().is_some());
}
