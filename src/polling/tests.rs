//! Unit tests for the polling scheduler, driven by paused tokio time.

use super::*;
use crate::snapshot::SnapshotStatus;
use std::sync::Mutex;
use tokio::time::sleep;

/// Fetcher whose n-th call resolves to `n` after the scripted delay.
fn scripted_fetch(
    delays_ms: Vec<u64>,
    calls: Arc<AtomicU32>,
) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, SyncError>> + Send>>
       + Send
       + Sync
       + 'static {
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = delays_ms
            .get((n - 1) as usize)
            .copied()
            .unwrap_or(10);
        Box::pin(async move {
            sleep(Duration::from_millis(delay)).await;
            Ok(n)
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_fetches_immediately() {
    let scheduler = PollingScheduler::new();
    let store = Arc::new(SnapshotStore::new("dashboard"));
    let calls = Arc::new(AtomicU32::new(0));

    scheduler.subscribe(
        "dashboard",
        Arc::clone(&store),
        PollOptions::every(Duration::from_secs(30)),
        scripted_fetch(vec![5], Arc::clone(&calls)),
        |_, n| Ok(n),
    );

    sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snap = store.current();
    assert_eq!(snap.value, Some(1));
    assert_eq!(snap.status, SnapshotStatus::Ready);
    assert_eq!(snap.generation, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_at_interval() {
    let scheduler = PollingScheduler::new();
    let store = Arc::new(SnapshotStore::new("speed"));
    let calls = Arc::new(AtomicU32::new(0));

    scheduler.subscribe(
        "speed",
        Arc::clone(&store),
        PollOptions::every(Duration::from_millis(1000)),
        scripted_fetch(vec![], Arc::clone(&calls)),
        |_, n| Ok(n),
    );

    sleep(Duration::from_millis(3500)).await;
    // t=0, 1000, 2000, 3000
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(store.value(), Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_cycles_only_newest_merges() {
    let scheduler = PollingScheduler::new();
    let store = Arc::new(SnapshotStore::new("traffic"));
    let calls = Arc::new(AtomicU32::new(0));
    let merged = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&merged);

    // Cycle 1 takes 1500ms and so finishes after cycle 2 (started at 1000ms,
    // takes 100ms).
    scheduler.subscribe(
        "traffic",
        Arc::clone(&store),
        PollOptions::every(Duration::from_millis(1000)),
        scripted_fetch(vec![1500, 100, 5000], Arc::clone(&calls)),
        move |_, n| {
            sink.lock().unwrap().push(n);
            Ok(n)
        },
    );

    sleep(Duration::from_millis(1700)).await;
    assert_eq!(*merged.lock().unwrap(), vec![2]);
    assert_eq!(store.value(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_failure_sets_error_and_schedule_continues() {
    let scheduler = PollingScheduler::new();
    let store = Arc::new(SnapshotStore::new("dashboard"));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    scheduler.subscribe(
        "dashboard",
        Arc::clone(&store),
        PollOptions::every(Duration::from_millis(1000)),
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 2 {
                    Err(SyncError::Network("connection reset".into()))
                } else {
                    Ok(n)
                }
            }
        },
        |_, n| Ok(n),
    );

    sleep(Duration::from_millis(1500)).await;
    let snap = store.current();
    assert_eq!(snap.status, SnapshotStatus::Error);
    assert_eq!(snap.value, Some(1));
    assert_eq!(snap.error, Some(SyncError::Network("connection reset".into())));

    sleep(Duration::from_millis(1000)).await;
    let snap = store.current();
    assert_eq!(snap.status, SnapshotStatus::Ready);
    assert_eq!(snap.value, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_spaces_retries() {
    let scheduler = PollingScheduler::new();
    let store: Arc<SnapshotStore<u32>> = Arc::new(SnapshotStore::new("dashboard"));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    scheduler.subscribe(
        "dashboard",
        Arc::clone(&store),
        PollOptions::every(Duration::from_millis(1000))
            .with_retry(RetryPolicy::Exponential, Duration::from_millis(4000)),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(SyncError::Http { status: 503, detail: "down".into() }) }
        },
        |_, n| Ok(n),
    );

    // Each failure counts toward its own delay: ticks at t=0, 2000, 6000, 10000
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_resets_after_success() {
    let scheduler = PollingScheduler::new();
    let store: Arc<SnapshotStore<u32>> = Arc::new(SnapshotStore::new("dashboard"));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    scheduler.subscribe(
        "dashboard",
        Arc::clone(&store),
        PollOptions::every(Duration::from_millis(1000))
            .with_retry(RetryPolicy::Exponential, Duration::from_millis(8000)),
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(SyncError::Network("connection reset".into()))
                } else {
                    Ok(n)
                }
            }
        },
        |_, n| Ok(n),
    );

    // Failure at t=0 delays the retry to t=2000; its success restores the
    // one second interval right away
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.value(), Some(2));
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_listener_cancels_own_subscription_on_auth_expiry() {
    let scheduler = Arc::new(PollingScheduler::new());
    let store: Arc<SnapshotStore<u32>> = Arc::new(SnapshotStore::new("dashboard"));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

    let (teardown, pending_id) = (Arc::clone(&scheduler), Arc::clone(&slot));
    store.subscribe(move |snap| {
        if snap.error.as_ref().is_some_and(SyncError::is_auth_expired) {
            if let Some(id) = pending_id.lock().unwrap().take() {
                assert!(teardown.cancel(id));
            }
        }
    });

    let id = scheduler.subscribe(
        "dashboard",
        Arc::clone(&store),
        PollOptions::every(Duration::from_millis(1000)),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(SyncError::AuthExpired) }
        },
        |_, n| Ok(n),
    );
    *slot.lock().unwrap() = Some(id);

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.active_count(), 0);
    assert!(slot.lock().unwrap().is_none());
    assert_eq!(store.current().error, Some(SyncError::AuthExpired));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_blocks_in_flight_response() {
    let scheduler = PollingScheduler::new();
    let store = Arc::new(SnapshotStore::new("dashboard"));
    let calls = Arc::new(AtomicU32::new(0));

    let id = scheduler.subscribe(
        "dashboard",
        Arc::clone(&store),
        PollOptions::every(Duration::from_secs(10)),
        scripted_fetch(vec![500], Arc::clone(&calls)),
        |_, n| Ok(n),
    );

    sleep(Duration::from_millis(100)).await;
    assert!(scheduler.cancel(id));
    sleep(Duration::from_secs(30)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.value().is_none());
    assert_eq!(scheduler.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let scheduler = PollingScheduler::new();
    let store: Arc<SnapshotStore<u32>> = Arc::new(SnapshotStore::new("d"));
    let id = scheduler.subscribe(
        "d",
        store,
        PollOptions::every(Duration::from_secs(1)),
        || async { Ok(1u32) },
        |_, n| Ok(n),
    );

    assert!(scheduler.cancel(id));
    assert!(!scheduler.cancel(id));
    assert!(!scheduler.cancel(id));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now_supersedes_in_flight_tick() {
    let scheduler = PollingScheduler::new();
    let store = Arc::new(SnapshotStore::new("users"));
    let calls = Arc::new(AtomicU32::new(0));

    let id = scheduler.subscribe(
        "users",
        Arc::clone(&store),
        PollOptions::every(Duration::from_secs(60)),
        scripted_fetch(vec![1000, 50], Arc::clone(&calls)),
        |_, n| Ok(n),
    );

    sleep(Duration::from_millis(100)).await;
    assert!(scheduler.refresh_now(id));
    sleep(Duration::from_millis(2000)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.value(), Some(2));
    assert_eq!(store.generation(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_all() {
    let scheduler = PollingScheduler::new();
    for name in ["a", "b", "c"] {
        let store: Arc<SnapshotStore<u32>> = Arc::new(SnapshotStore::new(name));
        scheduler.subscribe(
            name,
            store,
            PollOptions::every(Duration::from_secs(1)),
            || async { Ok(1u32) },
            |_, n| Ok(n),
        );
    }
    assert_eq!(scheduler.active_count(), 3);
    scheduler.shutdown();
    assert_eq!(scheduler.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_merge_error_counts_as_failure() {
    let scheduler = PollingScheduler::new();
    let store: Arc<SnapshotStore<u32>> = Arc::new(SnapshotStore::new("d"));
    scheduler.subscribe(
        "d",
        Arc::clone(&store),
        PollOptions::every(Duration::from_secs(5)),
        || async { Ok("not a number".to_string()) },
        |_, s: String| s.parse::<u32>().map_err(|e| SyncError::Decode(e.to_string())),
    );

    sleep(Duration::from_millis(10)).await;
    assert_eq!(store.current().status, SnapshotStatus::Error);
}
