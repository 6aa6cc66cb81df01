//! Polling scheduler: periodic fetch-and-merge per subscriber.
//!
//! Each subscription owns a background task and a cancellation token kept
//! in the scheduler's arena. A tick bumps the store's generation, issues the
//! fetch, and merges the response only if no newer tick (or manual refresh)
//! has started in the meantime. Failed fetches mark the snapshot as errored
//! and never stop the schedule.

mod config;

#[cfg(test)]
mod tests;

pub use config::{PollingConfig, RetryPolicy, WidgetConfig};

use crate::error::SyncError;
use crate::gateway::{ApiRequest, FetchGateway};
use crate::snapshot::{FetchApplied, SnapshotStore};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handle identifying one active poll subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll-{}", self.0)
    }
}

/// Timing for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub retry: RetryPolicy,
    pub max_backoff: Duration,
}

impl PollOptions {
    /// Fixed-interval polling with no backoff.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            retry: RetryPolicy::Fixed,
            max_backoff: interval,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy, max_backoff: Duration) -> Self {
        self.retry = retry;
        self.max_backoff = max_backoff;
        self
    }

    /// Options for a configured widget under the shared polling settings.
    pub fn for_widget(widget: &WidgetConfig, polling: &PollingConfig) -> Self {
        Self::every(widget.interval()).with_retry(polling.retry, polling.max_backoff())
    }
}

struct Subscription {
    name: String,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    fence: Box<dyn Fn() + Send + Sync>,
    handle: JoinHandle<()>,
}

/// Owns every active poll subscription and guarantees clean cancellation.
pub struct PollingScheduler {
    subscriptions: DashMap<SubscriptionId, Subscription>,
    next_id: AtomicU64,
    root: CancellationToken,
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    /// Scheduler whose subscriptions all stop when `root` is cancelled.
    pub fn with_cancel(root: CancellationToken) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            root,
        }
    }

    /// Start polling: fetch immediately, then every `options.interval` until
    /// cancelled.
    ///
    /// `fetch` issues the request; `merge` folds its result into the store's
    /// current value. A merge error is treated like a failed fetch.
    pub fn subscribe<T, R, F, Fut, M>(
        &self,
        name: impl Into<String>,
        store: Arc<SnapshotStore<T>>,
        options: PollOptions,
        fetch: F,
        merge: M,
    ) -> SubscriptionId
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, SyncError>> + Send + 'static,
        M: Fn(Option<&T>, R) -> Result<T, SyncError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        let cancel = self.root.child_token();
        let refresh = Arc::new(Notify::new());

        let handle = tokio::spawn(run_poll_loop(
            id,
            name.clone(),
            Arc::clone(&store),
            options,
            cancel.clone(),
            Arc::clone(&refresh),
            Arc::new(fetch),
            Arc::new(merge),
        ));

        let fence_store = store;
        self.subscriptions.insert(
            id,
            Subscription {
                name,
                cancel,
                refresh,
                fence: Box::new(move || fence_store.fence()),
                handle,
            },
        );
        id
    }

    /// Poll one endpoint and decode its payload as the whole snapshot value.
    pub fn subscribe_json<T>(
        &self,
        name: impl Into<String>,
        store: Arc<SnapshotStore<T>>,
        options: PollOptions,
        gateway: Arc<dyn FetchGateway>,
        request: ApiRequest,
    ) -> SubscriptionId
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.subscribe(
            name,
            store,
            options,
            move || {
                let gateway = Arc::clone(&gateway);
                let request = request.clone();
                async move { gateway.send(request).await }
            },
            |_, response| response.json::<T>(),
        )
    }

    /// Stop a subscription. No merge from it happens after this returns,
    /// including for requests already in flight. Cancelling an unknown or
    /// already-cancelled id is a no-op that returns false.
    pub fn cancel(&self, id: SubscriptionId) -> bool {
        let Some((_, sub)) = self.subscriptions.remove(&id) else {
            return false;
        };
        sub.cancel.cancel();
        (sub.fence)();
        tracing::info!(subscription_id = %id, name = %sub.name, "Poll subscription cancelled");
        true
    }

    /// Trigger an immediate out-of-cycle fetch. Any in-flight tick becomes
    /// stale.
    pub fn refresh_now(&self, id: SubscriptionId) -> bool {
        match self.subscriptions.get(&id) {
            Some(sub) => {
                sub.refresh.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.subscriptions
            .get(&id)
            .is_some_and(|s| !s.handle.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Cancel every subscription (teardown sweep).
    pub fn shutdown(&self) {
        let ids: Vec<SubscriptionId> = self.subscriptions.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.cancel(id);
        }
    }
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_poll_loop<T, R, F, Fut, M>(
    id: SubscriptionId,
    name: String,
    store: Arc<SnapshotStore<T>>,
    options: PollOptions,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    fetch: Arc<F>,
    merge: Arc<M>,
) where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, SyncError>> + Send + 'static,
    M: Fn(Option<&T>, R) -> Result<T, SyncError> + Send + Sync + 'static,
{
    let failures = Arc::new(AtomicU32::new(0));

    tracing::info!(
        subscription_id = %id,
        name = %name,
        domain = %store.domain(),
        interval_ms = options.interval.as_millis() as u64,
        "Poll subscription started"
    );

    'ticks: loop {
        let Some(generation) = store.try_begin_fetch(&cancel) else {
            break;
        };
        let started = Instant::now();
        let mut cycle = tokio::spawn(run_cycle(
            Arc::clone(&store),
            generation,
            cancel.clone(),
            fetch(),
            Arc::clone(&merge),
            Arc::clone(&failures),
        ));
        let mut settled = false;
        let mut deadline = started + next_delay(&options, &failures);

        // The delay is recomputed once this tick's own result is counted; a
        // cycle still in flight at the deadline is superseded by the next tick.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'ticks,
                _ = tokio::time::sleep_until(deadline) => break,
                _ = &mut cycle, if !settled => {
                    settled = true;
                    deadline = started + next_delay(&options, &failures);
                }
                _ = refresh.notified() => {
                    tracing::debug!(subscription_id = %id, "Manual refresh requested");
                    break;
                }
            }
        }
    }

    tracing::debug!(subscription_id = %id, name = %name, "Poll loop stopped");
}

fn next_delay(options: &PollOptions, failures: &AtomicU32) -> Duration {
    options.retry.next_delay(
        options.interval,
        failures.load(Ordering::Relaxed),
        options.max_backoff,
    )
}

async fn run_cycle<T, R, Fut, M>(
    store: Arc<SnapshotStore<T>>,
    generation: u64,
    cancel: CancellationToken,
    request: Fut,
    merge: Arc<M>,
    failures: Arc<AtomicU32>,
) where
    T: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, SyncError>> + Send + 'static,
    M: Fn(Option<&T>, R) -> Result<T, SyncError> + Send + Sync + 'static,
{
    let result = tokio::select! {
        _ = cancel.cancelled() => return,
        result = request => result,
    };

    let mut error_detail = None;
    let applied = store.settle_fetch(generation, Some(&cancel), |prev| {
        result.and_then(|r| merge(prev, r)).inspect_err(|e| {
            error_detail = Some(e.clone());
        })
    });

    let outcome = match applied {
        FetchApplied::Ready => {
            failures.store(0, Ordering::Relaxed);
            tracing::debug!(domain = %store.domain(), generation, "Poll merged");
            "ready"
        }
        FetchApplied::Failed => {
            let count = failures.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                domain = %store.domain(),
                generation,
                consecutive_failures = count,
                error = %error_detail.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                "Poll failed"
            );
            "failed"
        }
        FetchApplied::Stale => "stale",
        FetchApplied::Cancelled => "cancelled",
    };

    metrics::counter!(
        "fleetsync_fetch_total",
        "domain" => store.domain().to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
