use super::widget_config;
use crate::error::SyncError;
use crate::gateway::{ApiRequest, FetchGateway};
use crate::polling::{PollOptions, PollingConfig, PollingScheduler, SubscriptionId, WidgetConfig};
use crate::push::{DetachHandle, MergeRegistry, PushChannel, PushEvent};
use crate::snapshot::{FetchApplied, SnapshotStore};
use futures::Stream;
use serde_json::Value;
use std::sync::Arc;

/// Overview page: stats, traffic totals and traffic by type, each held in
/// its own store so one failing endpoint leaves the others intact.
pub struct DashboardWidgets {
    pub stats: Arc<SnapshotStore<Value>>,
    pub traffic: Arc<SnapshotStore<Value>>,
    pub traffic_by_type: Arc<SnapshotStore<Value>>,
    gateway: Arc<dyn FetchGateway>,
    endpoints: [WidgetConfig; 3],
}

impl DashboardWidgets {
    pub const STATS: &'static str = "dashboard";
    pub const TRAFFIC: &'static str = "traffic_stats";
    pub const TRAFFIC_BY_TYPE: &'static str = "traffic_by_type";
    /// Push event type carrying partial stats updates
    pub const UPDATE_EVENT: &'static str = "dashboard_update";

    pub fn new(gateway: Arc<dyn FetchGateway>, polling: &PollingConfig) -> Result<Self, SyncError> {
        Ok(Self {
            stats: Arc::new(SnapshotStore::new(Self::STATS)),
            traffic: Arc::new(SnapshotStore::new(Self::TRAFFIC)),
            traffic_by_type: Arc::new(SnapshotStore::new(Self::TRAFFIC_BY_TYPE)),
            gateway,
            endpoints: [
                widget_config(polling, Self::STATS)?,
                widget_config(polling, Self::TRAFFIC)?,
                widget_config(polling, Self::TRAFFIC_BY_TYPE)?,
            ],
        })
    }

    fn stores(&self) -> [&Arc<SnapshotStore<Value>>; 3] {
        [&self.stats, &self.traffic, &self.traffic_by_type]
    }

    /// Fetch all three endpoints concurrently. Each store settles as soon as
    /// its own response arrives.
    pub async fn refresh(&self) -> [FetchApplied; 3] {
        let [stats, traffic, by_type] = self.stores();
        let [a, b, c] = &self.endpoints;
        let gateway = self.gateway.as_ref();
        let (x, y, z) = tokio::join!(
            fetch_into(gateway, stats, a.request()),
            fetch_into(gateway, traffic, b.request()),
            fetch_into(gateway, by_type, c.request()),
        );
        [x, y, z]
    }

    /// Poll every endpoint on its configured interval.
    pub fn start(&self, scheduler: &PollingScheduler, polling: &PollingConfig) -> Vec<SubscriptionId> {
        self.stores()
            .into_iter()
            .zip(self.endpoints.iter())
            .map(|(store, endpoint)| {
                scheduler.subscribe_json(
                    endpoint.name.clone(),
                    Arc::clone(store),
                    PollOptions::for_widget(endpoint, polling),
                    Arc::clone(&self.gateway),
                    endpoint.request(),
                )
            })
            .collect()
    }

    /// Merge `dashboard_update` events into the stats snapshot.
    pub fn attach_push<S>(&self, events: S) -> DetachHandle
    where
        S: Stream<Item = PushEvent> + Send + 'static,
    {
        let registry = MergeRegistry::<Value>::new().on_shallow_merge(Self::UPDATE_EVENT);
        PushChannel::attach(events, Arc::clone(&self.stats), registry)
    }
}

async fn fetch_into(
    gateway: &dyn FetchGateway,
    store: &SnapshotStore<Value>,
    request: ApiRequest,
) -> FetchApplied {
    let generation = store.begin_fetch();
    let result = gateway.send(request).await.map(|response| response.data);
    if let Err(e) = &result {
        tracing::warn!(domain = %store.domain(), error = %e, "Dashboard fetch failed");
    }
    store.complete_fetch(generation, result)
}
