use super::widget_config;
use crate::error::SyncError;
use crate::gateway::FetchGateway;
use crate::history::{HistorySample, RollingBuffer};
use crate::polling::{PollOptions, PollingConfig, PollingScheduler, SubscriptionId, WidgetConfig};
use crate::snapshot::SnapshotStore;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Live network speed chart: each poll appends one sample to a rolling
/// buffer held in the widget's store.
pub struct NetworkSpeedWidget {
    store: Arc<SnapshotStore<RollingBuffer<HistorySample>>>,
    gateway: Arc<dyn FetchGateway>,
    endpoint: WidgetConfig,
    empty: RollingBuffer<HistorySample>,
}

impl NetworkSpeedWidget {
    pub const NAME: &'static str = "network_speed";

    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        polling: &PollingConfig,
        capacity: usize,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            store: Arc::new(SnapshotStore::new(Self::NAME)),
            gateway,
            endpoint: widget_config(polling, Self::NAME)?,
            empty: RollingBuffer::new(capacity)?,
        })
    }

    pub fn store(&self) -> &Arc<SnapshotStore<RollingBuffer<HistorySample>>> {
        &self.store
    }

    pub fn start(&self, scheduler: &PollingScheduler, polling: &PollingConfig) -> SubscriptionId {
        let gateway = Arc::clone(&self.gateway);
        let request = self.endpoint.request();
        let empty = self.empty.clone();

        scheduler.subscribe(
            Self::NAME,
            Arc::clone(&self.store),
            PollOptions::for_widget(&self.endpoint, polling),
            move || {
                let gateway = Arc::clone(&gateway);
                let request = request.clone();
                async move { gateway.send(request).await }
            },
            move |previous, response| {
                let sample = sample_from_json(&response.data)?;
                let buffer = previous.unwrap_or(&empty);
                Ok(buffer.push(sample))
            },
        )
    }
}

/// Build a sample from a JSON object: every numeric top-level field becomes
/// a sample field. A `timestamp` string in RFC 3339 form stamps the sample,
/// otherwise the current time is used.
pub fn sample_from_json(data: &Value) -> Result<HistorySample, SyncError> {
    let Value::Object(map) = data else {
        return Err(SyncError::Decode(format!(
            "expected an object for a history sample, got {}",
            data
        )));
    };

    let timestamp = map
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(map
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|n| (k, n)))
        .fold(HistorySample::new(timestamp), |sample, (k, n)| {
            sample.with_field(k.clone(), n)
        }))
}
