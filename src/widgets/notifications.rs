use super::widget_config;
use crate::error::SyncError;
use crate::gateway::{ApiRequest, FetchGateway};
use crate::mutation::{MutationHandle, OptimisticCoordinator};
use crate::polling::{PollOptions, PollingConfig, PollingScheduler, SubscriptionId, WidgetConfig};
use crate::push::{DetachHandle, MergeRegistry, PushChannel, PushEvent};
use crate::snapshot::{Identified, SnapshotStore};
use futures::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// One entry in the notification center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default, alias = "is_read")]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "notification id must be a string or number, got {}",
            other
        ))),
    }
}

impl Identified for Notification {
    fn entity_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NotificationList {
    Bare(Vec<Notification>),
    Wrapped { notifications: Vec<Notification> },
}

/// Decode a notification list, bare or wrapped in `{"notifications": [...]}`.
pub(crate) fn decode_notifications(data: Value) -> Result<Vec<Notification>, SyncError> {
    Ok(match serde_json::from_value(data)? {
        NotificationList::Bare(items) | NotificationList::Wrapped { notifications: items } => items,
    })
}

/// Newest-first notification list fed by polling and by `notification`
/// push events, with optimistic mark-as-read.
pub struct NotificationCenter {
    store: Arc<SnapshotStore<Vec<Notification>>>,
    coordinator: OptimisticCoordinator<Vec<Notification>>,
    gateway: Arc<dyn FetchGateway>,
    endpoint: WidgetConfig,
}

impl NotificationCenter {
    pub const NAME: &'static str = "notifications";
    pub const PUSH_EVENT: &'static str = "notification";

    pub fn new(gateway: Arc<dyn FetchGateway>, polling: &PollingConfig) -> Result<Self, SyncError> {
        let store = Arc::new(SnapshotStore::new(Self::NAME));
        Ok(Self {
            coordinator: OptimisticCoordinator::new(Arc::clone(&store)),
            store,
            gateway,
            endpoint: widget_config(polling, Self::NAME)?,
        })
    }

    pub fn store(&self) -> &Arc<SnapshotStore<Vec<Notification>>> {
        &self.store
    }

    pub fn start(&self, scheduler: &PollingScheduler, polling: &PollingConfig) -> SubscriptionId {
        let gateway = Arc::clone(&self.gateway);
        let request = self.endpoint.request();
        scheduler.subscribe(
            Self::NAME,
            Arc::clone(&self.store),
            PollOptions::for_widget(&self.endpoint, polling),
            move || {
                let gateway = Arc::clone(&gateway);
                let request = request.clone();
                async move { gateway.send(request).await }
            },
            |_, response| decode_notifications(response.data),
        )
    }

    /// Prepend notifications delivered as push events. An event for an id
    /// already listed replaces that entry in place.
    pub fn attach_push<S>(&self, events: S) -> DetachHandle
    where
        S: Stream<Item = PushEvent> + Send + 'static,
    {
        let registry = MergeRegistry::<Vec<Notification>>::new().on(Self::PUSH_EVENT, prepend_notification);
        PushChannel::attach(events, Arc::clone(&self.store), registry)
    }

    pub fn unread_count(&self) -> usize {
        self.store
            .value()
            .map(|items| items.iter().filter(|n| !n.read).count())
            .unwrap_or(0)
    }

    /// Mark one notification read immediately; rolled back if the server
    /// rejects it.
    pub fn mark_read(&self, id: &str) -> Result<MutationHandle<Notification>, SyncError> {
        let current = self
            .store
            .entity(id)
            .ok_or_else(|| SyncError::EntityNotFound(id.to_string()))?;
        let updated = Notification {
            read: true,
            ..current
        };

        let gateway = Arc::clone(&self.gateway);
        let request = ApiRequest::post(format!("{}/{}/read", self.endpoint.path, id), json!({}));
        self.coordinator.apply_optimistic(id, Some(updated), async move {
            let response = gateway.send(request).await?;
            // Only a full notification body counts as an echo.
            Ok(serde_json::from_value::<Notification>(response.data).ok())
        })
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.coordinator.is_pending(id)
    }
}

fn prepend_notification(
    value: &mut Option<Vec<Notification>>,
    data: &Value,
) -> Result<bool, SyncError> {
    let incoming: Notification = serde_json::from_value(data.clone())?;
    let items = value.get_or_insert_with(Vec::new);
    match items.iter().position(|n| n.id == incoming.id) {
        Some(i) if items[i] == incoming => return Ok(false),
        Some(i) => items[i] = incoming,
        None => items.insert(0, incoming),
    }
    Ok(true)
}
