//! Dashboard fan-out against a mock backend: three endpoints fetched
//! together, each settling into its own snapshot.

mod common;

use common::{gateway_for, settled, wait_for};
use fleetsync::config::PollingConfig;
use fleetsync::polling::PollingScheduler;
use fleetsync::push::{broadcast_stream, PushEvent};
use fleetsync::snapshot::SnapshotStatus;
use fleetsync::widgets::DashboardWidgets;
use fleetsync::SyncError;
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_dashboard(server: &MockServer, traffic_status: u16) {
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active_users": 12,
            "total_traffic_gb": 340.5
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/traffic-stats"))
        .and(query_param("days", "7"))
        .respond_with(
            ResponseTemplate::new(traffic_status)
                .set_body_json(json!({"detail": "statistics backend unavailable"})),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/traffic-by-type"))
        .and(query_param("days", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "wireguard", "bytes": 1200},
            {"type": "openvpn", "bytes": 300}
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failing_traffic_stats_errors_only_its_snapshot() {
    let server = MockServer::start().await;
    mount_dashboard(&server, 500).await;

    let widgets = DashboardWidgets::new(gateway_for(&server), &PollingConfig::default()).unwrap();
    widgets.refresh().await;

    let stats = widgets.stats.current();
    assert_eq!(stats.status, SnapshotStatus::Ready);
    assert_eq!(stats.value.unwrap()["active_users"], json!(12));

    let traffic = widgets.traffic.current();
    assert_eq!(traffic.status, SnapshotStatus::Error);
    assert_eq!(
        traffic.error,
        Some(SyncError::Http {
            status: 500,
            detail: "statistics backend unavailable".into()
        })
    );

    let by_type = widgets.traffic_by_type.current();
    assert_eq!(by_type.status, SnapshotStatus::Ready);
    assert_eq!(by_type.value.unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_scheduled_polls_fan_out_concurrently() {
    let server = MockServer::start().await;
    mount_dashboard(&server, 500).await;

    let polling = PollingConfig::default();
    let widgets = DashboardWidgets::new(gateway_for(&server), &polling).unwrap();
    let scheduler = PollingScheduler::new();
    let ids = widgets.start(&scheduler, &polling);
    assert_eq!(ids.len(), 3);

    let timeout = Duration::from_secs(5);
    assert_eq!(
        wait_for(&widgets.stats, timeout, settled).await.status,
        SnapshotStatus::Ready
    );
    assert_eq!(
        wait_for(&widgets.traffic, timeout, settled).await.status,
        SnapshotStatus::Error
    );
    assert_eq!(
        wait_for(&widgets.traffic_by_type, timeout, settled).await.status,
        SnapshotStatus::Ready
    );

    scheduler.shutdown();
    assert_eq!(scheduler.active_count(), 0);
}

#[tokio::test]
async fn test_push_update_merges_after_poll() {
    let server = MockServer::start().await;
    mount_dashboard(&server, 200).await;

    let widgets = DashboardWidgets::new(gateway_for(&server), &PollingConfig::default()).unwrap();
    widgets.refresh().await;
    let generation = widgets.stats.generation();

    let (tx, _) = broadcast::channel(16);
    let handle = widgets.attach_push(broadcast_stream(tx.subscribe()));
    tx.send(PushEvent::new(
        DashboardWidgets::UPDATE_EVENT,
        json!({"active_users": 13}),
    ))
    .unwrap();
    drop(tx);
    handle.finished().await;

    let stats = widgets.stats.current();
    assert_eq!(
        stats.value,
        Some(json!({"active_users": 13, "total_traffic_gb": 340.5}))
    );
    assert_eq!(stats.generation, generation);
}
