//! Watch command implementation

use crate::cli::{ConnectionArgs, WatchArgs};
use crate::config::{FleetSyncConfig, LogFormat};
use crate::gateway::{FetchGateway, HttpGateway};
use crate::logging::snapshot_summary;
use crate::polling::PollingScheduler;
use crate::push::{broadcast_stream, json_lines, DetachHandle, PushEvent};
use crate::snapshot::SnapshotStore;
use crate::widgets::{DashboardWidgets, NetworkSpeedWidget, NotificationCenter};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Widget groups selectable with `--widget`
pub const WIDGET_GROUPS: [&str; 3] = [
    DashboardWidgets::STATS,
    NetworkSpeedWidget::NAME,
    NotificationCenter::NAME,
];

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ConnectionArgs,
) -> Result<FleetSyncConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        FleetSyncConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        FleetSyncConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(ref url) = args.api_url {
        config.api.base_url = url.clone();
    }

    Ok(config)
}

/// Build the HTTP gateway for the configured backend
pub fn build_gateway(
    config: &FleetSyncConfig,
) -> Result<Arc<dyn FetchGateway>, Box<dyn std::error::Error>> {
    Ok(Arc::new(HttpGateway::new(&config.api)?))
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Log every transition of `store`.
fn log_transitions<T>(store: &SnapshotStore<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let domain = store.domain().to_string();
    store.subscribe(move |snapshot| {
        tracing::info!(domain = %domain, state = %snapshot_summary(snapshot), "Snapshot changed");
    });
}

/// Check `--widget` names against the known groups.
pub fn selected_groups(requested: &[String]) -> Result<Vec<&'static str>, Box<dyn std::error::Error>> {
    if requested.is_empty() {
        return Ok(WIDGET_GROUPS.to_vec());
    }
    requested
        .iter()
        .map(|name| {
            WIDGET_GROUPS
                .iter()
                .find(|g| **g == name.as_str())
                .copied()
                .ok_or_else(|| {
                    Box::<dyn std::error::Error>::from(format!(
                        "Unknown widget: {}. Use: {}",
                        name,
                        WIDGET_GROUPS.join(", ")
                    ))
                })
        })
        .collect()
}

/// Main watch command handler
pub async fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let mut config = load_config_with_overrides(&args.connection)?;
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    config.validate()?;
    let groups = selected_groups(&args.widgets)?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;
    tracing::info!(api = %config.api.base_url, widgets = ?groups, "Starting fleetsync watch");

    // 3. Widgets and their poll subscriptions
    let gateway = build_gateway(&config)?;
    let cancel_token = CancellationToken::new();
    let scheduler = PollingScheduler::with_cancel(cancel_token.child_token());

    let dashboard = if groups.contains(&DashboardWidgets::STATS) {
        let widgets = DashboardWidgets::new(Arc::clone(&gateway), &config.polling)?;
        log_transitions(&widgets.stats);
        log_transitions(&widgets.traffic);
        log_transitions(&widgets.traffic_by_type);
        widgets.start(&scheduler, &config.polling);
        Some(widgets)
    } else {
        None
    };

    let network = if groups.contains(&NetworkSpeedWidget::NAME) {
        let widget = NetworkSpeedWidget::new(
            Arc::clone(&gateway),
            &config.polling,
            config.history.capacity,
        )?;
        log_transitions(widget.store());
        widget.start(&scheduler, &config.polling);
        Some(widget)
    } else {
        None
    };

    let notifications = if groups.contains(&NotificationCenter::NAME) {
        let center = NotificationCenter::new(Arc::clone(&gateway), &config.polling)?;
        log_transitions(center.store());
        center.start(&scheduler, &config.polling);
        Some(center)
    } else {
        None
    };

    // 4. Push events from stdin, shared by every push-aware widget
    let mut detach_handles: Vec<DetachHandle> = Vec::new();
    if args.events_stdin {
        let (tx, _) = broadcast::channel::<PushEvent>(256);
        if let Some(widgets) = &dashboard {
            detach_handles.push(widgets.attach_push(broadcast_stream(tx.subscribe())));
        }
        if let Some(center) = &notifications {
            detach_handles.push(center.attach_push(broadcast_stream(tx.subscribe())));
        }

        tokio::spawn(async move {
            let mut events = Box::pin(json_lines(BufReader::new(tokio::io::stdin())));
            while let Some(event) = events.next().await {
                // No attached consumer is not an error
                let _ = tx.send(event);
            }
            tracing::debug!("Push event input closed");
        });
    }

    // 5. Run until a signal or the requested duration elapses
    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = shutdown_signal(cancel_token.clone()) => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "Watch duration elapsed");
                }
            }
        }
        None => shutdown_signal(cancel_token.clone()).await,
    }

    // 6. Teardown: no source may write after this point
    for handle in &detach_handles {
        handle.detach();
    }
    scheduler.shutdown();
    cancel_token.cancel();

    if let Some(center) = &notifications {
        tracing::info!(unread = center.unread_count(), "Notifications at shutdown");
    }
    drop((dashboard, network, notifications));

    tracing::info!("fleetsync watch stopped");
    Ok(())
}
