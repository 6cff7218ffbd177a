use anyhow::Context;
use parkmate_api::{app, AppState};
use parkmate_core::{ClientIdentityResolver, InMemoryStore, KeyValueStore};
use parkmate_notify::{ExponentialBackoff, FixedDelay, NotificationBridge, ReconnectPolicy, WsTransport};
use parkmate_slots::SimulatorSettings;
use parkmate_store::app_config::{Config, NotificationConfig, ReconnectStrategy, StorageBackend};
use parkmate_store::RedisStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parkmate_api=debug,parkmate_slots=debug,parkmate_notify=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting ParkMate preview on port {}", config.server.port);

    let store: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Redis => {
            let url = config
                .storage
                .redis_url
                .as_deref()
                .context("storage.redis_url is required for the redis backend")?;
            Arc::new(RedisStore::new(url).await.context("Failed to connect to Redis")?)
        }
    };

    let client_id = ClientIdentityResolver::new(store.clone())
        .get_or_create()
        .await
        .context("Failed to resolve client identifier")?;
    tracing::info!("Client identifier: {}", client_id);

    let settings = SimulatorSettings {
        default_slot_count: config.simulator.default_slot_count,
        hold: config.simulator.hold(),
    };
    let app_state = AppState::new(store, client_id, settings);

    let notifications = config.notifications.url.as_ref().and_then(|url| {
        let bridge = NotificationBridge::new(
            Arc::new(WsTransport::new(url.clone())),
            Arc::new(app_state.sink()),
            reconnect_policy(&config.notifications),
        );
        bridge.connect(config.notifications.user_id.as_deref())
    });
    if notifications.is_none() {
        tracing::info!("Push notifications disabled");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app(app_state.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    if let Some(handle) = notifications {
        handle.shutdown().await;
    }
    app_state.shutdown().await;
    Ok(())
}

fn reconnect_policy(cfg: &NotificationConfig) -> Arc<dyn ReconnectPolicy> {
    let delay = Duration::from_secs(cfg.reconnect_delay_seconds);
    match cfg.policy {
        ReconnectStrategy::Fixed => Arc::new(FixedDelay::new(delay)),
        ReconnectStrategy::Exponential => Arc::new(ExponentialBackoff::new(
            delay,
            Duration::from_secs(cfg.max_delay_seconds),
        )),
    }
}
