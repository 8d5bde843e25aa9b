pub mod config;
pub mod devices;
pub mod errors;
pub mod notifications;
pub mod storage;

use crate::{
    config::{Config, storage_config},
    notifications::{
        NotificationDispatcher, VapidIdentity, device_handler, devices_handler, notify_handler,
        public_key_handler, subscribe_handler,
    },
};
use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    /// Identity new subscriptions are registered under.
    pub identity: Arc<VapidIdentity>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub confirmation_delay: Duration,
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/subscribe", post(subscribe_handler))
        .route("/notify", post(notify_handler))
        .route("/vapid-public-key", get(public_key_handler))
        .route("/devices", get(devices_handler))
        .route("/devices/{device_name}", get(device_handler))
        .with_state(app_state)
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let identity = config
        .identity
        .identity()
        .context("Failed to set up VAPID identity")?;
    info!(
        subject = %identity.subject(),
        public_key = %identity.public_key(),
        "VAPID identity ready"
    );

    let store = storage_config(&config.store)?;
    let transport = Arc::new(config.transport.transport()?);
    let dispatcher = Arc::new(NotificationDispatcher::new(store, transport));

    let app_state = AppState {
        identity: Arc::new(identity),
        dispatcher,
        confirmation_delay: config.server.confirmation_delay(),
    };

    let addr: SocketAddr = config.server.socket_addr()?;
    info!("Server listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app(app_state)).await?;

    Ok(())
}
