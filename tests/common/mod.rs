#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;
use webpush_relay::{
    AppState, app,
    devices::{DeviceRecord, Subscription, SubscriptionKeys},
    notifications::{
        NotificationDispatcher, NotificationPayload, PushTransport, TransportError, VapidIdentity,
    },
    storage::DeviceStore,
};

pub const SUBJECT: &str = "ops@example.com";

pub fn identity() -> VapidIdentity {
    VapidIdentity::generate(SUBJECT).expect("Failed to generate identity")
}

pub fn endpoint_for(device_name: &str) -> String {
    format!("https://push.example.net/wpush/v2/{device_name}")
}

pub fn subscription(device_name: &str) -> Subscription {
    Subscription::new(
        endpoint_for(device_name),
        SubscriptionKeys::new(
            "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM",
            "tBHItJI5svbpez7KI4CCXg",
        ),
    )
}

pub fn record(device_name: &str, identity: &VapidIdentity) -> DeviceRecord {
    DeviceRecord::new(device_name, identity.clone(), subscription(device_name))
}

/// A delivery seen by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct SentPush {
    pub endpoint: String,
    pub subject: String,
    pub payload: serde_json::Value,
}

/// Records every send; fails for endpoints registered with `fail_for`.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentPush>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, device_name: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(endpoint_for(device_name));
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(
        &self,
        subscription: &Subscription,
        identity: &VapidIdentity,
        payload: &NotificationPayload,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(SentPush {
            endpoint: subscription.endpoint().to_string(),
            subject: identity.subject().to_string(),
            payload: serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap(),
        });

        if self.failing.lock().unwrap().contains(subscription.endpoint()) {
            return Err(TransportError::Rejected {
                status_code: 410,
                response_body: "push subscription has unsubscribed or expired".to_string(),
            });
        }
        Ok(())
    }
}

/// Always times out, as a transport with an unreachable push service would.
pub struct TimeoutTransport;

#[async_trait]
impl PushTransport for TimeoutTransport {
    async fn send(
        &self,
        _subscription: &Subscription,
        _identity: &VapidIdentity,
        _payload: &NotificationPayload,
    ) -> Result<(), TransportError> {
        Err(TransportError::Timeout)
    }
}

pub struct TestApp {
    pub address: String,
    pub identity: VapidIdentity,
    pub store: Arc<dyn DeviceStore>,
    pub transport: Arc<RecordingTransport>,
}

pub async fn spawn_app(store: Arc<dyn DeviceStore>) -> TestApp {
    // Bind to port 0 to let the OS assign a random available port.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let identity = identity();
    let transport = RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store.clone(), transport.clone());

    let app_state = AppState {
        identity: Arc::new(identity.clone()),
        dispatcher: Arc::new(dispatcher),
        confirmation_delay: Duration::ZERO,
    };

    let app = app(app_state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        identity,
        store,
        transport,
    }
}
