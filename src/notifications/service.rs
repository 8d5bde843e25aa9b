use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    devices::DeviceRecord,
    notifications::{NotificationPayload, PushTransport, TransportError},
    storage::{DeviceStore, StorageError},
};

/// Title and body of the push sent right after a device subscribes.
pub const CONFIRMATION_TITLE: &str = "Hello, world!";
pub const CONFIRMATION_BODY: &str = "Your push subscription worked!";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The record could not be loaded, so nothing was sent.
    #[error("unreadable device record: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Failed(DispatchFailure),
}

/// Outcome of one delivery attempt to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub device_name: String,
    pub outcome: DispatchOutcome,
}

impl DispatchResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DispatchOutcome::Delivered)
    }

    pub fn failure(&self) -> Option<&DispatchFailure> {
        match &self.outcome {
            DispatchOutcome::Delivered => None,
            DispatchOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Per-device results of a fan-out, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn delivered(&self) -> impl Iterator<Item = &DispatchResult> {
        self.results.iter().filter(|r| r.is_delivered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DispatchResult> {
        self.results.iter().filter(|r| !r.is_delivered())
    }

    pub fn any_delivered(&self) -> bool {
        self.results.iter().any(DispatchResult::is_delivered)
    }

    /// A fan-out succeeds when at least one device got the message, or when
    /// there was nobody to send to.
    pub fn is_success(&self) -> bool {
        self.is_empty() || self.any_delivered()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Sends notifications to stored devices through a [`PushTransport`].
///
/// Holds no state of its own between calls; every fan-out re-reads the store.
/// Each device gets exactly one attempt.
pub struct NotificationDispatcher {
    store: Arc<dyn DeviceStore>,
    transport: Arc<dyn PushTransport>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn DeviceStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    /// Delivers `payload` to one device. Transport failures are returned in the
    /// result, never propagated.
    pub async fn send_one(
        &self,
        record: &DeviceRecord,
        payload: &NotificationPayload,
    ) -> DispatchResult {
        let device_name = record.device_name().to_string();
        debug!(device = %device_name, "Sending push notification");

        let outcome = match self
            .transport
            .send(record.subscription(), record.identity(), payload)
            .await
        {
            Ok(()) => {
                debug!(device = %device_name, "Push notification delivered");
                DispatchOutcome::Delivered
            }
            Err(e) => {
                warn!(
                    device = %device_name,
                    status = ?e.status_code(),
                    "Failed to send push notification: {e}"
                );
                DispatchOutcome::Failed(e.into())
            }
        };

        DispatchResult {
            device_name,
            outcome,
        }
    }

    /// Delivers `payload` to every record yielded by `records`, one at a time.
    ///
    /// A failing device, or an item the store could not load, is recorded and
    /// the fan-out continues. Results keep the order of `records`.
    pub async fn send_to_all<S>(&self, records: S, payload: &NotificationPayload) -> DispatchReport
    where
        S: Stream<Item = Result<DeviceRecord, StorageError>> + Send,
    {
        let mut records = std::pin::pin!(records);
        let mut report = DispatchReport::default();

        while let Some(item) = records.next().await {
            let result = match item {
                Ok(record) => self.send_one(&record, payload).await,
                Err(e) => {
                    warn!(device = %e.key(), "Skipping unreadable device record: {e}");
                    DispatchResult {
                        device_name: e.key().to_string(),
                        outcome: DispatchOutcome::Failed(DispatchFailure::Storage(e.to_string())),
                    }
                }
            };
            report.results.push(result);
        }

        info!(
            total = report.len(),
            delivered = report.delivered().count(),
            "Finished sending push notifications"
        );
        report
    }

    /// Delivers `payload` to every device currently in the store.
    pub async fn broadcast(
        &self,
        payload: &NotificationPayload,
    ) -> Result<DispatchReport, StorageError> {
        let records = self.store.list_all().await?;
        Ok(self.send_to_all(records, payload).await)
    }

    /// Broadcasts a notification carrying only a title and a body.
    pub async fn send_simple(
        &self,
        title: &str,
        body: &str,
    ) -> Result<DispatchReport, StorageError> {
        self.broadcast(&NotificationPayload::new(title, body)).await
    }

    /// Sends the fixed greeting that confirms a new subscription works.
    pub async fn send_confirmation(&self, record: &DeviceRecord) -> DispatchResult {
        let payload = NotificationPayload::new(CONFIRMATION_TITLE, CONFIRMATION_BODY);
        self.send_one(record, &payload).await
    }
}
