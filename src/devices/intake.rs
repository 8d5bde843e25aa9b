use serde::Deserialize;
use thiserror::Error;

use crate::{
    devices::{DeviceRecord, Subscription, SubscriptionKeys, is_valid_device_name},
    notifications::VapidIdentity,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid device name {0:?}")]
    InvalidDeviceName(String),
}

/// Body of a subscribe request: the browser's `PushSubscription` plus a name.
///
/// Every field is optional at the serde level so that a missing field is
/// reported by name instead of as a generic decode failure.
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    pub device_name: Option<String>,
    pub endpoint: Option<String>,
    pub keys: Option<SubscribeKeys>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeKeys {
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

impl SubscribeRequest {
    /// Validates the request and binds it to the sender identity.
    pub fn into_record(self, identity: &VapidIdentity) -> Result<DeviceRecord, IntakeError> {
        let device_name = required(self.device_name, "device_name")?;
        if !is_valid_device_name(&device_name) {
            return Err(IntakeError::InvalidDeviceName(device_name));
        }
        let endpoint = required(self.endpoint, "endpoint")?;
        let keys = self.keys.unwrap_or_default();
        let p256dh = required(keys.p256dh, "keys.p256dh")?;
        let auth = required(keys.auth, "keys.auth")?;

        Ok(DeviceRecord::new(
            device_name,
            identity.clone(),
            Subscription::new(endpoint, SubscriptionKeys::new(p256dh, auth)),
        ))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, IntakeError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(IntakeError::MissingField(field))
}
