use serde::{Deserialize, Serialize};

use crate::notifications::VapidIdentity;

/// Client-side encryption material from a `PushSubscription`.
///
/// Opaque here; handed to the transport unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    p256dh: String,
    auth: String,
}

impl SubscriptionKeys {
    pub fn new(p256dh: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            p256dh: p256dh.into(),
            auth: auth.into(),
        }
    }

    pub fn p256dh(&self) -> &str {
        &self.p256dh
    }

    pub fn auth(&self) -> &str {
        &self.auth
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    endpoint: String,
    keys: SubscriptionKeys,
}

impl Subscription {
    pub fn new(endpoint: impl Into<String>, keys: SubscriptionKeys) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn keys(&self) -> &SubscriptionKeys {
        &self.keys
    }
}

/// A registered device: where to deliver, and under which sender identity.
///
/// The serialized field names match the device files written by earlier
/// releases, so `identity` is stored under `config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    device_name: String,
    #[serde(rename = "config")]
    identity: VapidIdentity,
    subscription: Subscription,
}

impl DeviceRecord {
    pub fn new(
        device_name: impl Into<String>,
        identity: VapidIdentity,
        subscription: Subscription,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            identity,
            subscription,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn identity(&self) -> &VapidIdentity {
        &self.identity
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

/// Longest device name, in bytes, that still fits a `<name>.json` file name
/// within the common 255-byte limit.
pub const MAX_DEVICE_NAME_LEN: usize = 250;

/// Whether `name` can be used as a storage key.
///
/// Names become file stems, so anything that could escape the devices
/// directory, or would be hidden from a directory scan, is refused.
pub fn is_valid_device_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_DEVICE_NAME_LEN
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_names_cannot_escape_the_store() {
        assert!(is_valid_device_name("phone"));
        assert!(is_valid_device_name("Pixel 8 (work)"));
        assert!(!is_valid_device_name(""));
        assert!(!is_valid_device_name(".."));
        assert!(!is_valid_device_name(".hidden"));
        assert!(!is_valid_device_name("../etc/passwd"));
        assert!(!is_valid_device_name("a\\b"));
        assert!(is_valid_device_name(&"n".repeat(MAX_DEVICE_NAME_LEN)));
        assert!(!is_valid_device_name(&"n".repeat(MAX_DEVICE_NAME_LEN + 1)));
    }
}
