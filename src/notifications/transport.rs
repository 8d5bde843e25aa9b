use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessage,
    WebPushMessageBuilder,
};

use crate::{
    devices::Subscription,
    notifications::{NotificationPayload, VapidIdentity},
};

/// Four weeks, the longest TTL push services are required to honour.
pub const DEFAULT_TTL: u32 = 2_419_200;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("push service responded {status_code}: {response_body}")]
    Rejected {
        status_code: u16,
        response_body: String,
    },

    #[error("push service did not respond in time")]
    Timeout,

    #[error("push request failed: {0}")]
    Request(String),

    #[error("could not build push message: {0}")]
    Encoding(String),
}

impl TransportError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Rejected { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Delivers one encrypted, VAPID-signed message to one subscription.
///
/// Implementations own their network timeout; a timeout is reported as an
/// ordinary error.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        subscription: &Subscription,
        identity: &VapidIdentity,
        payload: &NotificationPayload,
    ) -> Result<(), TransportError>;
}

/// Encrypts with `web_push` (aes128gcm) and posts the message with `reqwest`.
pub struct WebPushTransport {
    client: reqwest::Client,
    ttl: u32,
}

impl WebPushTransport {
    pub fn new(timeout: Duration, ttl: u32) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client, ttl })
    }

    fn build_message(
        &self,
        subscription: &Subscription,
        identity: &VapidIdentity,
        content: &[u8],
    ) -> Result<WebPushMessage, TransportError> {
        let encoding = |e: web_push::WebPushError| TransportError::Encoding(e.to_string());

        let info = SubscriptionInfo::new(
            subscription.endpoint(),
            subscription.keys().p256dh(),
            subscription.keys().auth(),
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(identity.private_key(), &info).map_err(encoding)?;
        signature.add_claim("sub", identity.subject());
        let signature = signature.build().map_err(encoding)?;

        let mut message = WebPushMessageBuilder::new(&info);
        message.set_ttl(self.ttl);
        message.set_vapid_signature(signature);
        message.set_payload(ContentEncoding::Aes128Gcm, content);
        message.build().map_err(encoding)
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        subscription: &Subscription,
        identity: &VapidIdentity,
        payload: &NotificationPayload,
    ) -> Result<(), TransportError> {
        let content = payload
            .to_bytes()
            .map_err(|e| TransportError::Encoding(e.to_string()))?;
        let message = self.build_message(subscription, identity, &content)?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());
        if let Some(payload) = message.payload {
            request = request
                .header(CONTENT_ENCODING, "aes128gcm")
                .header(CONTENT_TYPE, "application/octet-stream");
            for (name, value) in payload.crypto_headers {
                request = request.header(name, value);
            }
            request = request.body(payload.content);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %subscription.endpoint(), status = %status, "Push accepted");
            return Ok(());
        }

        let response_body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(TransportError::Timeout),
            Err(_) => String::new(),
        };
        Err(TransportError::Rejected {
            status_code: status.as_u16(),
            response_body,
        })
    }
}
