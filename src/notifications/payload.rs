use clap::Args;
use serde::{Deserialize, Serialize};

/// The JSON document a service worker receives in its `push` event.
///
/// Optional fields that are unset, empty or `false` are left out of the
/// encoded object entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    title: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    renotify: bool,
    #[serde(skip_serializing_if = "is_false")]
    require_interaction: bool,
    #[serde(rename = "navigate", skip_serializing_if = "Option::is_none")]
    navigate_url: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    Some(value.into()).filter(|v| !v.is_empty())
}

impl NotificationPayload {
    /// `title` and `body` are always encoded, even when empty.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Small (64x64) icon URL.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = non_empty(icon);
        self
    }

    /// Hero image URL.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = non_empty(image);
        self
    }

    /// Notifications sharing a tag replace each other on the client.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = non_empty(tag);
        self
    }

    /// Alert again even when replacing a notification with the same tag.
    pub fn with_renotify(mut self, renotify: bool) -> Self {
        self.renotify = renotify;
        self
    }

    pub fn with_require_interaction(mut self, require_interaction: bool) -> Self {
        self.require_interaction = require_interaction;
        self
    }

    /// Page opened when the notification is clicked.
    pub fn with_navigate_url(mut self, url: impl Into<String>) -> Self {
        self.navigate_url = non_empty(url);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Notification fields as accepted from the command line and from
/// `POST /notify`.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    /// Notification title
    #[arg(long)]
    pub title: String,

    /// Notification body text
    #[arg(long)]
    pub body: String,

    /// Icon URL (64x64)
    #[arg(long)]
    #[serde(default)]
    pub icon: Option<String>,

    /// Hero image URL
    #[arg(long)]
    #[serde(default)]
    pub image: Option<String>,

    /// Replace earlier notifications carrying the same tag
    #[arg(long)]
    #[serde(default)]
    pub tag: Option<String>,

    /// Alert again when replacing a tagged notification
    #[arg(long)]
    #[serde(default)]
    pub renotify: bool,

    /// Keep the notification open until the user interacts with it
    #[arg(long)]
    #[serde(default)]
    pub require_interaction: bool,

    /// URL to open when the notification is clicked
    #[arg(long = "navigate")]
    #[serde(default, rename = "navigate")]
    pub navigate_url: Option<String>,
}

impl NotificationRequest {
    pub fn into_payload(self) -> NotificationPayload {
        NotificationPayload::new(self.title, self.body)
            .with_icon(self.icon.unwrap_or_default())
            .with_image(self.image.unwrap_or_default())
            .with_tag(self.tag.unwrap_or_default())
            .with_renotify(self.renotify)
            .with_require_interaction(self.require_interaction)
            .with_navigate_url(self.navigate_url.unwrap_or_default())
    }
}
