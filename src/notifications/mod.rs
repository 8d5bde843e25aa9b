pub mod handler;
pub mod payload;
pub mod service;
pub mod transport;
pub mod vapid;

pub use handler::{
    device_handler, devices_handler, notify_handler, public_key_handler, subscribe_handler,
};
pub use payload::{NotificationPayload, NotificationRequest};
pub use service::{
    DispatchFailure, DispatchOutcome, DispatchReport, DispatchResult, NotificationDispatcher,
};
pub use transport::{PushTransport, TransportError, WebPushTransport};
pub use vapid::{IdentityError, KeyRole, VapidIdentity};
