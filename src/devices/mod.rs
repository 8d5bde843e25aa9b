pub mod intake;
pub mod record;

pub use intake::{IntakeError, SubscribeRequest};
pub use record::{
    DeviceRecord, MAX_DEVICE_NAME_LEN, Subscription, SubscriptionKeys, is_valid_device_name,
};
