use async_trait::async_trait;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;

use crate::devices::DeviceRecord;

/// Lazy enumeration of stored records. Each item is loaded on demand, so one
/// unreadable record surfaces as a single `Err` item.
pub type DeviceStream = BoxStream<'static, Result<DeviceRecord, StorageError>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid device name {0:?}")]
    InvalidDeviceName(String),

    #[error("no stored record for device {0:?}")]
    NotFound(String),

    #[error("stored record for {key:?} is malformed: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to read {key:?}: {source}")]
    Read { key: String, source: io::Error },

    #[error("failed to write {key:?}: {source}")]
    Write { key: String, source: io::Error },
}

impl StorageError {
    /// The device name (or location) the failure relates to.
    pub fn key(&self) -> &str {
        match self {
            StorageError::InvalidDeviceName(key) | StorageError::NotFound(key) => key,
            StorageError::Malformed { key, .. }
            | StorageError::Read { key, .. }
            | StorageError::Write { key, .. } => key,
        }
    }
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Persists `record` under its device name, replacing any previous record
    /// of that name. Returns where the record was stored.
    async fn save(&self, record: &DeviceRecord) -> Result<String, StorageError>;

    async fn load(&self, device_name: &str) -> Result<DeviceRecord, StorageError>;

    /// Enumerates every stored record. Order is unspecified and may differ
    /// between calls; calling again restarts from the current contents.
    async fn list_all(&self) -> Result<DeviceStream, StorageError>;
}
