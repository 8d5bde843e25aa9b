use async_trait::async_trait;
use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use std::io;
use std::sync::RwLock;

use crate::{
    devices::{DeviceRecord, is_valid_device_name},
    storage::traits::{DeviceStore, DeviceStream, StorageError},
};

/// Process-local store. Enumerates in device-name order.
#[derive(Default)]
pub struct InMemoryDeviceStore {
    records: RwLock<BTreeMap<String, DeviceRecord>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

fn poisoned(key: &str) -> io::Error {
    io::Error::other(format!("device store lock poisoned while accessing {key:?}"))
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn save(&self, record: &DeviceRecord) -> Result<String, StorageError> {
        let key = record.device_name();
        if !is_valid_device_name(key) {
            return Err(StorageError::InvalidDeviceName(key.to_string()));
        }
        let mut records = self.records.write().map_err(|_| StorageError::Write {
            key: key.to_string(),
            source: poisoned(key),
        })?;
        records.insert(key.to_string(), record.clone());
        Ok(key.to_string())
    }

    async fn load(&self, device_name: &str) -> Result<DeviceRecord, StorageError> {
        if !is_valid_device_name(device_name) {
            return Err(StorageError::InvalidDeviceName(device_name.to_string()));
        }
        let records = self.records.read().map_err(|_| StorageError::Read {
            key: device_name.to_string(),
            source: poisoned(device_name),
        })?;
        records
            .get(device_name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(device_name.to_string()))
    }

    async fn list_all(&self) -> Result<DeviceStream, StorageError> {
        let snapshot: Vec<DeviceRecord> = self
            .records
            .read()
            .map_err(|_| StorageError::Read {
                key: "*".to_string(),
                source: poisoned("*"),
            })?
            .values()
            .cloned()
            .collect();
        Ok(stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }
}
