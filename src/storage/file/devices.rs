use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    devices::{DeviceRecord, is_valid_device_name},
    storage::traits::{DeviceStore, DeviceStream, StorageError},
};

const EXTENSION: &str = "json";

/// One `<device_name>.json` file per device inside a single directory.
#[derive(Debug, Clone)]
pub struct FileDeviceStore {
    dir: PathBuf,
}

impl FileDeviceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, device_name: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_device_name(device_name) {
            return Err(StorageError::InvalidDeviceName(device_name.to_string()));
        }
        Ok(self.dir.join(format!("{device_name}.{EXTENSION}")))
    }
}

#[async_trait]
impl DeviceStore for FileDeviceStore {
    async fn save(&self, record: &DeviceRecord) -> Result<String, StorageError> {
        let key = record.device_name();
        let path = self.path_for(key)?;
        let write_err = |source: io::Error| StorageError::Write {
            key: key.to_string(),
            source,
        };

        let contents = to_json_pretty(record).map_err(|e| write_err(e.into()))?;

        fs::create_dir_all(&self.dir).await.map_err(write_err)?;

        // Write beside the target and rename over it so readers never see a
        // partial file. The temp name has a fixed length, whatever the device
        // name, and never matches the `*.json` scan.
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&tmp, &contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        debug!(device = %key, path = %path.display(), "Saved device record");
        Ok(path.display().to_string())
    }

    async fn load(&self, device_name: &str) -> Result<DeviceRecord, StorageError> {
        let path = self.path_for(device_name)?;
        read_record(&path, device_name).await
    }

    async fn list_all(&self) -> Result<DeviceStream, StorageError> {
        let entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(stream::empty().boxed());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    key: self.dir.display().to_string(),
                    source,
                });
            }
        };
        let dir_key = self.dir.display().to_string();

        let records = stream::unfold(Some(entries), move |state| {
            let dir_key = dir_key.clone();
            async move {
                let mut entries = state?;
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => {
                            let path = entry.path();
                            let Some(device_name) = device_name_of(&path) else {
                                continue;
                            };
                            let record = read_record(&path, &device_name).await;
                            return Some((record, Some(entries)));
                        }
                        Ok(None) => return None,
                        // Stop after reporting; the directory handle is no
                        // longer trustworthy.
                        Err(source) => {
                            let err = StorageError::Read {
                                key: dir_key,
                                source,
                            };
                            return Some((Err(err), None));
                        }
                    }
                }
            }
        });

        Ok(records.boxed())
    }
}

/// File stem of a visible `*.json` file.
fn device_name_of(path: &Path) -> Option<String> {
    if path.extension()? != EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

async fn read_record(path: &Path, key: &str) -> Result<DeviceRecord, StorageError> {
    let contents = fs::read(path).await.map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Read {
                key: key.to_string(),
                source,
            }
        }
    })?;

    let record: DeviceRecord =
        serde_json::from_slice(&contents).map_err(|source| StorageError::Malformed {
            key: key.to_string(),
            source,
        })?;

    if record.device_name() != key {
        warn!(
            file = %path.display(),
            device = %record.device_name(),
            "Device file name does not match the stored device name"
        );
    }
    Ok(record)
}

/// Serializes with four-space indentation.
fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
