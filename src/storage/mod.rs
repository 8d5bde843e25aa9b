pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileDeviceStore;
pub use memory::InMemoryDeviceStore;
pub use traits::{DeviceStore, DeviceStream, StorageError};
