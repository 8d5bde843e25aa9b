pub mod devices;

pub use devices::FileDeviceStore;
