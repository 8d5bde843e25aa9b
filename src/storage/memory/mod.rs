pub mod devices;

pub use devices::InMemoryDeviceStore;
