pub mod gateway;

pub use gateway::{resolve_address, resolve_host_entry, HOST_GATEWAY};
