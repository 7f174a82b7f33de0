// nbcrt-api: Async Rust client for the NetBox REST API

pub mod client;
mod dcim;
pub mod error;
pub mod models;
pub mod transport;
mod virtualization;

pub use client::{DEFAULT_PAGE_SIZE, NetBoxClient, normalize_base_url};
pub use error::Error;
pub use models::{
    ConnectedEndpoint, ConsoleServerPort, Device, DeviceType, IpAddress, NestedDevice, NestedRef,
    Page, Site, Tag, VirtualMachine,
};
pub use transport::{TlsMode, TransportConfig};
