//! Device communication: transport seam and the request/response client

pub mod client;
pub mod transport;

pub use client::{ClientSettings, DeviceClient, DeviceError};
pub use transport::{Transport, UdpTransport};
