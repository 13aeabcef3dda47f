//! MQTT bridge for Blauberg Vento single-room heat-recovery ventilation
//! units: translates the vendor's UDP control protocol into command and
//! status topics a home-automation system can use directly.

pub mod bridge;
pub mod config;
pub mod device;
pub mod protocol;
