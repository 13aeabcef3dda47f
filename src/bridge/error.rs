//! Error definitions for the bridge module

use thiserror::Error;

use crate::device::DeviceError;

/// Errors raised on the bridge's command and poll paths
///
/// None of these terminate the bridge; they are logged at the call site
/// and the affected publish simply does not happen.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bridge configuration failed validation at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// An inbound command payload could not be translated
    #[error("Invalid payload {payload:?} for parameter '{param}': {reason}")]
    InvalidPayload {
        param: &'static str,
        payload: String,
        reason: String,
    },

    /// The device transaction behind a command or poll failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// The MQTT client rejected a publish or subscribe request
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Bridge task management error
    #[error("Task error: {0}")]
    Task(String),
}
