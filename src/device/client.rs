//! Request/response client for one ventilation unit
//!
//! Owns the transport to a single configured device and performs one
//! transaction at a time: send a request frame, await the matching
//! response, retry on loss. The transport sits behind an async mutex so a
//! poll cycle and a command write can never interleave their datagrams.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::transport::Transport;
use crate::protocol::codec;
use crate::protocol::error::EncodingError;
use crate::protocol::params::{Parameter, Value};

/// Timeout and retry policy for a single transaction
///
/// Kept explicit instead of embedded constants so the policy is
/// configurable per deployment and testable with a scripted transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// How long one attempt waits for a reply
    pub timeout: Duration,
    /// How many attempts before the device counts as unreachable
    pub retries: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 3,
        }
    }
}

/// Errors surfaced by device transactions
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The value failed codec validation before anything was sent
    #[error("Invalid value: {0}")]
    InvalidValue(#[from] EncodingError),

    /// Attempted to write a status-only parameter
    #[error("Parameter '{0}' is not writable")]
    NotWritable(&'static str),

    /// All attempts timed out or produced unusable replies
    #[error("Device {device_id} unreachable after {attempts} attempts")]
    Unreachable { device_id: String, attempts: u32 },
}

/// Client for the vendor UDP control protocol
///
/// At most one transaction is outstanding at any time; concurrent calls
/// are serialized on the transport lock.
pub struct DeviceClient {
    device_id: String,
    password: String,
    settings: ClientSettings,
    transport: Mutex<Box<dyn Transport>>,
}

impl DeviceClient {
    pub fn new(
        device_id: impl Into<String>,
        password: impl Into<String>,
        settings: ClientSettings,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            password: password.into(),
            settings,
            transport: Mutex::new(transport),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Reads the current value of every registry parameter
    pub async fn query(&self) -> Result<BTreeMap<u8, Value>, DeviceError> {
        let request = codec::read_request(&self.device_id, &self.password)?;
        self.transaction(&request).await
    }

    /// Writes one parameter and returns the values acknowledged by the unit
    ///
    /// The response to a write echoes the written parameter, so the caller
    /// can publish the confirmed state without an extra poll.
    pub async fn set_parameter(
        &self,
        param: &Parameter,
        value: Value,
    ) -> Result<BTreeMap<u8, Value>, DeviceError> {
        if !param.is_writable() {
            return Err(DeviceError::NotWritable(param.name));
        }
        let request = codec::write_request(&self.device_id, &self.password, param, value)?;
        debug!("Writing {} = {:?}", param.name, value);
        self.transaction(&request).await
    }

    /// One send/await-reply round with the configured retry budget
    ///
    /// Replies are correlated by device id. A garbled datagram or a reply
    /// from a different unit counts as a failed attempt and triggers the
    /// next retry.
    async fn transaction(&self, request: &[u8]) -> Result<BTreeMap<u8, Value>, DeviceError> {
        let mut transport = self.transport.lock().await;

        for attempt in 1..=self.settings.retries {
            if let Err(e) = transport.send(request).await {
                warn!(
                    "Attempt {}/{}: send failed: {}",
                    attempt, self.settings.retries, e
                );
                continue;
            }

            match timeout(self.settings.timeout, transport.recv()).await {
                Err(_) => {
                    warn!(
                        "Attempt {}/{}: no reply from {} within {:?}",
                        attempt, self.settings.retries, self.device_id, self.settings.timeout
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        "Attempt {}/{}: receive failed: {}",
                        attempt, self.settings.retries, e
                    );
                }
                Ok(Ok(datagram)) => {
                    let outcome = codec::decode_frame(&datagram)
                        .and_then(|frame| codec::response_values(&frame, &self.device_id));
                    match outcome {
                        Ok(values) => {
                            debug!("Received {} parameter values", values.len());
                            return Ok(values);
                        }
                        Err(e) => {
                            warn!(
                                "Attempt {}/{}: discarding reply: {}",
                                attempt, self.settings.retries, e
                            );
                        }
                    }
                }
            }
        }

        Err(DeviceError::Unreachable {
            device_id: self.device_id.clone(),
            attempts: self.settings.retries,
        })
    }
}
