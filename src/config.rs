use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use tracing::info;

/// Connection settings for the ventilation unit
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host name or address of the unit
    pub host: String,
    /// UDP control port
    pub port: u16,
    /// Device id announced in every frame
    pub device_id: String,
    /// Device password announced in every frame
    pub password: String,
    /// Per-attempt reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Attempts before the unit counts as unreachable
    pub retries: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 4000,
            device_id: "DEFAULT_DEVICEID".to_string(),
            password: "1111".to_string(),
            timeout_ms: 2000,
            retries: 3,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Connection settings for the MQTT broker
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            username: None,
            password: None,
            client_id: "ventobridge".to_string(),
        }
    }
}

/// Complete bridge configuration
///
/// Built once at startup from CLI flags and an optional TOML file, then
/// passed to the bridge controller at construction; there is no
/// process-wide configuration state.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub device: DeviceConfig,
    pub mqtt: MqttConfig,
    /// Topic prefix for every command, status and service topic
    pub base_topic: String,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            mqtt: MqttConfig::default(),
            base_topic: "blauberg-vento".to_string(),
            poll_interval_secs: 30,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Loads a configuration file, leaving unset fields at their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| eyre!("Cannot read config file {}: {}", path.display(), e))?;
        let config: BridgeConfig = toml::from_str(&raw)
            .map_err(|e| eyre!("Cannot parse config file {}: {}", path.display(), e))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_vendor_protocol() {
        let config = DeviceConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.device_id, "DEFAULT_DEVICEID");
        assert_eq!(config.password, "1111");
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn partial_toml_fills_missing_fields_with_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            base_topic = "home/vento"

            [device]
            host = "192.168.1.50"

            [mqtt]
            host = "broker.local"
            username = "vento"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_topic, "home/vento");
        assert_eq!(config.device.host, "192.168.1.50");
        assert_eq!(config.device.port, 4000);
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.username.as_deref(), Some("vento"));
        assert_eq!(config.mqtt.password, None);
        assert_eq!(config.poll_interval_secs, 30);
    }

    #[test]
    fn empty_toml_is_a_complete_default_configuration() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.base_topic, "blauberg-vento");
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }
}
