//! Bidirectional mapping between MQTT topics and device parameters
//!
//! The naming convention is fixed: `<base>/<param-name>/set` for commands
//! on writable parameters, `<base>/<param-name>/state` for status, plus a
//! single `<base>/service` availability topic. Payloads are UTF-8 text:
//! booleans publish as "ON"/"OFF" (with "1"/"0" accepted inbound),
//! integers and enumerations as decimal text.

use tracing::debug;

use super::error::BridgeError;
use crate::protocol::params::{self, Parameter, Value, ValueKind};

const COMMAND_SUFFIX: &str = "set";
const STATUS_SUFFIX: &str = "state";
const SERVICE_SUFFIX: &str = "service";

/// Maps topic names to parameters and payloads to values, both ways
#[derive(Debug, Clone)]
pub struct TopicMapper {
    base: String,
}

impl TopicMapper {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Command topic for a parameter, or None for status-only parameters
    pub fn command_topic(&self, param: &Parameter) -> Option<String> {
        if !param.is_writable() {
            return None;
        }
        Some(format!("{}/{}/{}", self.base, param.name, COMMAND_SUFFIX))
    }

    /// Status topic of a parameter; every parameter has exactly one
    pub fn status_topic(&self, param: &Parameter) -> String {
        format!("{}/{}/{}", self.base, param.name, STATUS_SUFFIX)
    }

    /// Availability topic for the bridge/device pair
    pub fn service_topic(&self) -> String {
        format!("{}/{}", self.base, SERVICE_SUFFIX)
    }

    /// Every command topic the bridge must subscribe to
    pub fn command_topics(&self) -> Vec<String> {
        params::PARAMETERS
            .iter()
            .filter_map(|p| self.command_topic(p))
            .collect()
    }

    /// Resolves a command topic back to its parameter
    ///
    /// Returns None for anything that is not one of our command topics, so
    /// unrelated MQTT traffic is ignored rather than treated as an error.
    pub fn parameter_for_command_topic(&self, topic: &str) -> Option<&'static Parameter> {
        let rest = topic.strip_prefix(self.base.as_str())?.strip_prefix('/')?;
        let name = rest.strip_suffix(COMMAND_SUFFIX)?.strip_suffix('/')?;
        let param = params::by_name(name)?;
        if !param.is_writable() {
            debug!("Ignoring command topic for read-only parameter: {}", topic);
            return None;
        }
        Some(param)
    }

    /// Renders a parameter value as its MQTT payload text
    pub fn encode_payload(&self, param: &Parameter, value: Value) -> String {
        match (param.kind, value) {
            (ValueKind::Bool, Value::Bool(true)) => "ON".to_string(),
            (ValueKind::Bool, Value::Bool(false)) => "OFF".to_string(),
            // Bool parameters only ever decode to Value::Bool, and numeric
            // ones to Value::Int; render the raw number for the rest.
            (_, v) => v.as_u32().to_string(),
        }
    }

    /// Parses an inbound command payload into a typed, validated value
    pub fn decode_payload(&self, param: &Parameter, payload: &str) -> Result<Value, BridgeError> {
        let text = payload.trim();
        let value = match param.kind {
            ValueKind::Bool => match text {
                "ON" | "on" | "1" | "true" => Value::Bool(true),
                "OFF" | "off" | "0" | "false" => Value::Bool(false),
                _ => {
                    return Err(BridgeError::InvalidPayload {
                        param: param.name,
                        payload: payload.to_string(),
                        reason: "not a boolean payload".to_string(),
                    })
                }
            },
            ValueKind::Int { .. } | ValueKind::Enum { .. } => {
                let number: u32 =
                    text.parse()
                        .map_err(|_| BridgeError::InvalidPayload {
                            param: param.name,
                            payload: payload.to_string(),
                            reason: "not a decimal integer".to_string(),
                        })?;
                Value::Int(number)
            }
        };

        param
            .validate(value)
            .map_err(|e| BridgeError::InvalidPayload {
                param: param.name,
                payload: payload.to_string(),
                reason: e.to_string(),
            })?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::params::PARAMETERS;

    fn mapper() -> TopicMapper {
        TopicMapper::new("blauberg-vento")
    }

    #[test]
    fn command_topic_round_trips_for_every_writable_parameter() {
        let mapper = mapper();
        for param in PARAMETERS.iter().filter(|p| p.is_writable()) {
            let topic = mapper.command_topic(param).unwrap();
            assert_eq!(mapper.parameter_for_command_topic(&topic), Some(param));
        }
    }

    #[test]
    fn read_only_parameters_have_no_command_topic() {
        let mapper = mapper();
        for param in PARAMETERS.iter().filter(|p| !p.is_writable()) {
            assert_eq!(mapper.command_topic(param), None);
            let fake = format!("blauberg-vento/{}/set", param.name);
            assert_eq!(mapper.parameter_for_command_topic(&fake), None);
        }
    }

    #[test]
    fn topics_are_unique_across_the_registry() {
        let mapper = mapper();
        let mut seen = std::collections::HashSet::new();
        for param in PARAMETERS {
            assert!(seen.insert(mapper.status_topic(param)));
            if let Some(topic) = mapper.command_topic(param) {
                assert!(seen.insert(topic));
            }
        }
        assert!(seen.insert(mapper.service_topic()));
    }

    #[test]
    fn unrelated_topics_are_ignored() {
        let mapper = mapper();
        assert_eq!(mapper.parameter_for_command_topic("other/fan-speed/set"), None);
        assert_eq!(
            mapper.parameter_for_command_topic("blauberg-vento/fan-speed/state"),
            None
        );
        assert_eq!(
            mapper.parameter_for_command_topic("blauberg-vento/no-such/set"),
            None
        );
        assert_eq!(mapper.parameter_for_command_topic("blauberg-vento"), None);
    }

    #[test]
    fn trailing_slash_in_base_is_tolerated() {
        let mapper = TopicMapper::new("home/vento/");
        let speed = params::by_name("fan-speed").unwrap();
        assert_eq!(
            mapper.command_topic(speed).unwrap(),
            "home/vento/fan-speed/set"
        );
    }

    #[test]
    fn boolean_payloads_translate_both_ways() {
        let mapper = mapper();
        let state = params::by_name("state").unwrap();

        assert_eq!(mapper.encode_payload(state, Value::Bool(true)), "ON");
        assert_eq!(mapper.encode_payload(state, Value::Bool(false)), "OFF");

        for on in ["ON", "on", "1", "true"] {
            assert_eq!(mapper.decode_payload(state, on).unwrap(), Value::Bool(true));
        }
        for off in ["OFF", "off", "0", "false"] {
            assert_eq!(mapper.decode_payload(state, off).unwrap(), Value::Bool(false));
        }
        assert!(matches!(
            mapper.decode_payload(state, "maybe"),
            Err(BridgeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn integer_payloads_translate_both_ways() {
        let mapper = mapper();
        let speed = params::by_name("fan-speed").unwrap();

        assert_eq!(mapper.encode_payload(speed, Value::Int(3)), "3");
        assert_eq!(mapper.decode_payload(speed, "3").unwrap(), Value::Int(3));
        assert_eq!(mapper.decode_payload(speed, " 2 ").unwrap(), Value::Int(2));

        assert!(matches!(
            mapper.decode_payload(speed, "9"),
            Err(BridgeError::InvalidPayload { .. })
        ));
        assert!(matches!(
            mapper.decode_payload(speed, "fast"),
            Err(BridgeError::InvalidPayload { .. })
        ));
    }
}
