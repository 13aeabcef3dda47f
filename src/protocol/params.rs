//! Static registry of the ventilation unit's control and status points
//!
//! Parameter codes and wire widths follow the vendor's control protocol for
//! single-room heat-recovery units. The registry is defined once as a const
//! table and never changes at runtime; every other component resolves
//! parameters through [`by_code`] or [`by_name`].

use super::error::EncodingError;

/// Read/write capability of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Status point, only reported by the unit
    ReadOnly,
    /// Control point, can be written from the command path
    ReadWrite,
}

/// Declared value type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// On/off point, one byte on the wire, zero = off
    Bool,
    /// Numeric point within an inclusive range
    Int { min: u32, max: u32 },
    /// Selection point, valid values are 0..=max
    Enum { max: u8 },
}

/// A decoded parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(u32),
}

impl Value {
    /// Raw numeric representation used on the wire
    pub fn as_u32(&self) -> u32 {
        match self {
            Value::Bool(false) => 0,
            Value::Bool(true) => 1,
            Value::Int(v) => *v,
        }
    }
}

/// One named, typed control/status point of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    /// Protocol-level parameter code
    pub code: u8,
    /// Semantic name, also used to derive MQTT topic segments
    pub name: &'static str,
    /// Value width on the wire in bytes
    pub width: usize,
    /// Declared value type
    pub kind: ValueKind,
    /// Read/write capability
    pub access: Access,
}

impl Parameter {
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// Checks a value against the declared type and range
    pub fn validate(&self, value: Value) -> Result<(), EncodingError> {
        match (self.kind, value) {
            (ValueKind::Bool, Value::Bool(_)) => Ok(()),
            (ValueKind::Bool, Value::Int(_)) => {
                Err(EncodingError::TypeMismatch { param: self.name })
            }
            (ValueKind::Int { min, max }, Value::Int(v)) => {
                if v < min || v > max {
                    Err(EncodingError::OutOfRange {
                        param: self.name,
                        value: v,
                        min,
                        max,
                    })
                } else {
                    Ok(())
                }
            }
            (ValueKind::Enum { max }, Value::Int(v)) => {
                if v > max as u32 {
                    Err(EncodingError::OutOfRange {
                        param: self.name,
                        value: v,
                        min: 0,
                        max: max as u32,
                    })
                } else {
                    Ok(())
                }
            }
            (_, Value::Bool(_)) => Err(EncodingError::TypeMismatch { param: self.name }),
        }
    }

    /// Encodes a validated value into its big-endian wire bytes
    pub fn encode_value(&self, value: Value) -> Result<Vec<u8>, EncodingError> {
        self.validate(value)?;
        let raw = value.as_u32();
        let be = raw.to_be_bytes();
        Ok(be[4 - self.width..].to_vec())
    }

    /// Decodes wire bytes into a typed value
    ///
    /// The slice length must equal the declared width; the frame decoder
    /// guarantees this before calling in.
    pub fn decode_value(&self, data: &[u8]) -> Value {
        let mut raw: u32 = 0;
        for byte in data {
            raw = (raw << 8) | *byte as u32;
        }
        match self.kind {
            ValueKind::Bool => Value::Bool(raw != 0),
            _ => Value::Int(raw),
        }
    }
}

/// Every control and status point the bridge knows about
pub const PARAMETERS: &[Parameter] = &[
    Parameter {
        code: 0x03,
        name: "state",
        width: 1,
        kind: ValueKind::Bool,
        access: Access::ReadWrite,
    },
    Parameter {
        code: 0x04,
        name: "fan-speed",
        width: 1,
        kind: ValueKind::Enum { max: 3 },
        access: Access::ReadWrite,
    },
    Parameter {
        code: 0x05,
        name: "manual-speed",
        width: 1,
        kind: ValueKind::Int { min: 0, max: 255 },
        access: Access::ReadWrite,
    },
    Parameter {
        code: 0x06,
        name: "airflow",
        width: 1,
        kind: ValueKind::Enum { max: 2 },
        access: Access::ReadWrite,
    },
    Parameter {
        code: 0x08,
        name: "humidity",
        width: 1,
        kind: ValueKind::Int { min: 0, max: 100 },
        access: Access::ReadOnly,
    },
    Parameter {
        code: 0x0B,
        name: "humidity-threshold",
        width: 1,
        kind: ValueKind::Int { min: 40, max: 80 },
        access: Access::ReadWrite,
    },
    Parameter {
        code: 0x0C,
        name: "alarm",
        width: 1,
        kind: ValueKind::Bool,
        access: Access::ReadOnly,
    },
    Parameter {
        code: 0x11,
        name: "shutdown-timer",
        width: 3,
        kind: ValueKind::Int {
            min: 0,
            max: 0x00FF_FFFF,
        },
        access: Access::ReadOnly,
    },
    Parameter {
        code: 0x12,
        name: "filter-alarm",
        width: 1,
        kind: ValueKind::Bool,
        access: Access::ReadOnly,
    },
    Parameter {
        code: 0x14,
        name: "boost-mode",
        width: 1,
        kind: ValueKind::Bool,
        access: Access::ReadOnly,
    },
];

/// Looks up a parameter by its protocol code
pub fn by_code(code: u8) -> Option<&'static Parameter> {
    PARAMETERS.iter().find(|p| p.code == code)
}

/// Looks up a parameter by its semantic name
pub fn by_name(name: &str) -> Option<&'static Parameter> {
    PARAMETERS.iter().find(|p| p.name == name)
}
