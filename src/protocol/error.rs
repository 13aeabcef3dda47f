//! Error definitions for the protocol module

use thiserror::Error;

/// Errors raised while building an outgoing frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Device id is empty, too long or not ASCII
    #[error("Invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// Password is too long or not ASCII
    #[error("Invalid device password")]
    InvalidPassword,

    /// A boolean parameter received a non-boolean value or vice versa
    #[error("Type mismatch for parameter '{param}'")]
    TypeMismatch { param: &'static str },

    /// An integer or enumerated value lies outside the declared range
    #[error("Value {value} for parameter '{param}' is outside {min}..={max}")]
    OutOfRange {
        param: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Errors raised while parsing an incoming datagram
///
/// Datagrams arrive over a connectionless transport and can be truncated or
/// garbled, so every variant here is an expected runtime condition the
/// caller may react to (retry, drop), never a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Datagram ended before the announced structure was complete
    #[error("Truncated datagram ({0} bytes)")]
    Truncated(usize),

    /// First two bytes are not the protocol magic
    #[error("Bad magic marker")]
    BadMagic,

    /// Protocol type byte is not the supported revision
    #[error("Unsupported protocol type {0:#04x}")]
    BadProtocolType(u8),

    /// Checksum over the frame body did not match the trailer
    #[error("Checksum mismatch (expected {expected:#06x}, found {found:#06x})")]
    ChecksumMismatch { expected: u16, found: u16 },

    /// Device id or password field contained non-ASCII bytes
    #[error("Malformed id or password field")]
    BadString,

    /// Function code is not read, write or response
    #[error("Unknown function code {0:#04x}")]
    UnknownFunction(u8),

    /// Payload referenced a parameter code missing from the registry
    #[error("Unknown parameter code {0:#04x}")]
    UnknownParameter(u8),

    /// Frame decoded cleanly but was sent by a different unit
    #[error("Response from unexpected device {0:?}")]
    WrongDevice(String),

    /// Frame decoded cleanly but is not a response frame
    #[error("Expected a response frame, got function {0:#04x}")]
    NotAResponse(u8),
}
