//! # Protocol Module
//!
//! Implements the vendor's UDP control protocol for single-room
//! heat-recovery ventilation units: the static parameter registry and the
//! binary frame codec.
//!
//! ## Why This Module Exists
//!
//! The unit speaks a compact binary datagram format over UDP. Everything
//! the bridge publishes or accepts ultimately passes through this module,
//! so it concentrates the protocol knowledge in one place: parameter
//! codes, value widths and ranges, frame layout and checksums.
//!
//! ## Module Architecture
//!
//! ```text
//! protocol/
//! ├── params.rs  - Parameter registry (codes, types, ranges, access)
//! ├── codec.rs   - Frame encoding/decoding and checksums
//! └── error.rs   - EncodingError / DecodeError taxonomy
//! ```
//!
//! Decoding never trusts the wire: truncated or garbled datagrams are
//! reported as [`DecodeError`] values the caller can retry on or drop.

pub mod codec;
pub mod error;
pub mod params;

pub use codec::{decode_frame, Frame, FrameEntry, FunctionCode};
pub use error::{DecodeError, EncodingError};
pub use params::{Access, Parameter, Value, ValueKind};
