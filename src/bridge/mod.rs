//! # Bridge Module
//!
//! Translates between the ventilation unit's UDP control protocol and
//! MQTT. This module owns everything above the device client: the topic
//! naming scheme, payload translation, the de-duplication cache and the
//! controller task that ties the command and poll paths together.
//!
//! ## Module Architecture
//!
//! ```text
//! bridge/
//! ├── topics.rs      - Topic/payload mapping between MQTT and parameters
//! ├── controller.rs  - Lifecycle state machine and translation loop
//! └── error.rs       - Bridge error taxonomy
//! ```
//!
//! ## Design Philosophy
//!
//! - **Containment**: a bad command or an unreachable device costs one
//!   publish, never the bridge; only startup configuration errors abort.
//! - **Single owner**: the UDP transaction lock and the last-published
//!   cache live behind the controller; no other component touches them.
//! - **Transitions over traffic**: availability and status values are
//!   published when they change, not on every cycle.

pub mod controller;
pub mod error;
pub mod topics;

pub use controller::{
    Bridge, BridgeHandle, BridgeState, BridgeStatus, ConnectionState, Publication,
};
pub use error::BridgeError;
pub use topics::TopicMapper;
