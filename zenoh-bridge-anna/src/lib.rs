//! Zenoh bridge for the Plugwise Anna thermostat.
//!
//! The bridge polls the Smile gateway for its appliance snapshot, rounds each
//! monitored value to its precision class and publishes it only when the
//! rounded value changed. A single inbound key accepts new values for the
//! controllable field (the setpoint), forwards them to the device and echoes
//! them back through the same change detection.
//!
//! # Key Expressions
//!
//! ```text
//! thermosync/anna/<field>          outbound, one per monitored field
//! thermosync/anna/set/setpoint     inbound commands
//! thermosync/anna/@/status         bridge status
//! ```
//!
//! Both prefixes and the controllable field come from the configuration.
//!
//! # Appliance identifier
//!
//! Writes are addressed to the thermostat's appliance identifier, read from
//! every snapshot like the monitored fields. It is never published, so it is
//! kept next to the cache rather than in it: each poll compares the fresh
//! value with the held one and adopts it when it differs, while a bus
//! reconnect resets the cache but leaves the identifier in place. Commands
//! arriving before the first successful fetch are refused.

pub mod bridge;
pub mod bus;
pub mod cache;
pub mod command;
pub mod config;
pub mod device;
pub mod document;
pub mod extractor;
pub mod poller;
pub mod precision;
pub mod selector;

pub use bridge::AnnaBridge;
pub use bus::Bus;
pub use command::{CommandError, CommandOutcome};
pub use config::{AnnaBridgeConfig, AnnaConfig, ConfigError};
pub use device::{DeviceError, DeviceTransport, SmileClient};
pub use poller::{PollError, PollReport};
