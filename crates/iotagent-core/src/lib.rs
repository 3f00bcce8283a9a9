//! iotagent-core: Shared types, configuration, and error handling for the IoT agent.
//!
//! This crate provides the foundational types used by the discovery engine:
//! - Interface, subnet, and device records produced by discovery
//! - Sweep and profile outcomes that keep failures distinguishable
//! - Event types handed to the reporting sink
//! - Agent connection configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::AgentError;
pub use types::{
    DeviceProfile, DeviceSummary, HostStatus, NetworkInterface, OpenPort, OsGuess,
    ProfileOutcome, Protocol, ServiceInfo, Subnet, SweepOutcome,
};
