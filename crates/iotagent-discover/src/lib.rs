//! iotagent-discover: Local network discovery for the IoT agent.
//!
//! Picks the subnet of the primary interface, sweeps it for live hosts
//! through a pluggable scan engine (nmap by default), profiles selected
//! hosts in detail, and hands every result to a reporting sink.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod nmap_xml;
pub mod profile;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod scheduler;
pub mod subnet;
pub mod sweep;

pub use context::DiscoveryContext;
pub use engine::{EngineFactory, EngineReport, ScanEngine, ScanPolicy};
pub use error::{DiscoverError, Result};
pub use profile::DeviceProfiler;
pub use scheduler::DiscoveryOrchestrator;
pub use sweep::SweepScanner;
