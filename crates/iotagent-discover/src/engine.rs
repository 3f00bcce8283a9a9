//! Scan engine abstraction.
//!
//! The sweep and profile operations only see this trait and the neutral
//! report types below, so the nmap adapter can be swapped or mocked.

use std::collections::BTreeMap;

use async_trait::async_trait;
use iotagent_core::{HostStatus, Protocol};

use crate::error::Result;

/// Probe policy handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Presence-only host discovery, no port scan.
    Sweep,
    /// TCP SYN probing, OS fingerprinting, and service/version detection.
    Profile,
}

impl ScanPolicy {
    /// Return the nmap flags for this policy.
    pub fn nmap_flags(&self) -> Vec<&'static str> {
        match self {
            Self::Sweep => vec!["-sn"],
            Self::Profile => vec!["-sS", "-O", "-sV"],
        }
    }
}

/// A scan engine instance. `&mut self` keeps one scan in flight per instance.
#[async_trait]
pub trait ScanEngine: Send {
    async fn scan(&mut self, target: &str, policy: ScanPolicy) -> Result<EngineReport>;
}

/// Builds one engine per in-flight scan.
pub trait EngineFactory: Send + Sync {
    type Engine: ScanEngine + 'static;

    fn create(&self) -> Self::Engine;
}

/// Structured result of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReport {
    pub hosts: Vec<EngineHost>,
}

impl EngineReport {
    /// Find a host by its reported address.
    pub fn host(&self, address: &str) -> Option<&EngineHost> {
        self.hosts.iter().find(|h| h.address == address)
    }
}

/// One host as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineHost {
    pub address: String,
    pub state: HostStatus,
    pub mac: Option<String>,
    /// Ports per protocol, keyed by port number.
    pub ports: BTreeMap<Protocol, BTreeMap<u16, EnginePort>>,
    /// OS candidates, best first.
    pub os_matches: Vec<EngineOsMatch>,
}

impl EngineHost {
    pub fn new(address: impl Into<String>, state: HostStatus) -> Self {
        Self {
            address: address.into(),
            state,
            mac: None,
            ports: BTreeMap::new(),
            os_matches: Vec::new(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == HostStatus::Up
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnginePort {
    pub state: String,
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOsMatch {
    pub name: String,
    pub accuracy: Option<u8>,
    pub classes: Vec<EngineOsClass>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOsClass {
    pub device_type: Option<String>,
    pub vendor: Option<String>,
    pub family: Option<String>,
}
