//! Core domain types for the IoT agent's network discovery.
//!
//! Every value here is produced by a single discovery operation and handed
//! to the caller; none of them outlive that operation inside the agent.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

// ── Interfaces ────────────────────────────────────────────────────

/// One IPv4 binding of a local network interface.
///
/// An interface with several IPv4 addresses yields several records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            ip,
            netmask,
        }
    }

    /// True for addresses in 127.0.0.0/8.
    pub fn is_loopback(&self) -> bool {
        self.ip.is_loopback()
    }
}

// ── Subnet ────────────────────────────────────────────────────────

/// An IPv4 network in CIDR form. The address is always the network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    /// Subnet used when no local interface can be found.
    pub const FALLBACK: Subnet = Subnet {
        network: Ipv4Addr::new(192, 168, 1, 0),
        prefix_len: 24,
    };

    /// Build a subnet from a network address and prefix length.
    /// Host bits in `network` are cleared.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, AgentError> {
        Ipv4Net::new(network, prefix_len)
            .map(Self::from)
            .map_err(|_| AgentError::InvalidSubnet(format!("{network}/{prefix_len}")))
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl From<Ipv4Net> for Subnet {
    fn from(net: Ipv4Net) -> Self {
        Self {
            network: net.network(),
            prefix_len: net.prefix_len(),
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len())
    }
}

impl FromStr for Subnet {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Net>()
            .map(Self::from)
            .map_err(|_| AgentError::InvalidSubnet(s.to_string()))
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.to_string()
    }
}

impl TryFrom<String> for Subnet {
    type Error = AgentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ── Hosts ─────────────────────────────────────────────────────────

/// Reachability of a host as reported by the scan engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
    Unknown,
}

impl HostStatus {
    pub fn parse(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A live host found by a sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSummary {
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
    pub status: HostStatus,
    pub mac_address: Option<String>,
}

// ── Ports and services ────────────────────────────────────────────

/// Transport protocol of a port.
///
/// Ordering follows the protocol name, which is the order ports are listed
/// in a profile. Unrecognised names sort last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Protocol {
    Ip,
    Sctp,
    Tcp,
    Udp,
    Other(String),
}

impl Protocol {
    pub fn parse(proto: &str) -> Self {
        match proto.to_lowercase().as_str() {
            "ip" => Self::Ip,
            "sctp" => Self::Sctp,
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip => f.write_str("ip"),
            Self::Sctp => f.write_str("sctp"),
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl From<Protocol> for String {
    fn from(proto: Protocol) -> Self {
        proto.to_string()
    }
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// A port reported for a profiled host, with the engine's raw state
/// (`open`, `closed`, `filtered`, `open|filtered`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenPort {
    pub port: u16,
    pub protocol: Protocol,
    pub state: String,
}

/// A port on which the engine identified a named service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub port: u16,
    pub protocol: Protocol,
    pub name: String,
    pub product: Option<String>,
    pub version: Option<String>,
}

/// Best operating-system match for a profiled host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsGuess {
    pub name: String,
    pub accuracy: Option<u8>,
    pub device_type: Option<String>,
}

// ── Profiles ──────────────────────────────────────────────────────

/// Detailed view of a single host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceProfile {
    pub ip: Ipv4Addr,
    pub status: HostStatus,
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
    pub os: Option<OsGuess>,
    pub open_ports: Vec<OpenPort>,
    pub services: Vec<ServiceInfo>,
    pub scanned_at: DateTime<Utc>,
}

impl DeviceProfile {
    pub fn new(ip: Ipv4Addr, status: HostStatus) -> Self {
        Self {
            ip,
            status,
            hostname: None,
            mac_address: None,
            os: None,
            open_ports: Vec::new(),
            services: Vec::new(),
            scanned_at: Utc::now(),
        }
    }

    /// Record a port and, when `service` is given, the service on it.
    ///
    /// The port entry is always pushed first so every service has a
    /// matching `(port, protocol)` in `open_ports`.
    pub fn add_port(&mut self, port: OpenPort, service: Option<ServiceInfo>) {
        self.open_ports.push(port);
        if let Some(svc) = service {
            self.services.push(svc);
        }
    }

    /// Every service is backed by an `open_ports` entry with the same key.
    pub fn services_subset_of_ports(&self) -> bool {
        self.services.iter().all(|svc| {
            self.open_ports
                .iter()
                .any(|p| p.port == svc.port && p.protocol == svc.protocol)
        })
    }
}

// ── Outcomes ──────────────────────────────────────────────────────

/// Result of sweeping a subnet.
///
/// A failed sweep carries no devices, but stays distinguishable from a
/// network that simply had nothing up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed {
        subnet: String,
        devices: Vec<DeviceSummary>,
    },
    Failed {
        subnet: String,
        error: String,
    },
}

impl SweepOutcome {
    pub fn subnet(&self) -> &str {
        match self {
            Self::Completed { subnet, .. } | Self::Failed { subnet, .. } => subnet,
        }
    }

    /// Devices found; empty when the sweep failed.
    pub fn devices(&self) -> &[DeviceSummary] {
        match self {
            Self::Completed { devices, .. } => devices,
            Self::Failed { .. } => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of profiling one host. Always tied to the requested address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProfileOutcome {
    Found(DeviceProfile),
    NotFound { ip: Ipv4Addr },
    Failed { ip: Ipv4Addr, error: String },
}

impl ProfileOutcome {
    pub fn ip(&self) -> Ipv4Addr {
        match self {
            Self::Found(profile) => profile.ip,
            Self::NotFound { ip } | Self::Failed { ip, .. } => *ip,
        }
    }

    pub fn profile(&self) -> Option<&DeviceProfile> {
        match self {
            Self::Found(profile) => Some(profile),
            _ => None,
        }
    }
}
