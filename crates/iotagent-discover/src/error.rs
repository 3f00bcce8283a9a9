//! Error types for the iotagent-discover crate.

use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Nmap not found at path: {path}")]
    NmapNotFound { path: String },

    #[error("Nmap exited with code {code}: {stderr}")]
    NmapFailed { code: i32, stderr: String },

    #[error("Failed to parse nmap XML output: {0}")]
    XmlParse(String),

    #[error("Scan of {target} timed out after {secs}s")]
    Timeout { target: String, secs: u64 },

    #[error("Netmask {netmask} on {interface} is not contiguous")]
    InvalidNetmask {
        interface: String,
        netmask: Ipv4Addr,
    },

    #[error("Invalid scan target: {0}")]
    InvalidTarget(String),

    #[error("Interface error on {name}: {reason}")]
    Interface { name: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Agent(#[from] iotagent_core::AgentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
