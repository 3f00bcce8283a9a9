//! Configuration for the discovery engine.

use std::time::Duration;

use ipnet::Ipv4Net;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{DiscoverError, Result};

/// Top-level discover configuration.
///
/// Loaded from the `[discover]` section of the agent config file or
/// `IOT_AGENT__DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Path to the nmap binary (default: "nmap").
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Agent identifier. Derived from the local hostname when empty.
    #[serde(default)]
    pub agent_id: String,

    /// Interface whose subnet is swept. Primary interface when unset.
    #[serde(default)]
    pub interface: Option<String>,

    /// Explicit CIDR to sweep, bypassing interface selection.
    #[serde(default)]
    pub subnet: Option<String>,

    /// Seconds between sweeps in monitor mode.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Which hosts get a detailed profile after each sweep.
    #[serde(default)]
    pub profile_policy: ProfilePolicy,

    /// Maximum concurrent profile scans.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_profiles: usize,

    /// Upper bound on a single scan, in seconds. 0 disables the limit.
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,

    /// Extra arguments appended to every nmap invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Profiling policy applied after each sweep.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfilePolicy {
    /// Sweep only.
    None,
    /// Profile hosts that were not up in the previous sweep.
    #[default]
    NewHosts,
    /// Profile every host found.
    All,
}

impl DiscoverConfig {
    pub fn scan_timeout(&self) -> Option<Duration> {
        (self.scan_timeout_secs > 0).then(|| Duration::from_secs(self.scan_timeout_secs))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Reject values that would only fail later, mid-scan.
    pub fn validate(&self) -> Result<()> {
        if let Some(subnet) = &self.subnet {
            subnet.parse::<Ipv4Net>().map_err(|e| {
                DiscoverError::Config(format!("subnet {subnet:?} is not an IPv4 CIDR: {e}"))
            })?;
        }
        if !self.agent_id.is_empty() {
            Uuid::parse_str(&self.agent_id).map_err(|e| {
                DiscoverError::Config(format!("agent_id {:?} is not a UUID: {e}", self.agent_id))
            })?;
        }
        if self.nmap_path.trim().is_empty() {
            return Err(DiscoverError::Config("nmap_path is empty".to_string()));
        }
        Ok(())
    }
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_interval() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    2
}

fn default_scan_timeout() -> u64 {
    600
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            nmap_path: default_nmap_path(),
            agent_id: String::new(),
            interface: None,
            subnet: None,
            interval_secs: default_interval(),
            profile_policy: ProfilePolicy::default(),
            max_concurrent_profiles: default_max_concurrent(),
            scan_timeout_secs: default_scan_timeout(),
            extra_args: Vec::new(),
        }
    }
}

/// Load the `[discover]` section, falling back to defaults.
pub fn load_discover_config(cfg: &config::Config) -> DiscoverConfig {
    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "No usable [discover] section, using defaults");
            DiscoverConfig::default()
        }
    }
}
