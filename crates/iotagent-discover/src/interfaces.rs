//! Local interface inventory.
//!
//! Enumerates IPv4 bindings of local interfaces. Enumeration is best effort:
//! an interface that fails to report its addresses is logged and skipped.

use std::net::Ipv4Addr;
use std::sync::Arc;

use iotagent_core::NetworkInterface;
use network_interface::{Addr, NetworkInterface as OsInterface, NetworkInterfaceConfig};

use crate::error::{DiscoverError, Result};

/// IPv4 `(address, netmask)` pairs bound to one interface.
pub type Ipv4Bindings = Vec<(Ipv4Addr, Option<Ipv4Addr>)>;

/// One interface from a single enumeration pass.
#[derive(Debug)]
pub struct InterfaceEntry {
    pub name: String,
    /// Bindings, or why they could not be read for this interface alone.
    pub ipv4: Result<Ipv4Bindings>,
}

impl InterfaceEntry {
    pub fn new(name: impl Into<String>, ipv4: Result<Ipv4Bindings>) -> Self {
        Self {
            name: name.into(),
            ipv4,
        }
    }
}

/// Source of local interfaces and their IPv4 bindings.
pub trait InterfaceProvider: Send + Sync {
    /// Every interface in OS order, one entry per name. An `Err` means
    /// nothing could be enumerated at all.
    fn interfaces(&self) -> Result<Vec<InterfaceEntry>>;
}

/// Interfaces as reported by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceProvider for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceEntry>> {
        let raw = OsInterface::show().map_err(|e| DiscoverError::Interface {
            name: "*".to_string(),
            reason: e.to_string(),
        })?;

        Ok(group_by_name(raw.into_iter().map(|iface| {
            let v4: Ipv4Bindings = iface
                .addr
                .iter()
                .filter_map(|addr| match addr {
                    Addr::V4(v4) => Some((v4.ip, v4.netmask)),
                    Addr::V6(_) => None,
                })
                .collect();
            (iface.name, v4)
        })))
    }
}

/// Merge per-record bindings into one entry per name, first-seen order.
/// The OS reports a record per address, so names repeat.
fn group_by_name(
    records: impl IntoIterator<Item = (String, Ipv4Bindings)>,
) -> Vec<InterfaceEntry> {
    let mut entries: Vec<InterfaceEntry> = Vec::new();
    for (name, bindings) in records {
        match entries.iter_mut().find(|e| e.name == name) {
            Some(InterfaceEntry { ipv4: Ok(existing), .. }) => existing.extend(bindings),
            Some(_) => {}
            None => entries.push(InterfaceEntry::new(name, Ok(bindings))),
        }
    }
    entries
}

/// Best-effort view of the host's IPv4 interfaces.
#[derive(Clone)]
pub struct InterfaceInventory {
    provider: Arc<dyn InterfaceProvider>,
}

impl InterfaceInventory {
    pub fn new(provider: Arc<dyn InterfaceProvider>) -> Self {
        Self { provider }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemInterfaces))
    }

    /// One record per (interface, IPv4 address). Never fails; returns what
    /// could be enumerated.
    pub fn list_interfaces(&self) -> Vec<NetworkInterface> {
        let entries = match self.provider.interfaces() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate network interfaces");
                return Vec::new();
            }
        };

        let mut interfaces = Vec::new();
        for InterfaceEntry { name, ipv4 } in entries {
            let addrs = match ipv4 {
                Ok(addrs) => addrs,
                Err(e) => {
                    tracing::error!(interface = %name, error = %e, "Error getting interface info");
                    continue;
                }
            };

            for (ip, netmask) in addrs {
                match netmask {
                    Some(netmask) => interfaces.push(NetworkInterface::new(&name, ip, netmask)),
                    None => tracing::debug!(
                        interface = %name,
                        ip = %ip,
                        "IPv4 address without netmask, skipping"
                    ),
                }
            }
        }

        interfaces
    }

    /// First non-loopback interface, else the first interface of any kind.
    pub fn primary_interface(&self) -> Option<NetworkInterface> {
        let interfaces = self.list_interfaces();
        interfaces
            .iter()
            .find(|iface| !iface.is_loopback())
            .or_else(|| interfaces.first())
            .cloned()
    }

    /// First IPv4 binding of the named interface.
    pub fn find(&self, name: &str) -> Option<NetworkInterface> {
        self.list_interfaces()
            .into_iter()
            .find(|iface| iface.name == name)
    }
}
