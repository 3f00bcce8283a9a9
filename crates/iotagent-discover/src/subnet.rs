//! Subnet resolution: which CIDR to sweep.

use std::net::Ipv4Addr;

use iotagent_core::{NetworkInterface, Subnet};

use crate::error::{DiscoverError, Result};
use crate::interfaces::InterfaceInventory;

/// Number of set bits in the mask.
pub fn prefix_length(netmask: Ipv4Addr) -> u8 {
    u32::from(netmask).count_ones() as u8
}

/// True when the mask's one-bits are all left-aligned (255.255.255.0, not 255.0.255.0).
pub fn is_contiguous(netmask: Ipv4Addr) -> bool {
    let bits = u32::from(netmask);
    bits.leading_ones() == bits.count_ones()
}

/// Network of an interface: `ip & netmask` with the mask's bit count as
/// prefix. Non-contiguous masks have no CIDR form and are rejected.
pub fn subnet_for(iface: &NetworkInterface) -> Result<Subnet> {
    if !is_contiguous(iface.netmask) {
        return Err(DiscoverError::InvalidNetmask {
            interface: iface.name.clone(),
            netmask: iface.netmask,
        });
    }

    let network = Ipv4Addr::from(u32::from(iface.ip) & u32::from(iface.netmask));
    Ok(Subnet::new(network, prefix_length(iface.netmask))?)
}

/// Picks the subnet to sweep from the local interfaces.
#[derive(Clone)]
pub struct SubnetResolver {
    inventory: InterfaceInventory,
}

impl SubnetResolver {
    pub fn new(inventory: InterfaceInventory) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &InterfaceInventory {
        &self.inventory
    }

    /// Subnet of `iface`, or of the primary interface when none is given.
    /// Falls back to 192.168.1.0/24 when the host has no interfaces at all.
    pub fn resolve(&self, iface: Option<&NetworkInterface>) -> Result<Subnet> {
        let primary;
        let iface = match iface {
            Some(iface) => iface,
            None => match self.inventory.primary_interface() {
                Some(found) => {
                    primary = found;
                    &primary
                }
                None => {
                    tracing::warn!(
                        fallback = %Subnet::FALLBACK,
                        "No network interface found, using default subnet"
                    );
                    return Ok(Subnet::FALLBACK);
                }
            },
        };

        let subnet = subnet_for(iface)?;
        tracing::debug!(interface = %iface.name, subnet = %subnet, "Resolved subnet");
        Ok(subnet)
    }
}
