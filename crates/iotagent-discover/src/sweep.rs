//! Sweep scanner: find live hosts on a subnet.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use iotagent_core::{DeviceSummary, HostStatus, SweepOutcome};

use crate::context::DiscoveryContext;
use crate::engine::{ScanEngine, ScanPolicy};
use crate::resolver;

/// Runs presence-only scans through an exclusively owned engine.
pub struct SweepScanner<E> {
    engine: E,
    ctx: DiscoveryContext,
}

impl<E: ScanEngine> SweepScanner<E> {
    pub fn new(engine: E, ctx: DiscoveryContext) -> Self {
        Self { engine, ctx }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Sweep `subnet`, or the primary interface's subnet when `None`.
    ///
    /// Never fails outright: an engine error becomes [`SweepOutcome::Failed`]
    /// with no devices. Devices keep the engine's report order.
    pub async fn sweep(&mut self, subnet: Option<&str>) -> SweepOutcome {
        let subnet = match subnet {
            Some(s) => s.to_string(),
            None => match self.ctx.subnets.resolve(None) {
                Ok(resolved) => resolved.to_string(),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot determine subnet to scan");
                    return SweepOutcome::Failed {
                        subnet: String::new(),
                        error: e.to_string(),
                    };
                }
            },
        };

        tracing::info!(subnet = %subnet, "Scanning network");

        let report = match self.engine.scan(&subnet, ScanPolicy::Sweep).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(subnet = %subnet, error = %e, "Error scanning network");
                return SweepOutcome::Failed {
                    subnet,
                    error: e.to_string(),
                };
            }
        };

        let mut seen = HashSet::new();
        let up: Vec<(Ipv4Addr, Option<String>)> = report
            .hosts
            .into_iter()
            .filter(|h| h.is_up())
            .filter_map(|h| match h.address.parse::<Ipv4Addr>() {
                Ok(ip) => Some((ip, h.mac)),
                Err(_) => {
                    tracing::debug!(address = %h.address, "Skipping non-IPv4 host");
                    None
                }
            })
            .filter(|(ip, _)| seen.insert(*ip))
            .collect();

        let ips: Vec<Ipv4Addr> = up.iter().map(|(ip, _)| *ip).collect();
        let hostnames = resolver::resolve_all(&self.ctx.hostnames, &ips).await;

        let devices: Vec<DeviceSummary> = up
            .into_iter()
            .zip(hostnames)
            .map(|((ip, mac_address), hostname)| DeviceSummary {
                ip,
                hostname,
                status: HostStatus::Up,
                mac_address,
            })
            .collect();

        tracing::info!(
            subnet = %subnet,
            devices = devices.len(),
            "Found {} devices on the network",
            devices.len()
        );

        SweepOutcome::Completed { subnet, devices }
    }
}
