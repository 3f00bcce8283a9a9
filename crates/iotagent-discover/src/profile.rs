//! Device profiler: detailed scan of a single host.

use std::net::Ipv4Addr;

use iotagent_core::{DeviceProfile, OpenPort, OsGuess, ProfileOutcome, ServiceInfo};

use crate::context::DiscoveryContext;
use crate::engine::{EngineHost, ScanEngine, ScanPolicy};
use crate::resolver;

/// Runs SYN/OS/version scans against one host at a time.
pub struct DeviceProfiler<E> {
    engine: E,
    ctx: DiscoveryContext,
}

impl<E: ScanEngine> DeviceProfiler<E> {
    pub fn new(engine: E, ctx: DiscoveryContext) -> Self {
        Self { engine, ctx }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Profile `ip`. Engine errors and absent hosts come back as
    /// [`ProfileOutcome::Failed`] and [`ProfileOutcome::NotFound`].
    pub async fn profile(&mut self, ip: Ipv4Addr) -> ProfileOutcome {
        let target = ip.to_string();
        tracing::info!(ip = %ip, "Performing detailed scan of device");

        let report = match self.engine.scan(&target, ScanPolicy::Profile).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(ip = %ip, error = %e, "Error performing detailed scan");
                return ProfileOutcome::Failed {
                    ip,
                    error: e.to_string(),
                };
            }
        };

        let Some(host) = report.host(&target) else {
            tracing::warn!(ip = %ip, "Device not found in detailed scan");
            return ProfileOutcome::NotFound { ip };
        };

        let mut profile = build_profile(ip, host);
        profile.hostname = resolver::resolve_hostname(&self.ctx.hostnames, ip).await;

        tracing::info!(
            ip = %ip,
            os = profile.os.as_ref().map(|os| os.name.as_str()).unwrap_or("unknown"),
            open_ports = profile.open_ports.len(),
            services = profile.services.len(),
            "Detailed scan complete"
        );

        ProfileOutcome::Found(profile)
    }
}

/// Normalize an engine host into a profile (hostname left for the caller).
pub fn build_profile(ip: Ipv4Addr, host: &EngineHost) -> DeviceProfile {
    let mut profile = DeviceProfile::new(ip, host.state);
    profile.mac_address = host.mac.clone();
    profile.os = os_guess(host);

    // BTreeMaps: protocols in `Protocol` order, ports ascending.
    for (protocol, ports) in &host.ports {
        for (&port, info) in ports {
            let service = info
                .service
                .as_deref()
                .filter(|name| !name.is_empty())
                .map(|name| ServiceInfo {
                    port,
                    protocol: protocol.clone(),
                    name: name.to_string(),
                    product: non_empty(&info.product),
                    version: non_empty(&info.version),
                });

            profile.add_port(
                OpenPort {
                    port,
                    protocol: protocol.clone(),
                    state: info.state.clone(),
                },
                service,
            );
        }
    }

    profile
}

/// Only the top-ranked match counts; its first class gives the device type.
fn os_guess(host: &EngineHost) -> Option<OsGuess> {
    let best = host.os_matches.first()?;
    Some(OsGuess {
        name: best.name.clone(),
        accuracy: best.accuracy,
        device_type: best
            .classes
            .first()
            .and_then(|c| non_empty(&c.device_type)),
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
