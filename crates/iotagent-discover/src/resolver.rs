//! Reverse hostname lookup.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

/// Reverse DNS. Failures are expected and simply yield `None`.
pub trait ReverseResolver: Send + Sync {
    fn lookup(&self, ip: Ipv4Addr) -> Option<String>;
}

/// Uses the system resolver (`getnameinfo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl ReverseResolver for SystemResolver {
    fn lookup(&self, ip: Ipv4Addr) -> Option<String> {
        match dns_lookup::lookup_addr(&IpAddr::V4(ip)) {
            // getnameinfo hands back the numeric form when there is no PTR record.
            Ok(name) if name == ip.to_string() => None,
            Ok(name) if name.is_empty() => None,
            Ok(name) => Some(name),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Reverse lookup failed");
                None
            }
        }
    }
}

/// Run a lookup on the blocking pool. Never fails.
pub async fn resolve_hostname(resolver: &Arc<dyn ReverseResolver>, ip: Ipv4Addr) -> Option<String> {
    let resolver = Arc::clone(resolver);
    match tokio::task::spawn_blocking(move || resolver.lookup(ip)).await {
        Ok(name) => name,
        Err(e) => {
            tracing::debug!(ip = %ip, error = %e, "Reverse lookup task aborted");
            None
        }
    }
}

/// Look up several addresses concurrently. Results keep the input order.
pub async fn resolve_all(
    resolver: &Arc<dyn ReverseResolver>,
    ips: &[Ipv4Addr],
) -> Vec<Option<String>> {
    let handles: Vec<_> = ips
        .iter()
        .map(|&ip| {
            let resolver = Arc::clone(resolver);
            tokio::task::spawn_blocking(move || resolver.lookup(ip))
        })
        .collect();

    let mut names = Vec::with_capacity(handles.len());
    for handle in handles {
        names.push(handle.await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Reverse lookup task aborted");
            None
        }));
    }
    names
}
