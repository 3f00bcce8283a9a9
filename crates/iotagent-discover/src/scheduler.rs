//! Discovery orchestration.
//!
//! One sweep per interval, followed by concurrent profiles of the hosts the
//! profile policy selects. Every scan gets its own engine from the factory;
//! a semaphore bounds how many profiles run at once.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use iotagent_core::events::{DiscoveryEvent, EventPayload};
use iotagent_core::{DeviceSummary, ProfileOutcome, SweepOutcome};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::config::{DiscoverConfig, ProfilePolicy};
use crate::context::DiscoveryContext;
use crate::engine::EngineFactory;
use crate::error::Result;
use crate::profile::DeviceProfiler;
use crate::report::Reporter;
use crate::sweep::SweepScanner;

/// What one discovery cycle produced.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub scan_id: Uuid,
    pub sweep: SweepOutcome,
    pub profiles: Vec<ProfileOutcome>,
}

/// Drives sweeps and profiles, and hands every result to the reporter.
pub struct DiscoveryOrchestrator<F> {
    config: DiscoverConfig,
    factory: Arc<F>,
    ctx: DiscoveryContext,
    reporter: Arc<dyn Reporter>,
    agent_id: Uuid,
    concurrency: Arc<Semaphore>,
    /// Hosts up in the last successful sweep.
    previous: HashSet<Ipv4Addr>,
}

impl<F> DiscoveryOrchestrator<F>
where
    F: EngineFactory + 'static,
{
    pub fn new(
        config: DiscoverConfig,
        factory: F,
        ctx: DiscoveryContext,
        reporter: Arc<dyn Reporter>,
        agent_id: Uuid,
    ) -> Self {
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_profiles.max(1)));
        Self {
            config,
            factory: Arc::new(factory),
            ctx,
            reporter,
            agent_id,
            concurrency,
            previous: HashSet::new(),
        }
    }

    /// Run cycles at the configured interval until `shutdown` flips to true
    /// or its sender is dropped. An in-flight cycle is abandoned on shutdown;
    /// its nmap children are killed when their futures drop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval().as_secs(),
            policy = ?self.config.profile_policy,
            "Discovery loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                summary = self.run_cycle() => {
                    tracing::debug!(
                        scan_id = %summary.scan_id,
                        devices = summary.sweep.devices().len(),
                        profiles = summary.profiles.len(),
                        "Discovery cycle finished"
                    );
                }
                _ = shutdown.changed() => {
                    tracing::info!("Shutdown requested during discovery cycle");
                    break;
                }
            }
        }

        tracing::info!("Discovery loop stopped");
        Ok(())
    }

    /// One sweep, then profiles per policy.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let scan_id = Uuid::new_v4();
        let sweep = self.sweep(scan_id).await;

        let targets = match &sweep {
            SweepOutcome::Completed { devices, .. } => {
                let targets =
                    hosts_to_profile(self.config.profile_policy, &self.previous, devices);
                self.previous = devices.iter().map(|d| d.ip).collect();
                targets
            }
            // Keep the previous host set so one failed sweep does not make
            // every host look new next time.
            SweepOutcome::Failed { .. } => Vec::new(),
        };

        let profiles = self.profile_many(targets).await;
        CycleSummary {
            scan_id,
            sweep,
            profiles,
        }
    }

    /// Profile a single host and report the outcome.
    pub async fn profile_one(&self, ip: Ipv4Addr) -> ProfileOutcome {
        let mut profiler = DeviceProfiler::new(self.factory.create(), self.ctx.clone());
        let outcome = profiler.profile(ip).await;
        self.emit(EventPayload::from_profile(&outcome));
        outcome
    }

    async fn sweep(&self, scan_id: Uuid) -> SweepOutcome {
        let target = match self.sweep_target() {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(error = %e, "Cannot determine subnet to scan");
                let outcome = SweepOutcome::Failed {
                    subnet: String::new(),
                    error: e.to_string(),
                };
                self.emit(EventPayload::from_sweep(scan_id, &outcome, 0));
                return outcome;
            }
        };

        self.emit(EventPayload::SweepStarted {
            scan_id,
            subnet: target.clone(),
        });

        let start = Instant::now();
        let mut scanner = SweepScanner::new(self.factory.create(), self.ctx.clone());
        let outcome = scanner.sweep(Some(&target)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.emit(EventPayload::from_sweep(scan_id, &outcome, duration_ms));
        outcome
    }

    /// Explicit subnet, else the configured interface's subnet, else the
    /// primary interface's subnet.
    fn sweep_target(&self) -> Result<String> {
        if let Some(subnet) = &self.config.subnet {
            return Ok(subnet.clone());
        }

        let iface = self.config.interface.as_deref().and_then(|name| {
            let found = self.ctx.inventory().find(name);
            if found.is_none() {
                tracing::warn!(
                    interface = %name,
                    "Configured interface has no IPv4 address, using primary"
                );
            }
            found
        });

        Ok(self.ctx.subnets.resolve(iface.as_ref())?.to_string())
    }

    async fn profile_many(&self, targets: Vec<Ipv4Addr>) -> Vec<ProfileOutcome> {
        if targets.is_empty() {
            return Vec::new();
        }

        tracing::info!(hosts = targets.len(), "Profiling devices");

        let mut tasks = JoinSet::new();
        for (idx, ip) in targets.iter().copied().enumerate() {
            let factory = Arc::clone(&self.factory);
            let ctx = self.ctx.clone();
            let semaphore = Arc::clone(&self.concurrency);

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => DeviceProfiler::new(factory.create(), ctx).profile(ip).await,
                    Err(_) => ProfileOutcome::Failed {
                        ip,
                        error: "profiling cancelled".to_string(),
                    },
                };
                (idx, outcome)
            });
        }

        let mut results: Vec<(usize, ProfileOutcome)> = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "Profile task panicked"),
            }
        }
        results.sort_by_key(|(idx, _)| *idx);

        results
            .into_iter()
            .map(|(_, outcome)| {
                self.emit(EventPayload::from_profile(&outcome));
                outcome
            })
            .collect()
    }

    fn emit(&self, payload: EventPayload) {
        self.reporter.report(&DiscoveryEvent::new(self.agent_id, payload));
    }
}

/// Hosts to profile after a successful sweep, in sweep order.
pub fn hosts_to_profile(
    policy: ProfilePolicy,
    previous: &HashSet<Ipv4Addr>,
    devices: &[DeviceSummary],
) -> Vec<Ipv4Addr> {
    match policy {
        ProfilePolicy::None => Vec::new(),
        ProfilePolicy::All => devices.iter().map(|d| d.ip).collect(),
        ProfilePolicy::NewHosts => devices
            .iter()
            .map(|d| d.ip)
            .filter(|ip| !previous.contains(ip))
            .collect(),
    }
}
