//! Nmap process wrapper.
//!
//! Executes nmap as a child process via `tokio::process::Command` and
//! parses the XML output into an [`EngineReport`].

use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::DiscoverConfig;
use crate::engine::{EngineFactory, EngineReport, ScanEngine, ScanPolicy};
use crate::error::{DiscoverError, Result};
use crate::nmap_xml;

/// Wrapper around the nmap binary. One instance runs one scan at a time.
#[derive(Debug, Clone)]
pub struct NmapScanner {
    nmap_path: String,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
}

impl NmapScanner {
    pub fn new(nmap_path: &str) -> Self {
        Self {
            nmap_path: nmap_path.to_string(),
            extra_args: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &DiscoverConfig) -> Self {
        Self {
            nmap_path: config.nmap_path.clone(),
            extra_args: config.extra_args.clone(),
            timeout: config.scan_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Verify nmap is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String> {
        let output = Command::new(&self.nmap_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        String::from_utf8(output.stdout).map_err(|e| DiscoverError::XmlParse(e.to_string()))
    }

    fn spawn_error(&self, err: io::Error) -> DiscoverError {
        match err.kind() {
            io::ErrorKind::NotFound => DiscoverError::NmapNotFound {
                path: self.nmap_path.clone(),
            },
            _ => DiscoverError::Io(err),
        }
    }

    fn command(&self, target: &str, policy: ScanPolicy) -> Command {
        let mut cmd = Command::new(&self.nmap_path);
        cmd.args(policy.nmap_flags())
            .args(&self.extra_args)
            .arg("-oX")
            .arg("-")
            .arg("--noninteractive")
            .arg(target)
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, target: &str, policy: ScanPolicy) -> Result<std::process::Output> {
        let output = self.command(target, policy).output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
                DiscoverError::Timeout {
                    target: target.to_string(),
                    secs: limit.as_secs(),
                }
            })?,
            None => output.await,
        };

        output.map_err(|e| self.spawn_error(e))
    }
}

#[async_trait]
impl ScanEngine for NmapScanner {
    /// Nmap is invoked with `-oX -` to write XML to stdout. Dropping the
    /// future (timeout, shutdown) kills the child.
    async fn scan(&mut self, target: &str, policy: ScanPolicy) -> Result<EngineReport> {
        // Targets come from config and the CLI; never let one read as a flag.
        if target.is_empty() || target.starts_with('-') {
            return Err(DiscoverError::InvalidTarget(target.to_string()));
        }

        let start = Instant::now();
        tracing::debug!(target = %target, policy = ?policy, "Starting nmap scan");

        let output = self.run(target, policy).await?;
        let duration = start.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DiscoverError::NmapFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let report = nmap_xml::parse_nmap_xml(&output.stdout)?.into_report();
        tracing::debug!(
            target = %target,
            hosts = report.hosts.len(),
            hosts_up = report.hosts.iter().filter(|h| h.is_up()).count(),
            duration_ms = duration.as_millis(),
            "Nmap scan complete"
        );

        Ok(report)
    }
}

/// Hands out independent `NmapScanner` instances.
#[derive(Debug, Clone)]
pub struct NmapScannerFactory {
    template: NmapScanner,
}

impl NmapScannerFactory {
    pub fn new(template: NmapScanner) -> Self {
        Self { template }
    }
}

impl EngineFactory for NmapScannerFactory {
    type Engine = NmapScanner;

    fn create(&self) -> NmapScanner {
        self.template.clone()
    }
}
