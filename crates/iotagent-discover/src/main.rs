//! CLI entry point for the IoT agent.

use std::net::Ipv4Addr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use iotagent_core::config::{load_connection_config, load_layered, DEFAULT_CONFIG_PREFIX};
use iotagent_discover::config::{load_discover_config, DiscoverConfig, ProfilePolicy};
use iotagent_discover::report::{JsonLinesReporter, LogReporter, Reporter};
use iotagent_discover::scanner::{NmapScanner, NmapScannerFactory};
use iotagent_discover::{DiscoveryContext, DiscoveryOrchestrator};

/// Namespace for agent IDs derived from the hostname.
const AGENT_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x5e, 0x2a, 0x8b, 0x47, 0x4d, 0x0e, 0x9a, 0x61, 0x27, 0xc4, 0x0b, 0xd3, 0x6e, 0x95,
]);

#[derive(Parser)]
#[command(name = "iot-agent")]
#[command(about = "IoT Platform Agent: local network device discovery")]
struct Cli {
    /// Run one discovery cycle and exit.
    #[arg(long)]
    discover: bool,

    /// Run periodic discovery until interrupted (default).
    #[arg(long)]
    monitor: bool,

    /// Profile a single host and exit.
    #[arg(long, value_name = "IP")]
    profile: Option<Ipv4Addr>,

    /// Print local IPv4 interfaces and exit.
    #[arg(long)]
    list_interfaces: bool,

    /// Subnet to sweep (CIDR), overrides interface selection.
    #[arg(short, long)]
    subnet: Option<String>,

    /// Interface whose subnet is swept.
    #[arg(short, long)]
    interface: Option<String>,

    /// Profile every host after each sweep instead of only new ones.
    #[arg(long)]
    profile_all: bool,

    /// Write events as JSON lines on stdout instead of logging them.
    #[arg(long)]
    json_events: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Human-readable logs instead of JSON.
    #[arg(long)]
    pretty: bool,

    /// Install as a system service.
    #[arg(long)]
    install_service: bool,

    /// Config file prefix.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PREFIX)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.pretty);

    if cli.install_service {
        tracing::info!("Installing agent as a service...");
        println!("Service installation not yet implemented");
        return Ok(());
    }

    let ctx = DiscoveryContext::system();

    if cli.list_interfaces {
        for iface in ctx.inventory().list_interfaces() {
            println!("{}\t{}\t{}", iface.name, iface.ip, iface.netmask);
        }
        return Ok(());
    }

    let layered = load_layered(&cli.config)?;
    let connection = load_connection_config(&layered);
    let discover_config = apply_overrides(load_discover_config(&layered), &cli);
    discover_config.validate()?;
    let agent_id = resolve_agent_id(&discover_config)?;

    tracing::info!(
        backend_url = %connection.backend_url,
        auth_token_set = connection.has_token(),
        agent_id = %agent_id,
        "Agent initialized"
    );

    let scanner = NmapScanner::from_config(&discover_config);
    let version = scanner.verify_installation().await?;
    let version = version.lines().next().unwrap_or_default().trim();
    tracing::info!(nmap_version = %version, "Nmap verified");

    let reporter: Arc<dyn Reporter> = if cli.json_events {
        Arc::new(JsonLinesReporter)
    } else {
        Arc::new(LogReporter)
    };

    let mut orchestrator = DiscoveryOrchestrator::new(
        discover_config,
        NmapScannerFactory::new(scanner),
        ctx,
        reporter,
        agent_id,
    );

    if let Some(ip) = cli.profile {
        let outcome = orchestrator.profile_one(ip).await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if cli.discover {
        let summary = orchestrator.run_cycle().await;
        println!("{}", serde_json::to_string_pretty(&summary.sweep)?);
        for outcome in &summary.profiles {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
    } else {
        if !cli.monitor {
            tracing::debug!("No mode given, running monitor");
        }
        tracing::info!("IoT Platform Agent starting...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Agent shutting down..."),
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
            }
            let _ = shutdown_tx.send(true);
        });

        orchestrator.run(shutdown_rx).await?;
        tracing::info!("Agent terminated");
    }

    Ok(())
}

fn init_logging(verbose: bool, pretty: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if pretty {
        fmt().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).json().init();
    }
}

fn apply_overrides(mut config: DiscoverConfig, cli: &Cli) -> DiscoverConfig {
    if let Some(subnet) = &cli.subnet {
        config.subnet = Some(subnet.clone());
    }
    if let Some(interface) = &cli.interface {
        config.interface = Some(interface.clone());
    }
    if cli.profile_all {
        config.profile_policy = ProfilePolicy::All;
    }
    config
}

/// Configured agent ID, or one derived from the hostname so it is stable
/// across restarts.
fn resolve_agent_id(config: &DiscoverConfig) -> anyhow::Result<Uuid> {
    if !config.agent_id.is_empty() {
        return Ok(Uuid::parse_str(&config.agent_id)?);
    }
    let hostname = dns_lookup::get_hostname()?;
    Ok(Uuid::new_v5(&AGENT_NS, hostname.as_bytes()))
}
