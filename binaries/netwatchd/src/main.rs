//! Netwatch - network health monitoring daemon
//!
//! Periodically checks the reachability of the configured hosts over ICMP
//! echo, optionally the default gateway and the link state of the local
//! interfaces, and logs every status transition.

use anyhow::Result;
use clap::Parser;
use netwatch_common::logging::{init_logging, LogConfig};
use netwatch_common::{MonitorConfig, VERSION};
use netwatch_monitor::icmp::Controller;
use netwatch_monitor::{GatewayAgent, HealthCheck, HostAgent, HostTarget, NicAgent};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Netwatch - network health monitoring daemon
#[derive(Parser, Debug)]
#[command(
    name = "netwatchd",
    version = VERSION,
    about = "Watches host reachability, default gateway and interface link state",
    long_about = None
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/netwatch/config.toml")]
    config: PathBuf,

    /// Log directory (defaults to stdout)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first so its logging section can apply; load
    // errors go to stderr through the anyhow return.
    let (config, config_found) = if args.config.exists() {
        (MonitorConfig::from_file(&args.config)?, true)
    } else {
        (MonitorConfig::default(), false)
    };

    // CLI flags override the configuration file
    init_logging(LogConfig {
        log_dir: args.log_dir.or_else(|| config.logging.log_dir.clone()),
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        json_format: false,
    })?;

    info!("Netwatch v{}", VERSION);

    if !config_found {
        warn!(
            "Configuration file {} not found, using defaults",
            args.config.display()
        );
    }

    // Probing needs a raw ICMP socket. Refuse to start without the
    // capability; debug builds keep going so local runs can at least
    // exercise the collaborators.
    match netwatch_net::has_net_raw() {
        Ok(true) => debug!("CAP_NET_RAW is available"),
        Ok(false) => {
            if cfg!(debug_assertions) {
                warn!("CAP_NET_RAW not available, ICMP probing will fail");
            } else {
                anyhow::bail!(
                    "raw network capability required: run as root or grant CAP_NET_RAW"
                );
            }
        }
        Err(e) => warn!("Could not inspect capabilities: {e}"),
    }

    if config.hosts.is_empty() && !config.monitor.watch_gateway && !config.monitor.watch_interfaces
    {
        warn!("No hosts configured, nothing to monitor");
    }

    let controller = Controller::new();
    let check_interval = Duration::from_secs(config.monitor.check_interval);
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    for host in &config.hosts {
        info!(
            host = %host.name,
            addr = %host.host,
            timeout_s = host.icmp_timeout,
            interval_s = host.icmp_interval,
            "watching host"
        );
        let agent = HostAgent::new(
            &controller,
            host.name.clone(),
            HostTarget::parse(&host.host),
            host.timeout(),
            host.interval(),
        );
        tasks.push(tokio::spawn(watch(agent, check_interval, cancel.clone())));
    }

    if config.monitor.watch_gateway {
        info!("watching default gateway");
        tasks.push(tokio::spawn(watch(
            GatewayAgent::new(&controller),
            check_interval,
            cancel.clone(),
        )));
    }

    if config.monitor.watch_interfaces {
        info!("watching interface link state");
        tasks.push(tokio::spawn(watch(NicAgent, check_interval, cancel.clone())));
    }

    // Keep CAP_NET_RAW only; everything else is shed once running
    if let Err(e) = netwatch_net::restrict_capabilities() {
        warn!("Could not restrict capabilities: {e}");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

/// Run one agent on its period forever, logging status transitions
async fn watch<A: HealthCheck + 'static>(
    mut agent: A,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<&'static str> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match agent.check().await {
            Ok(report) => {
                let rtt_ms = report.rtt.map(|rtt| rtt.as_secs_f64() * 1000.0);
                let changed = last != Some(report.status.name);
                last = Some(report.status.name);

                if changed {
                    info!(
                        agent = agent.name(),
                        status = report.status.name,
                        level = %report.status.level,
                        address = ?report.address,
                        rtt_ms,
                        detail = report.detail.as_deref(),
                        "{}",
                        report.status.summary
                    );
                } else {
                    debug!(
                        agent = agent.name(),
                        status = report.status.name,
                        rtt_ms,
                        "state unchanged"
                    );
                }
            }
            Err(e) => error!(agent = agent.name(), "check failed: {e}"),
        }
    }

    debug!(agent = agent.name(), "watcher stopped");
}
