//! Monitoring agents built from the collaborators

use crate::dns;
use crate::gateway;
use crate::icmp::{Controller, Outcome, Worker};
use crate::nic::{self, LinkState};
use crate::traits::{HealthCheck, HealthReport};
use async_trait::async_trait;
use netwatch_common::{Level, Status};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// What a host agent probes: a fixed address, or a name resolved on
/// every check pass so address changes are picked up.
#[derive(Debug, Clone)]
pub enum HostTarget {
    Address(IpAddr),
    Hostname(String),
}

impl HostTarget {
    /// Parse a configuration string as an address, falling back to a
    /// hostname.
    pub fn parse(value: &str) -> Self {
        match value.parse::<IpAddr>() {
            Ok(addr) => HostTarget::Address(addr),
            Err(_) => HostTarget::Hostname(value.to_string()),
        }
    }
}

/// ICMP reachability of one monitored host
pub struct HostAgent {
    name: String,
    target: HostTarget,
    worker: Worker,
}

impl HostAgent {
    pub fn new(
        controller: &Controller,
        name: impl Into<String>,
        target: HostTarget,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            worker: Worker::with_timings(controller, timeout, interval),
        }
    }

    /// Pick the probe address. IPv4 only; a v6-only host has no usable
    /// address here.
    async fn address(&self) -> Option<IpAddr> {
        match &self.target {
            HostTarget::Address(addr) => Some(*addr),
            HostTarget::Hostname(name) => match dns::resolve_host(name).await {
                Ok(addresses) => addresses.iter().find(|a| a.is_ipv4()).copied(),
                Err(err) => {
                    debug!(host = %self.name, %err, "resolution failed");
                    None
                }
            },
        }
    }
}

#[async_trait]
impl HealthCheck for HostAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&mut self) -> anyhow::Result<HealthReport> {
        let Some(address) = self.address().await else {
            // No usable address: a status, not a check failure
            return Ok(HealthReport {
                status: Outcome::Invalid.status(),
                address: None,
                rtt: None,
                detail: None,
            });
        };

        let report = self.worker.probe(address).await?;
        Ok(HealthReport {
            status: report.outcome.status(),
            address: Some(report.from),
            rtt: match report.outcome {
                Outcome::EchoReply { rtt } => Some(rtt),
                _ => None,
            },
            detail: None,
        })
    }
}

/// Reachability of the default gateway
pub struct GatewayAgent {
    worker: Worker,
}

impl GatewayAgent {
    pub fn new(controller: &Controller) -> Self {
        Self {
            worker: Worker::new(controller),
        }
    }
}

#[async_trait]
impl HealthCheck for GatewayAgent {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn check(&mut self) -> anyhow::Result<HealthReport> {
        let Some(route) = gateway::default_gateway()? else {
            return Ok(HealthReport {
                status: Outcome::Invalid.status(),
                address: None,
                rtt: None,
                detail: Some("no default route".to_string()),
            });
        };

        let report = self.worker.probe(IpAddr::V4(route.gateway)).await?;
        Ok(HealthReport {
            status: report.outcome.status(),
            address: Some(report.from),
            rtt: match report.outcome {
                Outcome::EchoReply { rtt } => Some(rtt),
                _ => None,
            },
            detail: Some(route.interface),
        })
    }
}

/// Link state across the physical network interfaces
pub struct NicAgent;

#[async_trait]
impl HealthCheck for NicAgent {
    fn name(&self) -> &str {
        "interfaces"
    }

    async fn check(&mut self) -> anyhow::Result<HealthReport> {
        let interfaces = nic::interfaces()?;
        let physical: Vec<_> = interfaces.iter().filter(|i| !i.loopback).collect();
        let up = physical
            .iter()
            .filter(|i| i.state == LinkState::Up)
            .count();

        let status = if physical.is_empty() {
            Status {
                name: "no-interfaces",
                level: Level::Error,
                label: "No interfaces",
                summary: "No physical network interface found",
            }
        } else if up == 0 {
            Status {
                name: "link-down",
                level: Level::Error,
                label: "Offline",
                summary: "No network interface has an active link",
            }
        } else {
            Status {
                name: "link-up",
                level: Level::Ready,
                label: "Online",
                summary: "At least one network interface has an active link",
            }
        };

        let detail = physical
            .iter()
            .map(|i| format!("{}:{}", i.name, i.state))
            .collect::<Vec<_>>()
            .join(" ");

        Ok(HealthReport {
            status,
            address: None,
            rtt: None,
            detail: Some(detail),
        })
    }
}
