//! Health check traits

use async_trait::async_trait;
use netwatch_common::Status;
use std::net::IpAddr;
use std::time::Duration;

/// Result of one health check pass
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: Status,

    /// Address the verdict came from, when there is one
    pub address: Option<IpAddr>,

    /// Measured round-trip time, for reachability checks
    pub rtt: Option<Duration>,

    /// Free-form detail (route interface, link states, ...)
    pub detail: Option<String>,
}

/// A periodically executed health check
#[async_trait]
pub trait HealthCheck: Send {
    /// Name shown in logs
    fn name(&self) -> &str;

    /// Execute one check pass
    async fn check(&mut self) -> anyhow::Result<HealthReport>;
}
