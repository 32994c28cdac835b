//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Hosts to watch, one `[[host]]` table each
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between reachability checks of each monitored host
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Watch the default gateway as an implicit host
    #[serde(default)]
    pub watch_gateway: bool,

    /// Watch the link state of the local network interfaces
    #[serde(default)]
    pub watch_interfaces: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            watch_gateway: false,
            watch_interfaces: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Display name used in logs
    pub name: String,

    /// IPv4 address or hostname to probe
    pub host: String,

    /// Seconds without a reply before the host is declared unavailable
    #[serde(default = "default_icmp_timeout")]
    pub icmp_timeout: u64,

    /// Seconds between echo request retransmissions
    #[serde(default = "default_icmp_interval")]
    pub icmp_interval: u64,
}

impl HostSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.icmp_timeout)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.icmp_interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional directory for rolling log files (stdout when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

// Default value functions
fn default_check_interval() -> u64 {
    60
}
fn default_icmp_timeout() -> u64 {
    5
}
fn default_icmp_interval() -> u64 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
