//! Hostname resolution collaborator
//!
//! Resolution failures are ordinary values, not exceptions: callers
//! branch on the [`DnsError`] kind.

use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use thiserror::Error;
use tracing::trace;

/// Why a name failed to resolve
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    /// The name does not exist (NXDOMAIN)
    #[error("host not found")]
    NotFound,

    /// The name exists but has no address records
    #[error("no address records")]
    NoData,

    #[error("resolution timed out")]
    Timeout,

    #[error("resolver failure: {0}")]
    Failure(String),
}

impl From<ResolveError> for DnsError {
    fn from(err: ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                if *response_code == ResponseCode::NXDomain {
                    DnsError::NotFound
                } else {
                    DnsError::NoData
                }
            }
            ResolveErrorKind::Timeout => DnsError::Timeout,
            _ => DnsError::Failure(err.to_string()),
        }
    }
}

/// Resolve `name` to its addresses using the system resolver configuration
pub async fn resolve_host(name: &str) -> Result<Vec<IpAddr>, DnsError> {
    let resolver = TokioAsyncResolver::tokio_from_system_conf()
        .map_err(|e| DnsError::Failure(e.to_string()))?;

    let lookup = resolver.lookup_ip(name).await?;
    let addresses: Vec<IpAddr> = lookup.iter().collect();
    trace!(host = name, count = addresses.len(), "resolved host");

    if addresses.is_empty() {
        return Err(DnsError::NoData);
    }
    Ok(addresses)
}
