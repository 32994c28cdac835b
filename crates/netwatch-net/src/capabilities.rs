//! Linux capabilities management
//!
//! The probing engine needs CAP_NET_RAW for its raw ICMP socket; these
//! helpers gate startup on it and shed everything else once running.

use std::io;

#[cfg(target_os = "linux")]
use caps::{CapSet, Capability, CapsHashSet};

#[cfg(target_os = "linux")]
use tracing::{debug, info};

/// Check if the process has the CAP_NET_RAW capability
pub fn has_net_raw() -> io::Result<bool> {
    #[cfg(target_os = "linux")]
    {
        let effective =
            caps::read(None, CapSet::Effective).map_err(|e| io::Error::other(e.to_string()))?;
        Ok(effective.contains(&Capability::CAP_NET_RAW))
    }
    #[cfg(not(target_os = "linux"))]
    {
        // No capability API to inspect; let socket creation report
        // permission errors instead.
        Ok(true)
    }
}

/// Drop all capabilities except CAP_NET_RAW
pub fn restrict_capabilities() -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        debug!("Restricting capabilities...");

        let mut required = CapsHashSet::new();
        required.insert(Capability::CAP_NET_RAW);

        let current =
            caps::read(None, CapSet::Effective).map_err(|e| io::Error::other(e.to_string()))?;

        if !current.contains(&Capability::CAP_NET_RAW) {
            debug!("Process does not have CAP_NET_RAW, nothing to retain.");
            return Ok(());
        }

        caps::set(None, CapSet::Effective, &required)
            .map_err(|e| io::Error::other(e.to_string()))?;
        caps::set(None, CapSet::Permitted, &required)
            .map_err(|e| io::Error::other(e.to_string()))?;

        info!("Capabilities restricted to: {:?}", required);
    }

    Ok(())
}
