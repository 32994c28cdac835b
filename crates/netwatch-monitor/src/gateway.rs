//! Default-gateway discovery
//!
//! Reads the kernel routing table from `/proc/net/route` and returns the
//! first usable default (0.0.0.0/0) gateway entry.

use std::io;
use std::net::Ipv4Addr;
use tracing::trace;

const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;

/// A default route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRoute {
    /// Interface the route goes out of
    pub interface: String,

    pub gateway: Ipv4Addr,
}

/// Detect the default IPv4 gateway, if the host has one
pub fn default_gateway() -> io::Result<Option<GatewayRoute>> {
    let table = std::fs::read_to_string("/proc/net/route")?;
    Ok(parse_route_table(&table))
}

fn parse_route_table(table: &str) -> Option<GatewayRoute> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }

        let Ok(destination) = u32::from_str_radix(fields[1], 16) else {
            continue;
        };
        let Ok(gateway) = u32::from_str_radix(fields[2], 16) else {
            continue;
        };
        let Ok(flags) = u32::from_str_radix(fields[3], 16) else {
            continue;
        };

        if destination != 0 || flags & (RTF_UP | RTF_GATEWAY) != (RTF_UP | RTF_GATEWAY) {
            continue;
        }

        // Fields are hex dumps of the little-endian in-memory value
        let gateway = Ipv4Addr::from(gateway.swap_bytes());
        trace!(interface = fields[0], %gateway, "default route");

        return Some(GatewayRoute {
            interface: fields[0].to_string(),
            gateway,
        });
    }

    None
}
