//! Outcome to user-facing status mapping

use super::probe::Outcome;
use netwatch_common::{Level, Status};
use std::fmt;

impl Outcome {
    /// Status descriptor shown to users for this outcome
    pub fn status(&self) -> Status {
        match self {
            Outcome::Invalid => Status {
                name: "invalid",
                level: Level::Error,
                label: "Invalid IP",
                summary: "Unable to get a valid IP address for the host",
            },
            Outcome::EchoReply { .. } => Status {
                name: "echo-reply",
                level: Level::Ready,
                label: "Active",
                summary: "Got ICMP echo reply from host",
            },
            Outcome::DestinationUnreachable => Status {
                name: "destination-unreachable",
                level: Level::Error,
                label: "Unreachable",
                summary: "Destination unreachable, the gateway cannot reach the host network",
            },
            Outcome::TimeExceeded => Status {
                name: "time-exceeded",
                level: Level::Error,
                label: "Timeout",
                summary: "The ICMP request was discarded for being out of time",
            },
            Outcome::Timeout => Status {
                name: "timeout",
                level: Level::Error,
                label: "Unavailable",
                summary: "No ICMP response from host",
            },
            Outcome::NetworkUnreachable => Status {
                name: "network-unreachable",
                level: Level::Error,
                label: "Unreachable",
                summary: "The entire network is unreachable",
            },
        }
    }

    /// Short stable identifier, matching the status name
    pub fn as_str(&self) -> &'static str {
        self.status().name
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
