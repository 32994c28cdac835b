//! Per-target probe records

use netwatch_net::EchoPayload;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

/// Identity of the worker owning a probe.
///
/// A plain id instead of a back-reference: when the owning worker
/// disappears while its probe is in flight, outcome delivery fails and
/// the probe is dropped without further action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub(crate) u64);

/// Terminal result of one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target address is empty or could not be determined
    Invalid,

    /// The host answered, round-trip time attached
    EchoReply { rtt: Duration },

    /// A gateway reported it cannot reach the host's network
    DestinationUnreachable,

    /// The request was discarded in transit for being out of time
    TimeExceeded,

    /// No reply arrived within the configured timeout
    Timeout,

    /// The local stack cannot route towards the target at all
    NetworkUnreachable,
}

/// Outcome plus the address it came from, delivered once per probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: Outcome,
    pub from: IpAddr,
}

/// Timing knobs of one probe cycle
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Total time before the probe resolves as [`Outcome::Timeout`]
    pub timeout: Duration,

    /// Delay between echo request retransmissions
    pub interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(1),
        }
    }
}

/// Round-trip time from the echoed send timestamp.
///
/// Absolute difference: skew between the stamping and observing clock
/// reads must never produce a negative time.
pub(crate) fn round_trip(payload: &EchoPayload, now_micros: u64) -> Duration {
    Duration::from_micros(now_micros.abs_diff(payload.sent_micros))
}

/// A single in-flight probe, owned by the controller
pub(crate) struct Probe {
    owner: WorkerId,
    correlation: u16,
    sequence: u16,
    target: Ipv4Addr,
    interval: Duration,
    deadline: Instant,
    next_send: Instant,
    reply: oneshot::Sender<ProbeReport>,
}

impl Probe {
    pub(crate) fn new(
        owner: WorkerId,
        target: Ipv4Addr,
        correlation: u16,
        timings: Timings,
        reply: oneshot::Sender<ProbeReport>,
    ) -> Self {
        let now = Instant::now();
        Self {
            owner,
            correlation,
            sequence: 0,
            target,
            interval: timings.interval,
            deadline: now + timings.timeout,
            next_send: now,
            reply,
        }
    }

    pub(crate) fn owner(&self) -> WorkerId {
        self.owner
    }

    pub(crate) fn correlation(&self) -> u16 {
        self.correlation
    }

    pub(crate) fn target(&self) -> Ipv4Addr {
        self.target
    }

    /// True once the timeout deadline has passed
    pub(crate) fn expired(&self, now: Instant) -> bool {
        now > self.deadline
    }

    /// True when the retransmission interval has elapsed
    pub(crate) fn due(&self, now: Instant) -> bool {
        now >= self.next_send
    }

    /// Advance to the next packet: bump the sequence, stamp the clock,
    /// schedule the following retransmission.
    pub(crate) fn next_payload(&mut self, now: Instant) -> EchoPayload {
        self.sequence = self.sequence.wrapping_add(1);
        self.next_send = now + self.interval;
        EchoPayload {
            correlation: self.correlation,
            sequence: self.sequence,
            sent_micros: netwatch_net::monotonic_micros(),
        }
    }

    /// Resolve the probe, consuming it and its outcome channel.
    ///
    /// Failed delivery means the owner is gone; the probe just vanishes.
    pub(crate) fn resolve(self, outcome: Outcome, from: IpAddr) {
        if self
            .reply
            .send(ProbeReport { outcome, from })
            .is_err()
        {
            trace!(
                correlation = self.correlation,
                "probe owner is gone, dropping outcome"
            );
        }
    }
}
