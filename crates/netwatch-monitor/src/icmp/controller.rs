//! The ICMP probing controller
//!
//! Owns the raw socket and the list of in-flight probes, multiplexing
//! echo request/reply cycles for every monitored host. A driver task
//! services the sweep timer and socket readiness while at least one probe
//! is active; when the list drains the task exits and the socket is
//! closed, to be re-created by the next insert.

use super::probe::{round_trip, Outcome, Probe, ProbeReport, Timings, WorkerId};
use netwatch_common::{Error, Result};
use netwatch_net::{
    build_echo_request, monotonic_micros, parse_datagram, EchoTransport, IcmpKind, RawIcmpSocket,
    ECHO_PACKET_LEN,
};
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Opens the transport on the empty-to-active transition
pub type SocketFactory = dyn Fn() -> io::Result<Arc<dyn EchoTransport>> + Send + Sync;

/// Construction knobs; `Default` wires up the real raw socket
pub struct ControllerOptions {
    /// Called when the first probe is inserted
    pub socket_factory: Box<SocketFactory>,

    /// Identifier stamped into outgoing packets and required on receives
    pub identifier: u16,

    /// Sweep granularity
    pub tick_period: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            socket_factory: Box::new(|| {
                RawIcmpSocket::new().map(|s| Arc::new(s) as Arc<dyn EchoTransport>)
            }),
            identifier: std::process::id() as u16,
            tick_period: Duration::from_millis(1000),
        }
    }
}

/// Handle to the probing engine; clones share one probe table and socket
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

struct Shared {
    options: ControllerOptions,
    table: Mutex<Table>,
}

struct Table {
    probes: Vec<Probe>,
    next_correlation: u16,
    active: Option<Active>,
}

/// Live socket and driver; present exactly while `probes` is non-empty
struct Active {
    transport: Arc<dyn EchoTransport>,
    cancel: CancellationToken,
}

impl Table {
    /// Next correlation id, skipping values still in flight
    fn allocate_correlation(&mut self) -> u16 {
        loop {
            let id = self.next_correlation;
            self.next_correlation = self.next_correlation.wrapping_add(1);
            if !self.probes.iter().any(|p| p.correlation() == id) {
                return id;
            }
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    /// Controller backed by the real raw socket
    pub fn new() -> Self {
        Self::with_options(ControllerOptions::default())
    }

    pub fn with_options(options: ControllerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                table: Mutex::new(Table {
                    probes: Vec::new(),
                    // Random start so replies meant for a previous
                    // incarnation of this process never match fresh probes
                    next_correlation: rand::random(),
                    active: None,
                }),
            }),
        }
    }

    /// Number of in-flight probes
    pub fn active_probes(&self) -> usize {
        self.table().probes.len()
    }

    /// True while the driver task and socket are up
    pub fn is_listening(&self) -> bool {
        self.table().active.is_some()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.shared
            .table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a probe for `owner` and send its first packet.
    ///
    /// The first insert after an idle period opens the socket and starts
    /// the driver; a factory failure aborts the insert and leaves the
    /// controller stopped.
    pub(crate) fn insert(
        &self,
        owner: WorkerId,
        target: IpAddr,
        timings: Timings,
        reply: oneshot::Sender<ProbeReport>,
    ) -> Result<()> {
        let target = match target {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => return Err(Error::UnsupportedFamily),
        };

        let mut table = self.table();

        if table.probes.iter().any(|p| p.owner() == owner) {
            return Err(Error::ProbeBusy);
        }

        if table.active.is_none() {
            let transport = (self.shared.options.socket_factory)()?;
            let cancel = CancellationToken::new();
            debug!("Enabling listener");
            tokio::spawn(drive(
                self.clone(),
                Arc::clone(&transport),
                cancel.clone(),
            ));
            table.active = Some(Active { transport, cancel });
        }

        let correlation = table.allocate_correlation();
        let mut probe = Probe::new(owner, target, correlation, timings, reply);

        let transport = table
            .active
            .as_ref()
            .map(|active| Arc::clone(&active.transport))
            .ok_or_else(|| Error::Config("listener unexpectedly stopped".into()))?;

        // First packet goes out immediately
        match send_probe(&*transport, self.shared.options.identifier, &mut probe) {
            SendOutcome::Sent | SendOutcome::RetryLater => table.probes.push(probe),
            SendOutcome::Unreachable => {
                probe.resolve(Outcome::NetworkUnreachable, IpAddr::V4(target));
            }
        }

        if table.probes.is_empty() {
            stop_locked(&mut table);
        }

        Ok(())
    }

    /// Cancel any probe owned by `owner`; no-op when none exists
    pub(crate) fn remove(&self, owner: WorkerId) {
        let mut table = self.table();
        table.probes.retain(|p| p.owner() != owner);

        if table.probes.is_empty() {
            stop_locked(&mut table);
        }
    }

    /// One timer pass over every probe, in insertion order: expiry first,
    /// then retransmission. Returns false once the table went idle.
    fn sweep(&self, transport: &dyn EchoTransport) -> bool {
        let mut table = self.table();
        let now = Instant::now();
        let ident = self.shared.options.identifier;

        let probes = std::mem::take(&mut table.probes);
        let mut kept = Vec::with_capacity(probes.len());

        for mut probe in probes {
            // Expiry wins over retransmission when both are due
            if probe.expired(now) {
                debug!(host = %probe.target(), "probe timed out");
                let from = IpAddr::V4(probe.target());
                probe.resolve(Outcome::Timeout, from);
                continue;
            }

            if probe.due(now) {
                if let SendOutcome::Unreachable = send_probe(transport, ident, &mut probe) {
                    let from = IpAddr::V4(probe.target());
                    probe.resolve(Outcome::NetworkUnreachable, from);
                    continue;
                }
            }

            kept.push(probe);
        }

        table.probes = kept;

        if table.probes.is_empty() {
            trace!("no more probes, disabling listener");
            stop_locked(&mut table);
            return false;
        }
        true
    }

    /// Dispatch one received datagram; returns false once the table went
    /// idle.
    fn on_datagram(&self, datagram: &[u8], from: IpAddr) -> bool {
        let mut table = self.table();

        let Some((kind, payload)) = parse_datagram(datagram, self.shared.options.identifier)
        else {
            return true;
        };

        trace!(
            correlation = payload.correlation,
            sequence = payload.sequence,
            %from,
            "ICMP response"
        );

        let Some(index) = table
            .probes
            .iter()
            .position(|p| p.correlation() == payload.correlation)
        else {
            // Stale or foreign: the probe may have resolved already
            trace!(
                correlation = payload.correlation,
                "no probe waiting for this response"
            );
            return true;
        };

        let outcome = match kind {
            // Echo of our own outgoing request; the reply is still to come
            IcmpKind::EchoRequest => None,
            IcmpKind::EchoReply => Some(Outcome::EchoReply {
                rtt: round_trip(&payload, monotonic_micros()),
            }),
            IcmpKind::DestinationUnreachable => Some(Outcome::DestinationUnreachable),
            IcmpKind::TimeExceeded => Some(Outcome::TimeExceeded),
            IcmpKind::Other(value) => {
                warn!(value, %from, "unexpected ICMP response type");
                None
            }
        };

        if let Some(outcome) = outcome {
            let probe = table.probes.remove(index);
            probe.resolve(outcome, from);
        }

        if table.probes.is_empty() {
            trace!("no more probes, disabling listener");
            stop_locked(&mut table);
            return false;
        }
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let table = match self.table.get_mut() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        stop_locked(table);
    }
}

/// Tear down the driver and socket; the next insert starts them afresh
fn stop_locked(table: &mut Table) {
    if let Some(active) = table.active.take() {
        active.cancel.cancel();
        debug!("Listener disabled");
    }
}

enum SendOutcome {
    Sent,
    /// Transient failure; the probe stays and retries on the next sweep
    RetryLater,
    Unreachable,
}

fn send_probe(transport: &dyn EchoTransport, ident: u16, probe: &mut Probe) -> SendOutcome {
    let payload = probe.next_payload(Instant::now());

    let mut buffer = [0u8; ECHO_PACKET_LEN];
    let size = match build_echo_request(&mut buffer, ident, &payload) {
        Ok(size) => size,
        Err(e) => {
            error!(host = %probe.target(), "failed to build echo request: {e}");
            return SendOutcome::RetryLater;
        }
    };

    trace!(
        correlation = payload.correlation,
        sequence = payload.sequence,
        host = %probe.target(),
        "sending echo request"
    );

    match transport.send_to(&buffer[..size], probe.target()) {
        Ok(_) => SendOutcome::Sent,
        Err(e) if e.kind() == io::ErrorKind::NetworkUnreachable => {
            debug!(host = %probe.target(), "network is unreachable");
            SendOutcome::Unreachable
        }
        Err(e) => {
            warn!(host = %probe.target(), "error sending echo request: {e}");
            SendOutcome::RetryLater
        }
    }
}

/// Services the sweep timer and socket readiness for the active period
async fn drive(
    controller: Controller,
    transport: Arc<dyn EchoTransport>,
    cancel: CancellationToken,
) {
    let mut ticker = interval(controller.shared.options.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buffer = [0u8; 2048];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !controller.sweep(&*transport) {
                    break;
                }
            }
            received = transport.recv_from(&mut buffer) => match received {
                Ok((size, from)) => {
                    if !controller.on_datagram(&buffer[..size], from) {
                        break;
                    }
                }
                Err(e) => error!("error receiving ICMP packet: {e}"),
            },
        }
    }

    trace!("ICMP driver stopped");
}
