//! Integration tests for the ICMP probing engine
//!
//! The engine runs against a scripted transport: tests read the packets
//! it sends and inject the datagrams the kernel would deliver. Timer
//! behavior is exercised under tokio's paused clock.

use async_trait::async_trait;
use netwatch_common::Error;
use netwatch_monitor::icmp::{Controller, ControllerOptions, Outcome, Worker};
use netwatch_net::{
    build_echo_request, parse_datagram, EchoPayload, EchoTransport, ECHO_PACKET_LEN,
    IPV4_HEADER_LEN,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const IDENT: u16 = 0x5157;

const ECHO_REPLY: u8 = 0;
const DEST_UNREACHABLE: u8 = 3;
const ECHO_REQUEST: u8 = 8;
const TIME_EXCEEDED: u8 = 11;

/// Scripted transport: records sends, replays injected receives
struct FakeTransport {
    sent: Mutex<Vec<(Vec<u8>, Ipv4Addr)>>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, IpAddr)>>,
    unreachable: AtomicBool,
}

#[async_trait]
impl EchoTransport for FakeTransport {
    fn send_to(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::NetworkUnreachable,
                "network is unreachable",
            ));
        }
        self.sent.lock().unwrap().push((packet.to_vec(), target));
        Ok(packet.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        let mut incoming = self.incoming.lock().await;
        match incoming.recv().await {
            Some((bytes, from)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok((bytes.len(), from))
            }
            // Injector gone: behave like a silent socket
            None => std::future::pending().await,
        }
    }
}

struct Script {
    transport: Arc<FakeTransport>,
    inject: mpsc::UnboundedSender<(Vec<u8>, IpAddr)>,
}

impl Script {
    fn new() -> Self {
        let (inject, incoming) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(FakeTransport {
                sent: Mutex::new(Vec::new()),
                incoming: tokio::sync::Mutex::new(incoming),
                unreachable: AtomicBool::new(false),
            }),
            inject,
        }
    }

    /// Controller wired to this script's transport
    fn controller(&self) -> Controller {
        let transport = Arc::clone(&self.transport);
        Controller::with_options(ControllerOptions {
            socket_factory: Box::new(move || {
                Ok(Arc::clone(&transport) as Arc<dyn EchoTransport>)
            }),
            identifier: IDENT,
            tick_period: Duration::from_millis(1000),
        })
    }

    fn set_unreachable(&self, value: bool) {
        self.transport.unreachable.store(value, Ordering::Relaxed);
    }

    fn sent_count(&self) -> usize {
        self.transport.sent.lock().unwrap().len()
    }

    /// Correlation payload of the `index`-th packet the engine sent
    fn sent_payload(&self, index: usize) -> EchoPayload {
        let sent = self.transport.sent.lock().unwrap();
        let (bytes, _) = &sent[index];

        let mut datagram = vec![0u8; IPV4_HEADER_LEN];
        datagram.extend_from_slice(bytes);
        let (_, payload) = parse_datagram(&datagram, IDENT).expect("sent packet must parse");
        payload
    }

    fn inject(&self, icmp_type: u8, payload: EchoPayload, from: Ipv4Addr) {
        self.inject
            .send((build_datagram(icmp_type, payload), IpAddr::V4(from)))
            .unwrap();
    }
}

/// Assemble a datagram as the kernel would deliver it: an IPv4 header
/// (contents irrelevant to the engine) followed by the ICMP packet.
fn build_datagram(icmp_type: u8, payload: EchoPayload) -> Vec<u8> {
    let mut icmp = [0u8; ECHO_PACKET_LEN];
    build_echo_request(&mut icmp, IDENT, &payload).unwrap();
    icmp[0] = icmp_type;

    let mut datagram = vec![0u8; IPV4_HEADER_LEN];
    datagram.extend_from_slice(&icmp);
    datagram
}

fn addr(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

#[tokio::test(start_paused = true)]
async fn probe_times_out_when_no_reply_arrives() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);

    let started = tokio::time::Instant::now();
    let report = worker.probe(IpAddr::V4(addr(1))).await.unwrap();

    assert_eq!(report.outcome, Outcome::Timeout);
    assert_eq!(report.from, IpAddr::V4(addr(1)));
    assert!(started.elapsed() >= Duration::from_secs(5));

    // Probe is gone and the listener wound down
    assert_eq!(controller.active_probes(), 0);
    assert!(!controller.is_listening());

    // Initial send plus one retransmission per elapsed interval
    assert!(script.sent_count() >= 5);
}

#[tokio::test(start_paused = true)]
async fn echo_reply_resolves_probe_with_round_trip() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = addr(2);

    worker.start(IpAddr::V4(target)).unwrap();

    // Reply as if the packet spent 50 ms on the wire
    let mut payload = script.sent_payload(0);
    payload.sent_micros = netwatch_net::monotonic_micros().saturating_sub(50_000);
    script.inject(ECHO_REPLY, payload, target);

    let report = worker.wait().await.expect("probe must resolve");
    match report.outcome {
        Outcome::EchoReply { rtt } => {
            assert!(rtt >= Duration::from_millis(50));
            assert!(rtt < Duration::from_millis(500), "rtt {rtt:?} out of range");
        }
        other => panic!("expected echo reply, got {other:?}"),
    }
    assert_eq!(report.from, IpAddr::V4(target));
    assert_eq!(controller.active_probes(), 0);
}

#[tokio::test(start_paused = true)]
async fn round_trip_is_never_negative() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = addr(3);

    worker.start(IpAddr::V4(target)).unwrap();

    // Skewed stamp 50 ms in the future
    let mut payload = script.sent_payload(0);
    payload.sent_micros = netwatch_net::monotonic_micros() + 50_000;
    script.inject(ECHO_REPLY, payload, target);

    let report = worker.wait().await.expect("probe must resolve");
    match report.outcome {
        Outcome::EchoReply { rtt } => {
            assert!(rtt <= Duration::from_millis(50));
        }
        other => panic!("expected echo reply, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn reply_resolves_only_the_matching_probe() {
    let script = Script::new();
    let controller = script.controller();
    let mut first = Worker::new(&controller);
    let mut second = Worker::new(&controller);

    first.start(IpAddr::V4(addr(4))).unwrap();
    second.start(IpAddr::V4(addr(5))).unwrap();
    assert_eq!(controller.active_probes(), 2);

    let first_payload = script.sent_payload(0);
    let second_payload = script.sent_payload(1);
    assert_ne!(first_payload.correlation, second_payload.correlation);

    script.inject(ECHO_REPLY, first_payload, addr(4));
    let report = first.wait().await.expect("first probe must resolve");
    assert!(matches!(report.outcome, Outcome::EchoReply { .. }));

    // The second probe is untouched
    assert_eq!(controller.active_probes(), 1);
    assert!(second.running());

    script.inject(ECHO_REPLY, second_payload, addr(5));
    let report = second.wait().await.expect("second probe must resolve");
    assert_eq!(report.from, IpAddr::V4(addr(5)));
    assert_eq!(controller.active_probes(), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_reply_is_ignored() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);

    worker.start(IpAddr::V4(addr(6))).unwrap();

    let mut payload = script.sent_payload(0);
    payload.correlation = payload.correlation.wrapping_add(1);
    script.inject(ECHO_REPLY, payload, addr(6));

    // Give the driver a chance to process the datagram
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(controller.active_probes(), 1);
    assert!(worker.running());

    worker.stop();
    assert_eq!(controller.active_probes(), 0);
    assert!(!controller.is_listening());
}

#[tokio::test(start_paused = true)]
async fn own_echo_request_does_not_resolve_the_probe() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = addr(7);

    worker.start(IpAddr::V4(target)).unwrap();

    // Loopback of our own outgoing request
    let payload = script.sent_payload(0);
    script.inject(ECHO_REQUEST, payload, target);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.active_probes(), 1);

    // The real reply still resolves it
    script.inject(ECHO_REPLY, payload, target);
    let report = worker.wait().await.expect("probe must resolve");
    assert!(matches!(report.outcome, Outcome::EchoReply { .. }));
}

#[tokio::test(start_paused = true)]
async fn icmp_errors_map_to_outcomes() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = addr(8);

    worker.start(IpAddr::V4(target)).unwrap();
    script.inject(DEST_UNREACHABLE, script.sent_payload(0), target);
    let report = worker.wait().await.expect("probe must resolve");
    assert_eq!(report.outcome, Outcome::DestinationUnreachable);

    worker.start(IpAddr::V4(target)).unwrap();
    script.inject(TIME_EXCEEDED, script.sent_payload(1), target);
    let report = worker.wait().await.expect("probe must resolve");
    assert_eq!(report.outcome, Outcome::TimeExceeded);
}

#[tokio::test(start_paused = true)]
async fn second_start_fails_while_probe_outstanding() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = IpAddr::V4(addr(9));

    worker.start(target).unwrap();
    assert!(matches!(worker.start(target), Err(Error::ProbeBusy)));
    assert_eq!(controller.active_probes(), 1);

    // Stopping clears the guard
    worker.stop();
    assert!(worker.start(target).is_ok());
    worker.stop();
}

#[tokio::test(start_paused = true)]
async fn listener_stops_when_idle_and_restarts_on_next_probe() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = addr(10);

    worker.start(IpAddr::V4(target)).unwrap();
    assert!(controller.is_listening());

    script.inject(ECHO_REPLY, script.sent_payload(0), target);
    worker.wait().await.expect("probe must resolve");
    assert!(!controller.is_listening());

    // The engine must come back identically after going idle
    worker.start(IpAddr::V4(target)).unwrap();
    assert!(controller.is_listening());

    script.inject(ECHO_REPLY, script.sent_payload(1), target);
    assert!(worker.wait().await.is_some());
    assert!(!controller.is_listening());
    assert_eq!(controller.active_probes(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_time_network_unreachable_resolves_probe() {
    let script = Script::new();
    script.set_unreachable(true);
    let controller = script.controller();
    let mut worker = Worker::new(&controller);

    let report = worker.probe(IpAddr::V4(addr(11))).await.unwrap();
    assert_eq!(report.outcome, Outcome::NetworkUnreachable);
    assert_eq!(controller.active_probes(), 0);
    assert!(!controller.is_listening());

    // A later probe goes through once the route is back
    script.set_unreachable(false);
    worker.start(IpAddr::V4(addr(11))).unwrap();
    assert!(controller.is_listening());
    script.inject(ECHO_REPLY, script.sent_payload(0), addr(11));
    assert!(worker.wait().await.is_some());
}

#[tokio::test]
async fn ipv6_targets_are_rejected() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);

    let target: IpAddr = "::1".parse().unwrap();
    assert!(matches!(
        worker.start(target),
        Err(Error::UnsupportedFamily)
    ));
    assert!(!worker.running());
    assert!(!controller.is_listening());
}

#[tokio::test(start_paused = true)]
async fn correlation_ids_are_unique_across_concurrent_probes() {
    let script = Script::new();
    let controller = script.controller();

    let mut workers: Vec<Worker> = (0..32).map(|_| Worker::new(&controller)).collect();
    for (i, worker) in workers.iter_mut().enumerate() {
        worker
            .start(IpAddr::V4(Ipv4Addr::new(10, 0, 1, i as u8 + 1)))
            .unwrap();
    }
    assert_eq!(controller.active_probes(), 32);

    let mut ids: Vec<u16> = (0..32).map(|i| script.sent_payload(i).correlation).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 32);

    for worker in &mut workers {
        worker.stop();
    }
    assert_eq!(controller.active_probes(), 0);
    assert!(!controller.is_listening());
}

#[tokio::test(start_paused = true)]
async fn retransmissions_carry_increasing_sequence_numbers() {
    let script = Script::new();
    let controller = script.controller();
    let mut worker = Worker::new(&controller);
    let target = addr(12);

    worker.start(IpAddr::V4(target)).unwrap();

    // Let three sweep intervals elapse
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let sent = script.sent_count();
    assert!(sent >= 3);
    for index in 0..sent {
        let payload = script.sent_payload(index);
        assert_eq!(payload.sequence, index as u16 + 1);
    }

    worker.stop();
}

#[tokio::test(start_paused = true)]
async fn dropping_the_worker_cancels_its_probe() {
    let script = Script::new();
    let controller = script.controller();

    let mut worker = Worker::new(&controller);
    worker.start(IpAddr::V4(addr(13))).unwrap();
    assert_eq!(controller.active_probes(), 1);

    drop(worker);
    assert_eq!(controller.active_probes(), 0);
    assert!(!controller.is_listening());
    let _ = script;
}
