//! ICMP echo packet codec
//!
//! Builds and parses the fixed-layout packet exchanged by the probing
//! engine: an 8-byte ICMP header followed by a 12-byte correlation payload
//! (probe id, sequence counter, monotonic send timestamp). Received
//! datagrams still carry the IPv4 header, which is stripped here.

use pnet::packet::icmp::{
    checksum, echo_request::MutableEchoRequestPacket, IcmpCode, IcmpPacket, IcmpType, IcmpTypes,
};
use pnet::packet::Packet;
use std::io;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::trace;

/// ICMP header size on the wire
pub const ICMP_HEADER_LEN: usize = 8;

/// Correlation payload size
pub const PAYLOAD_LEN: usize = 12;

/// Echo request/reply packet size (header + payload)
pub const ECHO_PACKET_LEN: usize = ICMP_HEADER_LEN + PAYLOAD_LEN;

/// IPv4 header size (no options) prepended by the kernel on raw receives
pub const IPV4_HEADER_LEN: usize = 20;

/// Exact size of every datagram the engine accepts
pub const DATAGRAM_LEN: usize = IPV4_HEADER_LEN + ECHO_PACKET_LEN;

/// Microseconds elapsed on the process-wide monotonic clock.
///
/// Wall-clock adjustments never move this value, so it is safe for
/// round-trip measurement and deadline arithmetic.
pub fn monotonic_micros() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// ICMP message kinds the engine models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    EchoReply,
    EchoRequest,
    DestinationUnreachable,
    TimeExceeded,
    Other(u8),
}

impl From<IcmpType> for IcmpKind {
    fn from(value: IcmpType) -> Self {
        match value {
            IcmpTypes::EchoReply => IcmpKind::EchoReply,
            IcmpTypes::EchoRequest => IcmpKind::EchoRequest,
            IcmpTypes::DestinationUnreachable => IcmpKind::DestinationUnreachable,
            IcmpTypes::TimeExceeded => IcmpKind::TimeExceeded,
            other => IcmpKind::Other(other.0),
        }
    }
}

/// Correlation payload carried in every echo request and echoed back by
/// the target host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoPayload {
    /// Matches a reply to its probe; unique among in-flight probes
    pub correlation: u16,

    /// Per-probe packet counter, for diagnostics
    pub sequence: u16,

    /// [`monotonic_micros`] at send time
    pub sent_micros: u64,
}

impl EchoPayload {
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[0..2].copy_from_slice(&self.correlation.to_be_bytes());
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..12].copy_from_slice(&self.sent_micros.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            correlation: u16::from_be_bytes([buf[0], buf[1]]),
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            sent_micros: u64::from_be_bytes(buf[4..12].try_into().ok()?),
        })
    }
}

/// Construct an ICMP Echo Request carrying `payload`
///
/// The identifier field distinguishes this process's packets from other
/// pingers sharing the raw socket namespace. Returns the wire size.
pub fn build_echo_request(
    buffer: &mut [u8],
    identifier: u16,
    payload: &EchoPayload,
) -> io::Result<usize> {
    if buffer.len() < ECHO_PACKET_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Buffer too small for echo request",
        ));
    }

    let mut packet = MutableEchoRequestPacket::new(&mut buffer[..ECHO_PACKET_LEN]).ok_or_else(
        || {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Buffer too small for ICMP packet",
            )
        },
    )?;

    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_icmp_code(IcmpCode::new(0));
    packet.set_identifier(identifier);
    packet.set_sequence_number(payload.sequence);
    packet.set_payload(&payload.to_bytes());

    // Checksum over the whole packet with the checksum field zeroed
    let view = IcmpPacket::new(packet.packet()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "Failed to create ICMP packet for checksum",
        )
    })?;
    let sum = checksum(&view);
    packet.set_checksum(sum);

    Ok(ECHO_PACKET_LEN)
}

/// Parse a received raw datagram (IPv4 header + ICMP packet)
///
/// Returns the ICMP kind and the embedded correlation payload. Datagrams
/// whose size is not exactly [`DATAGRAM_LEN`], or whose echo identifier
/// does not match `expected_ident`, belong to someone else and are
/// dropped.
pub fn parse_datagram(datagram: &[u8], expected_ident: u16) -> Option<(IcmpKind, EchoPayload)> {
    if datagram.len() != DATAGRAM_LEN {
        trace!(
            size = datagram.len(),
            expected = DATAGRAM_LEN,
            "ignoring packet with invalid size"
        );
        return None;
    }

    let icmp_bytes = &datagram[IPV4_HEADER_LEN..];
    let packet = IcmpPacket::new(icmp_bytes)?;

    let ident = u16::from_be_bytes([icmp_bytes[4], icmp_bytes[5]]);
    if ident != expected_ident {
        trace!(
            ident,
            expected = expected_ident,
            "ignoring packet with foreign identifier"
        );
        return None;
    }

    let payload = EchoPayload::from_bytes(&icmp_bytes[ICMP_HEADER_LEN..])?;
    Some((IcmpKind::from(packet.get_icmp_type()), payload))
}
