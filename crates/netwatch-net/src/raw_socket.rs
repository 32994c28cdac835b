//! Raw ICMP socket and the transport seam used by the probing engine
//!
//! This module provides a safe wrapper around the raw socket, handling:
//! - Socket creation and non-blocking configuration
//! - Integration with the tokio reactor via `AsyncFd`
//!
//! A RAW socket requires CAP_NET_RAW (or root); the daemon checks the
//! capability once at startup rather than falling back to DGRAM sockets.

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::io::unix::AsyncFd;
use tracing::trace;

/// Transport the probing engine exchanges echo packets through
///
/// The engine only needs a non-blocking send and a readiness-driven
/// receive; hiding the raw socket behind this trait lets tests drive the
/// engine with a scripted transport instead.
#[async_trait]
pub trait EchoTransport: Send + Sync {
    /// Non-blocking send of one ICMP packet to `target`
    fn send_to(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize>;

    /// Wait for readability, then receive one datagram
    ///
    /// A wakeup with nothing to read retries the wait silently.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)>;
}

/// Raw AF_INET/SOCK_RAW/ICMP socket integrated with the tokio reactor
pub struct RawIcmpSocket {
    inner: AsyncFd<Socket>,
}

impl RawIcmpSocket {
    /// Create the raw socket, non-blocking from the start
    ///
    /// Permission errors (missing CAP_NET_RAW) surface here.
    pub fn new() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        socket.set_nonblocking(true)?;
        trace!("Created raw ICMP socket");

        Ok(Self {
            inner: AsyncFd::new(socket)?,
        })
    }
}

#[async_trait]
impl EchoTransport for RawIcmpSocket {
    fn send_to(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize> {
        let dest = SocketAddr::V4(SocketAddrV4::new(target, 0));
        self.inner.get_ref().send_to(packet, &dest.into())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        loop {
            let mut guard = self.inner.readable().await?;

            match guard.try_io(|inner| {
                // socket2's recv_from requires an uninit buffer
                let maybe_uninit_buf = unsafe {
                    std::mem::transmute::<&mut [u8], &mut [std::mem::MaybeUninit<u8>]>(&mut *buf)
                };
                inner.get_ref().recv_from(maybe_uninit_buf)
            }) {
                Ok(Ok((n, addr))) => {
                    let addr = addr
                        .as_socket()
                        .map(|a| a.ip())
                        .ok_or_else(|| io::Error::other("Invalid source address"))?;
                    return Ok((n, addr));
                }
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }
}

/// Helper to create the engine's real transport
pub fn new_icmp_socket() -> io::Result<RawIcmpSocket> {
    RawIcmpSocket::new()
}
