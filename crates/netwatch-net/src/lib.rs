//! Network primitives for Netwatch monitoring

pub mod capabilities;
pub mod packet;
pub mod raw_socket;

pub use capabilities::*;
pub use packet::*;
pub use raw_socket::{new_icmp_socket, EchoTransport, RawIcmpSocket};
