//! Outbound delivery of RTP packets.
//!
//! - **UDP** ([`udp`]): one socket, packets sent in order to a single
//!   destination address.
//!
//! Session setup, RTCP and multicast are left to whoever owns the
//! destination address.

pub mod udp;

pub use udp::UdpTransport;
