use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crate::error::Result;

/// UDP transport for outbound RTP packet delivery.
///
/// Binds a single ephemeral socket and sends each RTP packet as one
/// datagram. Timing between frames belongs to the caller's tick loop.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind an ephemeral UDP socket (`0.0.0.0:0`) for outbound RTP.
    pub fn bind() -> Result<Self> {
        Self::bind_to(SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    /// Bind to a specific local address.
    pub fn bind_to(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        tracing::debug!(local = %socket.local_addr()?, "RTP socket bound");
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }

    /// Send one frame's packets in order. Stops at the first failure.
    pub fn send_all(&self, packets: &[Vec<u8>], addr: SocketAddr) -> Result<usize> {
        let mut sent = 0;
        for packet in packets {
            sent += self.send_to(packet, addr)?;
        }
        tracing::trace!(packets = packets.len(), bytes = sent, %addr, "frame sent");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn send_all_delivers_in_order() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let dest = receiver.local_addr().unwrap();

        let transport = UdpTransport::bind_to("127.0.0.1:0".parse().unwrap()).unwrap();
        let packets = vec![vec![1u8; 10], vec![2u8; 20]];
        assert_eq!(transport.send_all(&packets, dest).unwrap(), 30);

        let mut buf = [0u8; 64];
        let (n, from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &packets[0][..]);
        assert_eq!(from, transport.local_addr().unwrap());
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &packets[1][..]);
    }
}
