//! Blocking UDP transport: one OS thread per received datagram.
//!
//! A DHCP session is synchronous end to end (decode, consult the backend,
//! encode), so there's no benefit to an async socket loop here — just a
//! single blocking receive loop that spawns a thread per datagram.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;

use log::{debug, error};

/// Large enough for any DHCPv4 or DHCPv6 datagram without truncation.
const BUFFER_SIZE: usize = 65536;

/// A bound UDP socket that dispatches each received datagram to a handler
/// on its own thread, so one slow handler never stalls the receive loop.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn bind(address: impl std::net::ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(address)?;
        Ok(UdpTransport {
            socket: Arc::new(socket),
        })
    }

    pub fn with_broadcast(self, enable: bool) -> io::Result<Self> {
        self.socket.set_broadcast(enable)?;
        Ok(self)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, target)
    }

    /// Blocks, reading datagrams forever and handing each to `handler` on
    /// a freshly spawned thread. `handler` returns the reply payload and
    /// destination, or `None` to send nothing back.
    pub fn serve<F>(&self, handler: F) -> io::Result<()>
    where
        F: Fn(SocketAddr, &[u8]) -> Option<(SocketAddr, Vec<u8>)> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut buf = [0u8; BUFFER_SIZE];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf)?;
            let datagram = buf[..len].to_vec();
            let socket = Arc::clone(&self.socket);
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                if let Some((dest, reply)) = handler(peer, &datagram) {
                    if let Err(e) = socket.send_to(&reply, dest) {
                        error!("{peer} | failed to send reply to {dest}: {e}");
                    }
                } else {
                    debug!("{peer} | no reply generated");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_to_ephemeral_port() {
        let transport = UdpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr().unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn send_and_receive_roundtrip() {
        let server = UdpTransport::bind("127.0.0.1:0").unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"hello", server_addr).unwrap();

        let mut buf = [0u8; 16];
        let (len, _peer) = server.socket.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
    }
}
