//! A blocking DHCPv4 client: send a DISCOVER/REQUEST, wait for the
//! matching reply by transaction id.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use crate::error::DhcpError;

use super::message::Message;
use super::option::{DhcpOption, MessageType, OpCode};

/// Server-facing UDP port every request is sent to.
pub const SERVER_PORT: u16 = 67;
/// Client-facing UDP port replies are expected on.
pub const CLIENT_PORT: u16 = 68;

const DEFAULT_BLOCK_SIZE: usize = 65535;

/// The fields of a completed DHCP lease, extracted from a server ACK.
#[derive(Debug, Clone)]
pub struct IpAssignment {
    pub message: Message,
    pub lease: Duration,
    pub ipv4: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub routers: Vec<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub dns_search: Vec<String>,
}

/// A bare DHCPv4 client: broadcasts requests and waits for replies
/// matching the transaction id, with no retry or timer logic of its own
/// beyond the socket read timeout.
pub struct Client {
    block_size: usize,
    timeout: Duration,
}

impl Default for Client {
    fn default() -> Self {
        Client {
            block_size: DEFAULT_BLOCK_SIZE,
            timeout: Duration::from_secs(10),
        }
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `request` and blocks until a BOOTREPLY with a matching
    /// transaction id arrives, or the read times out.
    pub fn request(&self, request: &Message) -> Result<Message, DhcpError> {
        if request.op != OpCode::BootRequest {
            return Err(DhcpError::MalformedQuery(
                "message is not a DHCP request".into(),
            ));
        }
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, CLIENT_PORT))
            .map_err(|e| DhcpError::UnspecFail(format!("bind failed: {e}")))?;
        socket
            .set_broadcast(true)
            .map_err(|e| DhcpError::UnspecFail(format!("set_broadcast failed: {e}")))?;
        socket
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| DhcpError::UnspecFail(format!("set_read_timeout failed: {e}")))?;

        let bytes = request.encode()?;
        socket
            .send_to(
                &bytes,
                SocketAddrV4::new(Ipv4Addr::BROADCAST, SERVER_PORT),
            )
            .map_err(|e| DhcpError::UnspecFail(format!("send failed: {e}")))?;

        let mut buf = vec![0u8; self.block_size];
        loop {
            let (n, _) = socket
                .recv_from(&mut buf)
                .map_err(|e| DhcpError::UnspecFail(format!("recv failed: {e}")))?;
            let response = match Message::decode(&buf[..n]) {
                Ok(response) => response,
                Err(_) => continue,
            };
            if response.xid == request.xid && response.op == OpCode::BootReply {
                return Ok(response);
            }
        }
    }

    /// Runs the DISCOVER/OFFER/REQUEST/ACK exchange to completion and
    /// returns the resulting lease.
    pub fn request_assignment(&self, hwaddr: Vec<u8>) -> Result<IpAssignment, DhcpError> {
        let xid = rand::random::<u32>();

        let discover = Message::discover(xid, hwaddr.clone(), None);
        let offer = self.request(&discover)?;
        if offer.your_addr == Ipv4Addr::UNSPECIFIED
            || offer.message_type() != Some(MessageType::Offer)
        {
            return Err(DhcpError::UnspecFail(
                "DHCP server failed to offer an address".into(),
            ));
        }

        let req = Message::request(xid, hwaddr, offer.your_addr);
        let ack = self.request(&req)?;
        if ack.your_addr == Ipv4Addr::UNSPECIFIED || ack.message_type() != Some(MessageType::Ack) {
            return Err(DhcpError::UnspecFail(
                "DHCP server failed to acknowledge request".into(),
            ));
        }

        let subnet = ack
            .subnet_mask()
            .ok_or_else(|| DhcpError::UnspecFail("ACK missing subnet mask".into()))?;
        let routers = match ack.options.get(3) {
            Some(DhcpOption::Router(ips)) => ips.clone(),
            _ => return Err(DhcpError::UnspecFail("ACK missing routers".into())),
        };
        let lease_secs = match ack.options.get(51) {
            Some(DhcpOption::IPAddressLeaseTime(secs)) => *secs,
            _ => return Err(DhcpError::UnspecFail("ACK missing lease time".into())),
        };
        let dns = match ack.options.get(6) {
            Some(DhcpOption::DomainNameServer(ips)) => ips.clone(),
            _ => Vec::new(),
        };
        let dns_search = match ack.options.get(119) {
            Some(DhcpOption::DNSDomainSearchList(names)) => names.clone(),
            _ => Vec::new(),
        };

        Ok(IpAssignment {
            ipv4: ack.your_addr,
            lease: Duration::from_secs(lease_secs as u64),
            subnet,
            routers,
            dns,
            dns_search,
            message: ack,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_request_op() {
        let client = Client::new();
        let mut reply_template = Message::discover(1, vec![1, 2, 3, 4, 5, 6], None);
        reply_template.op = OpCode::BootReply;
        assert!(matches!(
            client.request(&reply_template),
            Err(DhcpError::MalformedQuery(_))
        ));
    }
}
