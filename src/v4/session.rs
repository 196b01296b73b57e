//! The per-datagram DHCPv4 session state machine.
//!
//! One [`Session`] is shared (behind an `Arc`) across every worker thread
//! handling datagrams for a server; [`Session::handle`] is synchronous and
//! safe to call from any number of threads at once, since all mutable
//! state lives behind the `Mutex`es inside the backend chain.

use std::net::Ipv4Addr;

use log::{debug, error, info, warn};

use crate::error::{DhcpError, DhcpResult, StatusCode};

use super::lease::Backend;
use super::message::{Message, OptionList};
use super::option::{DhcpOption, MessageType, OpCode};
use super::pxe::PxeOverlay;

/// Default broadcast destination for replies with no better candidate.
pub const BROADCAST: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

/// Client-facing UDP port every reply is sent to.
pub const CLIENT_PORT: u16 = 68;

/// Re-assigns `original` to `new` only if `original` is the zero address,
/// mirroring the header fields a relay or responder is allowed to fill in.
fn assign_zero(original: Ipv4Addr, new: Ipv4Addr) -> Ipv4Addr {
    if original == Ipv4Addr::UNSPECIFIED {
        new
    } else {
        original
    }
}

/// Ties together the address backend chain, the optional PXE overlay, and
/// this server's own identity for building replies.
pub struct Session {
    backend: Box<dyn Backend>,
    pxe: Option<PxeOverlay>,
    server_id: Ipv4Addr,
    broadcast: Ipv4Addr,
}

impl Session {
    pub fn new(backend: Box<dyn Backend>, server_id: Ipv4Addr) -> Self {
        Session {
            backend,
            pxe: None,
            server_id,
            broadcast: BROADCAST,
        }
    }

    pub fn with_pxe(mut self, pxe: PxeOverlay) -> Self {
        self.pxe = Some(pxe);
        self
    }

    pub fn with_broadcast(mut self, broadcast: Ipv4Addr) -> Self {
        self.broadcast = broadcast;
        self
    }

    fn process_discover(&self, request: &Message) -> DhcpResult<Option<Message>> {
        if let Some(pxe) = &self.pxe {
            if let Some(mut response) = pxe.discover(request) {
                response.server_addr = assign_zero(response.server_addr, self.server_id);
                response.options.set(DhcpOption::DHCPMessageType(MessageType::Offer));
                response.options.set(DhcpOption::ServerIdentifier(self.server_id));
                return Ok(Some(response));
            }
        }
        let Some(mut response) = self.backend.discover(request) else {
            return Ok(None);
        };
        response.server_addr = assign_zero(response.server_addr, self.server_id);
        response.options.set(DhcpOption::DHCPMessageType(MessageType::Offer));
        response.options.set(DhcpOption::ServerIdentifier(self.server_id));
        Ok(Some(response))
    }

    fn process_request(&self, request: &Message) -> DhcpResult<Option<Message>> {
        if let Some(pxe) = &self.pxe {
            if let Some(mut response) = pxe.request(request) {
                response.server_addr = assign_zero(response.server_addr, self.server_id);
                response.options.set(DhcpOption::DHCPMessageType(MessageType::Ack));
                response.options.set(DhcpOption::ServerIdentifier(self.server_id));
                return Ok(Some(response));
            }
        }
        let Some(mut response) = self.backend.request(request) else {
            return Ok(None);
        };
        response.server_addr = assign_zero(response.server_addr, self.server_id);
        if !response.options.contains(53) {
            response.options.set(DhcpOption::DHCPMessageType(MessageType::Ack));
        }
        if !response.options.contains(54) {
            response.options.set(DhcpOption::ServerIdentifier(self.server_id));
        }

        // the assignment must agree with what the client asked for
        let netmask = request.subnet_mask();
        let req_addr = request.requested_address();
        let req_cast = request.broadcast_address();
        let mismatch = (req_addr.is_some() && req_addr != Some(response.your_addr))
            || (req_cast.is_some() && req_cast != netmask);
        if mismatch {
            response.options.set(DhcpOption::DHCPMessageType(MessageType::Nak));
        }
        Ok(Some(response))
    }

    fn process_decline(&self, request: &Message) -> DhcpResult<Option<Message>> {
        let mut response = self
            .backend
            .decline(request)
            .unwrap_or_else(|| request.reply(OptionList::new()));
        response.server_addr = assign_zero(response.server_addr, self.server_id);
        if !response.options.contains(53) {
            response.options.set(DhcpOption::DHCPMessageType(MessageType::Nak));
        }
        if !response.options.contains(54) {
            response.options.set(DhcpOption::ServerIdentifier(self.server_id));
        }
        Ok(Some(response))
    }

    fn process_release(&self, request: &Message) -> DhcpResult<Option<Message>> {
        let mut response = self
            .backend
            .release(request)
            .unwrap_or_else(|| request.reply(OptionList::new()));
        response.server_addr = assign_zero(response.server_addr, self.server_id);
        if !response.options.contains(53) {
            response.options.set(DhcpOption::DHCPMessageType(MessageType::Ack));
        }
        if !response.options.contains(54) {
            response.options.set(DhcpOption::ServerIdentifier(self.server_id));
        }
        Ok(Some(response))
    }

    fn process_inform(&self, _request: &Message) -> DhcpResult<Option<Message>> {
        Err(DhcpError::NotAllowed("Inform not allowed".into()))
    }

    fn process_unknown(&self, request: &Message) -> DhcpResult<Option<Message>> {
        Err(DhcpError::UnknownQueryType(format!(
            "unknown message type: {:?}",
            request.message_type()
        )))
    }

    fn dispatch(&self, request: &Message) -> DhcpResult<Option<Message>> {
        match request.message_type() {
            Some(MessageType::Discover) => self.process_discover(request),
            Some(MessageType::Request) => self.process_request(request),
            Some(MessageType::Decline) => self.process_decline(request),
            Some(MessageType::Release) => self.process_release(request),
            Some(MessageType::Inform) => self.process_inform(request),
            _ => self.process_unknown(request),
        }
    }

    /// The ordered destination-address candidate list for a reply: the
    /// client's own address if it set one, else the gateway that relayed
    /// the request, else the peer the datagram arrived from, else broadcast.
    fn destination(&self, request: &Message, peer: Ipv4Addr) -> Ipv4Addr {
        let mut host = assign_zero(request.client_addr, request.gateway_addr);
        host = assign_zero(host, peer);
        assign_zero(host, self.broadcast)
    }

    /// Parses `data`, dispatches it, and returns the encoded reply plus
    /// the address it should be sent to. `peer` is the address the
    /// datagram arrived from.
    pub fn handle(&self, peer: Ipv4Addr, data: &[u8]) -> Option<(Ipv4Addr, Vec<u8>)> {
        let request = match Message::decode(data) {
            Ok(request) => request,
            Err(e) => {
                warn!("{peer} | failed to decode request: {e}");
                return None;
            }
        };
        if request.op != OpCode::BootRequest {
            debug!("{peer} | ignoring non-BootRequest message");
            return None;
        }
        if request.message_type().is_none() {
            debug!("{peer} | request missing message type option");
            return None;
        }

        let response = match self.dispatch(&request) {
            Ok(response) => response,
            Err(e) => {
                error!("{peer} | {e}");
                let mut reply = request.reply(OptionList::new());
                reply.options.set(DhcpOption::DHCPMessageType(MessageType::Nak));
                reply.options.set(DhcpOption::StatusCode {
                    status: e.code(),
                    message: e.to_string(),
                });
                Some(reply)
            }
        };

        let response = response?;
        let dest = self.destination(&request, peer);
        match response.encode() {
            Ok(bytes) => {
                info!(
                    "{peer} | {:?} -> {dest} ({} bytes)",
                    response.message_type(),
                    bytes.len()
                );
                Some((dest, bytes))
            }
            Err(e) => {
                error!("{peer} | failed to encode response: {e}");
                None
            }
        }
    }
}

/// Builds a status-only Nak reply, used by tests and by backends that
/// want to short-circuit without going through [`Session::dispatch`].
pub fn nak(request: &Message, status: StatusCode, message: &str) -> Message {
    super::lease::build_nak(request, status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4::lease::MemoryBackend;

    fn session() -> Session {
        let backend = MemoryBackend::new(
            Ipv4Addr::new(192, 168, 1, 0),
            24,
            Ipv4Addr::new(192, 168, 1, 1),
            vec![Ipv4Addr::new(8, 8, 8, 8)],
        );
        Session::new(Box::new(backend), Ipv4Addr::new(192, 168, 1, 1))
    }

    #[test]
    fn discover_yields_offer() {
        let session = session();
        let discover = Message::discover(1, vec![1, 2, 3, 4, 5, 6], None);
        let (_dest, bytes) = session
            .handle(Ipv4Addr::new(192, 168, 1, 200), &discover.encode().unwrap())
            .unwrap();
        let offer = Message::decode(&bytes).unwrap();
        assert_eq!(offer.message_type(), Some(MessageType::Offer));
        assert_ne!(offer.your_addr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(offer.subnet_mask(), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(offer.server_identifier(), Some(Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn discover_then_request_yields_matching_ack() {
        let session = session();
        let discover = Message::discover(1, vec![1, 2, 3, 4, 5, 6], None);
        let (_dest, offer_bytes) = session
            .handle(Ipv4Addr::new(192, 168, 1, 200), &discover.encode().unwrap())
            .unwrap();
        let offer = Message::decode(&offer_bytes).unwrap();

        let request = Message::request(2, vec![1, 2, 3, 4, 5, 6], offer.your_addr);
        let (_dest, ack_bytes) = session
            .handle(Ipv4Addr::new(192, 168, 1, 201), &request.encode().unwrap())
            .unwrap();
        let ack = Message::decode(&ack_bytes).unwrap();
        assert_eq!(ack.message_type(), Some(MessageType::Ack));
        assert_eq!(ack.your_addr, offer.your_addr);
    }

    #[test]
    fn request_mismatched_address_gets_nak() {
        let session = session();
        let req = Message::request(2, vec![1, 2, 3, 4, 5, 6], Ipv4Addr::new(10, 10, 10, 10));
        let (_dest, bytes) = session
            .handle(Ipv4Addr::new(192, 168, 1, 201), &req.encode().unwrap())
            .unwrap();
        let reply = Message::decode(&bytes).unwrap();
        assert_eq!(reply.message_type(), Some(MessageType::Nak));
    }

    #[test]
    fn inform_is_rejected_with_not_allowed() {
        let session = session();
        let mut options = OptionList::new();
        options.set(DhcpOption::DHCPMessageType(MessageType::Inform));
        let msg = Message {
            options,
            ..Message::discover(3, vec![1, 2, 3, 4, 5, 6], None)
        };
        let (_dest, bytes) = session
            .handle(Ipv4Addr::new(192, 168, 1, 202), &msg.encode().unwrap())
            .unwrap();
        let reply = Message::decode(&bytes).unwrap();
        assert_eq!(reply.message_type(), Some(MessageType::Nak));
        assert!(matches!(
            reply.options.get(151),
            Some(DhcpOption::StatusCode {
                status: StatusCode::NotAllowed,
                ..
            })
        ));
    }
}
