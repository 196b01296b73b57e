//! DHCPv6 message framing (RFC 8415 §8, §7.1). Plain client/server
//! messages, relay-forward messages, and relay-reply messages are three
//! distinct wire shapes sharing an option list tail.

use std::net::Ipv6Addr;

use crate::error::DhcpResult;
use crate::wire::{Cursor, Writer};

use super::option::DhcpOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Solicit = 1,
    Advertise = 2,
    Request = 3,
    Confirm = 4,
    Renew = 5,
    Rebind = 6,
    Reply = 7,
    Release = 8,
    Decline = 9,
    Reconfigure = 10,
    InfoRequest = 11,
    RelayForward = 12,
    RelayReply = 13,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use MessageType::*;
        Some(match v {
            1 => Solicit,
            2 => Advertise,
            3 => Request,
            4 => Confirm,
            5 => Renew,
            6 => Rebind,
            7 => Reply,
            8 => Release,
            9 => Decline,
            10 => Reconfigure,
            11 => InfoRequest,
            12 => RelayForward,
            13 => RelayReply,
            _ => return None,
        })
    }
}

fn decode_options(mut c: Cursor<'_>) -> DhcpResult<Vec<DhcpOption>> {
    let mut options = Vec::new();
    while !c.is_empty() {
        let code = c.read_u16()?;
        let data = c.read_length_prefixed(16)?;
        options.push(DhcpOption::decode(code, data)?);
    }
    Ok(options)
}

fn encode_options(w: &mut Writer, options: &[DhcpOption]) -> DhcpResult<()> {
    for option in options {
        w.write_u16(option.code());
        w.write_length_prefixed(&option.encode_value()?, 16)?;
    }
    Ok(())
}

/// A plain client/server DHCPv6 message (every type except the two relay
/// shapes below).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub op: MessageType,
    /// Transaction id; only the low 24 bits are meaningful on the wire.
    pub id: u32,
    pub options: Vec<DhcpOption>,
}

impl Message {
    pub fn new(op: MessageType, id: u32) -> Self {
        Message {
            op,
            id: id & 0x00FF_FFFF,
            options: Vec::new(),
        }
    }

    pub fn encode(&self) -> DhcpResult<Vec<u8>> {
        let mut w = Writer::new();
        w.write_u8(self.op as u8);
        w.write_u24(self.id);
        encode_options(&mut w, &self.options)?;
        Ok(w.into_bytes())
    }

    pub fn decode(raw: &[u8]) -> DhcpResult<Self> {
        let mut c = Cursor::new(raw);
        let op_byte = c.read_u8()?;
        let op = MessageType::from_u8(op_byte).ok_or(crate::error::DhcpError::BadEnumValue {
            name: "v6::MessageType",
            value: op_byte as u32,
        })?;
        let id = c.read_u24()?;
        let options = decode_options(c)?;
        Ok(Message { op, id, options })
    }
}

/// A `RELAY-REPL` message: a relay agent's header with no hop count,
/// wrapping the relayed reply in its option list (as a `RelayMessage`
/// option).
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReplyMessage {
    pub op: MessageType,
    pub link_addr: Ipv6Addr,
    pub peer_addr: Ipv6Addr,
    pub options: Vec<DhcpOption>,
}

impl RelayReplyMessage {
    pub fn encode(&self) -> DhcpResult<Vec<u8>> {
        let mut w = Writer::new();
        w.write_u8(self.op as u8);
        w.write_ipv6(self.link_addr);
        w.write_ipv6(self.peer_addr);
        encode_options(&mut w, &self.options)?;
        Ok(w.into_bytes())
    }

    pub fn decode(raw: &[u8]) -> DhcpResult<Self> {
        let mut c = Cursor::new(raw);
        let op_byte = c.read_u8()?;
        let op = MessageType::from_u8(op_byte).ok_or(crate::error::DhcpError::BadEnumValue {
            name: "v6::MessageType",
            value: op_byte as u32,
        })?;
        let link_addr = c.read_ipv6()?;
        let peer_addr = c.read_ipv6()?;
        let options = decode_options(c)?;
        Ok(RelayReplyMessage {
            op,
            link_addr,
            peer_addr,
            options,
        })
    }
}

/// A `RELAY-FORW` message: adds a hop count ahead of the relay addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayForwardMessage {
    pub op: MessageType,
    pub hops: u16,
    pub link_addr: Ipv6Addr,
    pub peer_addr: Ipv6Addr,
    pub options: Vec<DhcpOption>,
}

impl RelayForwardMessage {
    pub fn encode(&self) -> DhcpResult<Vec<u8>> {
        let mut w = Writer::new();
        w.write_u8(self.op as u8);
        w.write_u16(self.hops);
        w.write_ipv6(self.link_addr);
        w.write_ipv6(self.peer_addr);
        encode_options(&mut w, &self.options)?;
        Ok(w.into_bytes())
    }

    pub fn decode(raw: &[u8]) -> DhcpResult<Self> {
        let mut c = Cursor::new(raw);
        let op_byte = c.read_u8()?;
        let op = MessageType::from_u8(op_byte).ok_or(crate::error::DhcpError::BadEnumValue {
            name: "v6::MessageType",
            value: op_byte as u32,
        })?;
        let hops = c.read_u16()?;
        let link_addr = c.read_ipv6()?;
        let peer_addr = c.read_ipv6()?;
        let options = decode_options(c)?;
        Ok(RelayForwardMessage {
            op,
            hops,
            link_addr,
            peer_addr,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v6::duid::Duid;
    use crate::v4::option::HwType;

    #[test]
    fn plain_message_roundtrips() {
        let mut msg = Message::new(MessageType::Solicit, 0xABCDEF);
        msg.options.push(DhcpOption::ClientIdentifier(Duid::LinkLayer {
            hw_type: HwType::Ethernet,
            address: vec![1, 2, 3, 4, 5, 6],
        }));
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn transaction_id_truncates_to_24_bits() {
        let msg = Message::new(MessageType::Solicit, 0xFFFF_FFFF);
        assert_eq!(msg.id, 0x00FF_FFFF);
    }

    #[test]
    fn relay_forward_roundtrips() {
        let msg = RelayForwardMessage {
            op: MessageType::RelayForward,
            hops: 1,
            link_addr: "2001:db8::1".parse().unwrap(),
            peer_addr: "2001:db8::2".parse().unwrap(),
            options: vec![DhcpOption::RelayMessage(vec![1, 2, 3])],
        };
        let bytes = msg.encode().unwrap();
        let decoded = RelayForwardMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn relay_reply_roundtrips() {
        let msg = RelayReplyMessage {
            op: MessageType::RelayReply,
            link_addr: "::".parse().unwrap(),
            peer_addr: "::1".parse().unwrap(),
            options: Vec::new(),
        };
        let bytes = msg.encode().unwrap();
        let decoded = RelayReplyMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }
}
