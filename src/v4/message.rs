//! The DHCPv4 fixed header plus options (RFC 2131 §2, §3).

use std::net::Ipv4Addr;

use nohash_hasher::IntMap;

use crate::error::DhcpError;
use crate::wire::{Cursor, Writer};

use super::option::{DhcpOption, MessageType, OpCode};

/// Magic cookie that separates the fixed header from the option area.
pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// Minimum total datagram size a conforming sender pads requests/replies to.
pub const MIN_MESSAGE_SIZE: usize = 300;

const FIXED_HEADER_LEN: usize = 236;

/// An insertion-ordered, at-most-one-per-code collection of [`DhcpOption`]s.
///
/// Mirrors a dict-of-list hybrid: lookup by code is O(1) via a
/// `nohash-hasher`-backed map (option codes are already small dense
/// integers, so hashing them is wasted work), while iteration preserves
/// the order options were added or parsed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionList {
    order: Vec<u8>,
    by_code: IntMap<u8, DhcpOption>,
}

impl OptionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts `option`, replacing any existing option under the same code
    /// in place (position preserved) rather than moving it to the end.
    pub fn set(&mut self, option: DhcpOption) {
        let code = option.code();
        if self.by_code.insert(code, option).is_none() {
            self.order.push(code);
        }
    }

    pub fn get(&self, code: u8) -> Option<&DhcpOption> {
        self.by_code.get(&code)
    }

    pub fn contains(&self, code: u8) -> bool {
        self.by_code.contains_key(&code)
    }

    pub fn remove(&mut self, code: u8) -> Option<DhcpOption> {
        if let Some(opt) = self.by_code.remove(&code) {
            self.order.retain(|&c| c != code);
            Some(opt)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DhcpOption> {
        self.order.iter().map(move |c| &self.by_code[c])
    }

    /// Sorts options by code, ascending. Used before transmission so that
    /// deterministic test fixtures and packet captures are easy to diff.
    pub fn sort(&mut self) {
        self.order.sort_unstable();
    }

    pub fn from_vec(options: Vec<DhcpOption>) -> Self {
        let mut list = Self::new();
        for opt in options {
            list.set(opt);
        }
        list
    }
}

impl FromIterator<DhcpOption> for OptionList {
    fn from_iter<T: IntoIterator<Item = DhcpOption>>(iter: T) -> Self {
        let mut list = Self::new();
        for opt in iter {
            list.set(opt);
        }
        list
    }
}

/// A fully parsed DHCPv4 message: fixed header plus the option area.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub op: OpCode,
    pub hw_type: super::option::HwType,
    pub xid: u32,
    pub hops: u8,
    pub seconds: u16,
    pub flags: u16,
    pub client_addr: Ipv4Addr,
    pub your_addr: Ipv4Addr,
    pub server_addr: Ipv4Addr,
    pub gateway_addr: Ipv4Addr,
    pub client_hw: Vec<u8>,
    pub server_name: Vec<u8>,
    pub boot_file: Vec<u8>,
    pub options: OptionList,
}

impl Message {
    pub fn message_type(&self) -> Option<MessageType> {
        match self.options.get(53) {
            Some(DhcpOption::DHCPMessageType(mt)) => Some(*mt),
            _ => None,
        }
    }

    pub fn requested_options(&self) -> Vec<u8> {
        match self.options.get(55) {
            Some(DhcpOption::ParameterRequestList(codes)) => codes.clone(),
            _ => Vec::new(),
        }
    }

    pub fn requested_address(&self) -> Option<Ipv4Addr> {
        match self.options.get(50) {
            Some(DhcpOption::RequestedIPAddress(ip)) => Some(*ip),
            _ => None,
        }
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        match self.options.get(1) {
            Some(DhcpOption::SubnetMask(ip)) => Some(*ip),
            _ => None,
        }
    }

    pub fn broadcast_address(&self) -> Option<Ipv4Addr> {
        match self.options.get(28) {
            Some(DhcpOption::BroadcastAddress(ip)) => Some(*ip),
            _ => None,
        }
    }

    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        match self.options.get(54) {
            Some(DhcpOption::ServerIdentifier(ip)) => Some(*ip),
            _ => None,
        }
    }

    /// Builds a DISCOVER with the usual parameter request list, optionally
    /// asking for a specific address.
    pub fn discover(xid: u32, hwaddr: Vec<u8>, ipaddr: Option<Ipv4Addr>) -> Self {
        let mut options = OptionList::new();
        options.set(DhcpOption::DHCPMessageType(MessageType::Discover));
        if let Some(ip) = ipaddr {
            options.set(DhcpOption::RequestedIPAddress(ip));
        }
        options.set(DhcpOption::ParameterRequestList(vec![1, 28, 2, 3, 15, 6, 12]));
        Self::new_request(xid, hwaddr, options)
    }

    /// Builds a REQUEST for a specific address.
    pub fn request(xid: u32, hwaddr: Vec<u8>, ipaddr: Ipv4Addr) -> Self {
        let mut options = OptionList::new();
        options.set(DhcpOption::DHCPMessageType(MessageType::Request));
        options.set(DhcpOption::RequestedIPAddress(ipaddr));
        options.set(DhcpOption::ParameterRequestList(vec![1, 28, 2, 3, 15, 6, 12]));
        Self::new_request(xid, hwaddr, options)
    }

    fn new_request(xid: u32, hwaddr: Vec<u8>, options: OptionList) -> Self {
        Message {
            op: OpCode::BootRequest,
            hw_type: super::option::HwType::Ethernet,
            xid,
            hops: 0,
            seconds: 0,
            flags: 0,
            client_addr: Ipv4Addr::UNSPECIFIED,
            your_addr: Ipv4Addr::UNSPECIFIED,
            server_addr: Ipv4Addr::UNSPECIFIED,
            gateway_addr: Ipv4Addr::UNSPECIFIED,
            client_hw: hwaddr,
            server_name: Vec::new(),
            boot_file: Vec::new(),
            options,
        }
    }

    /// Builds a bare BOOTREPLY template carrying this message's transaction
    /// id and client hardware address forward, ready for the caller to
    /// attach response options to.
    pub fn reply(&self, options: OptionList) -> Self {
        Message {
            op: OpCode::BootReply,
            hw_type: self.hw_type,
            xid: self.xid,
            hops: 0,
            seconds: 0,
            flags: 0,
            client_addr: Ipv4Addr::UNSPECIFIED,
            your_addr: Ipv4Addr::UNSPECIFIED,
            server_addr: Ipv4Addr::UNSPECIFIED,
            gateway_addr: self.gateway_addr,
            client_hw: self.client_hw.clone(),
            server_name: Vec::new(),
            boot_file: Vec::new(),
            options,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, DhcpError> {
        let mut w = Writer::new();
        w.write_u8(self.op as u8);
        w.write_u8(self.hw_type as u8);
        w.write_u8(self.client_hw.len().min(16) as u8);
        w.write_u8(self.hops);
        w.write_u32(self.xid);
        w.write_u16(self.seconds);
        w.write_u16(self.flags);
        w.write_ipv4(self.client_addr);
        w.write_ipv4(self.your_addr);
        w.write_ipv4(self.server_addr);
        w.write_ipv4(self.gateway_addr);
        w.write_fixed(&self.client_hw, 16);
        w.write_fixed(&self.server_name, 64);
        w.write_fixed(&self.boot_file, 128);
        w.write_slice(&MAGIC_COOKIE);

        let mut options = self.options.clone();
        options.sort();
        for opt in options.iter() {
            if matches!(opt, DhcpOption::End) {
                continue;
            }
            let value = opt.encode_value()?;
            w.write_u8(opt.code());
            w.write_u8(value.len() as u8);
            w.write_slice(&value);
        }
        w.write_u8(255); // End

        let mut bytes = w.into_bytes();
        if bytes.len() < MIN_MESSAGE_SIZE {
            bytes.resize(MIN_MESSAGE_SIZE, 0);
        }
        Ok(bytes)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DhcpError> {
        if raw.len() < FIXED_HEADER_LEN + 4 {
            return Err(DhcpError::ShortBuffer {
                needed: FIXED_HEADER_LEN + 4,
                available: raw.len(),
            });
        }
        let mut c = Cursor::new(raw);
        let op = OpCode::from_u8(c.read_u8()?)?;
        let hw_type = super::option::HwType::from_u8(c.read_u8()?)?;
        let hw_length = c.read_u8()? as usize;
        let hops = c.read_u8()?;
        let xid = c.read_u32()?;
        let seconds = c.read_u16()?;
        let flags = c.read_u16()?;
        let client_addr = c.read_ipv4()?;
        let your_addr = c.read_ipv4()?;
        let server_addr = c.read_ipv4()?;
        let gateway_addr = c.read_ipv4()?;
        let hw_raw = c.read_fixed(16)?;
        let client_hw = hw_raw[..hw_length.min(16)].to_vec();
        let server_name = c.read_fixed(64)?.to_vec();
        let boot_file = c.read_fixed(128)?.to_vec();

        let cookie = c.read_fixed(4)?;
        if cookie != MAGIC_COOKIE {
            return Err(DhcpError::BadMagicCookie(cookie.try_into().unwrap()));
        }

        let mut options = OptionList::new();
        while !c.is_empty() {
            let code = c.read_u8()?;
            if code == 0 {
                continue; // Pad
            }
            if code == 255 {
                break; // End
            }
            let len = c.read_u8()? as usize;
            let value = c.read_fixed(len)?;
            options.set(DhcpOption::decode(code, value)?);
        }

        Ok(Message {
            op,
            hw_type,
            xid,
            hops,
            seconds,
            flags,
            client_addr,
            your_addr,
            server_addr,
            gateway_addr,
            client_hw,
            server_name,
            boot_file,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_to_bytes(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn discover_roundtrips() {
        let msg = Message::discover(0x12345678, vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01], None);
        let bytes = msg.encode().unwrap();
        assert!(bytes.len() >= MIN_MESSAGE_SIZE);
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.xid, 0x12345678);
        assert_eq!(decoded.message_type(), Some(MessageType::Discover));
        assert_eq!(decoded.client_hw, vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    }

    #[test]
    fn bad_magic_cookie_rejected() {
        let mut msg = Message::discover(1, vec![1, 2, 3, 4, 5, 6], None)
            .encode()
            .unwrap();
        msg[236] = 0;
        assert!(matches!(
            Message::decode(&msg),
            Err(DhcpError::BadMagicCookie(_))
        ));
    }

    #[test]
    fn reply_carries_xid_and_hwaddr_forward() {
        let discover = Message::discover(42, vec![1, 2, 3, 4, 5, 6], None);
        let mut opts = OptionList::new();
        opts.set(DhcpOption::DHCPMessageType(MessageType::Offer));
        let offer = discover.reply(opts);
        assert_eq!(offer.xid, 42);
        assert_eq!(offer.client_hw, discover.client_hw);
        assert_eq!(offer.op, OpCode::BootReply);
    }

    // Mirrors a well-known DHCPDISCOVER capture (op=1, htype=1, hlen=6,
    // xid=0x00003d1d, chaddr=00:0b:82:01:fc:42) to exercise the decoder
    // against bytes that didn't come from this crate's own encoder.
    #[test]
    fn decodes_literal_discover_capture() {
        let hex = "0101060000003d1d0000000000000000000000000000000000000000000b8201fc42000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000006382536335010137040103062a320400000000ff";
        let bytes = hex_to_bytes(hex);
        let msg = Message::decode(&bytes).unwrap();
        assert_eq!(msg.op, OpCode::BootRequest);
        assert_eq!(msg.xid, 0x00003d1d);
        assert_eq!(msg.client_hw, vec![0x00, 0x0b, 0x82, 0x01, 0xfc, 0x42]);
        assert_eq!(msg.message_type(), Some(MessageType::Discover));
        assert_eq!(msg.requested_address(), Some(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(msg.requested_options(), vec![1, 3, 6, 42]);
    }

    #[test]
    fn offer_carries_assignment_fields() {
        let offer = Message::discover(0x00003d1d, vec![1, 2, 3, 4, 5, 6], None).reply({
            let mut opts = OptionList::new();
            opts.set(DhcpOption::DHCPMessageType(MessageType::Offer));
            opts.set(DhcpOption::SubnetMask(Ipv4Addr::new(255, 255, 255, 0)));
            opts.set(DhcpOption::Router(vec![Ipv4Addr::new(192, 168, 0, 1)]));
            opts.set(DhcpOption::IPAddressLeaseTime(3600));
            opts.set(DhcpOption::RenewTime(1800));
            opts.set(DhcpOption::RebindTime(3150));
            opts.set(DhcpOption::ServerIdentifier(Ipv4Addr::new(192, 168, 0, 1)));
            opts
        });
        let mut offer = offer;
        offer.your_addr = Ipv4Addr::new(192, 168, 0, 10);
        let bytes = offer.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.xid, 0x00003d1d);
        assert_eq!(decoded.your_addr, Ipv4Addr::new(192, 168, 0, 10));
        assert_eq!(decoded.message_type(), Some(MessageType::Offer));
        assert_eq!(decoded.subnet_mask(), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(decoded.server_identifier(), Some(Ipv4Addr::new(192, 168, 0, 1)));
    }

    #[test]
    fn request_ack_pair_shares_xid_and_address() {
        let request = Message::request(
            0x00003d1e,
            vec![1, 2, 3, 4, 5, 6],
            Ipv4Addr::new(192, 168, 0, 10),
        );
        assert_eq!(request.message_type(), Some(MessageType::Request));

        let mut ack_opts = OptionList::new();
        ack_opts.set(DhcpOption::DHCPMessageType(MessageType::Ack));
        let mut ack = request.reply(ack_opts);
        ack.your_addr = Ipv4Addr::new(192, 168, 0, 10);

        assert_eq!(ack.xid, request.xid);
        assert_eq!(ack.xid, 0x00003d1e);
        assert_eq!(ack.your_addr, Ipv4Addr::new(192, 168, 0, 10));
        assert_eq!(ack.message_type(), Some(MessageType::Ack));
    }
}
