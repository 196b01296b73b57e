//! DHCPv4 option codes and typed option values (RFC 2132).
//!
//! Options are decoded under a [`Cursor`] scoped to the option's declared
//! length, so a malformed or truncated option only ever corrupts itself
//! rather than the rest of the datagram.

use std::net::Ipv4Addr;

use enum_iterator::Sequence;

use crate::error::{DhcpError, StatusCode};
use crate::wire::{Cursor, Writer};

/// Client/gateway hardware architecture (RFC 4578 §2.1), carried in the
/// `ClientSystemArchitectureType` option and consulted by the PXE overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
#[repr(u16)]
pub enum Arch {
    IntelX86Pc = 0,
    NecPc98 = 1,
    EfiItanium = 2,
    DecAlpha = 3,
    ArcX86 = 4,
    IntelLeanClient = 5,
    EfiIa32 = 6,
    EfiBc = 7,
    EfiXscale = 8,
    EfiX86_64 = 9,
}

impl Arch {
    pub fn from_u16(v: u16) -> Result<Self, DhcpError> {
        use Arch::*;
        Ok(match v {
            0 => IntelX86Pc,
            1 => NecPc98,
            2 => EfiItanium,
            3 => DecAlpha,
            4 => ArcX86,
            5 => IntelLeanClient,
            6 => EfiIa32,
            7 => EfiBc,
            8 => EfiXscale,
            9 => EfiX86_64,
            other => {
                return Err(DhcpError::BadEnumValue {
                    name: "Arch",
                    value: other as u32,
                })
            }
        })
    }
}

/// The DHCP message operation type, carried by the fixed header `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    BootRequest = 1,
    BootReply = 2,
}

impl OpCode {
    pub fn from_u8(v: u8) -> Result<Self, DhcpError> {
        match v {
            1 => Ok(OpCode::BootRequest),
            2 => Ok(OpCode::BootReply),
            other => Err(DhcpError::BadEnumValue {
                name: "OpCode",
                value: other as u32,
            }),
        }
    }
}

/// Number Hardware Type (RFC 1700), carried by the fixed header `htype` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HwType {
    Ethernet = 1,
    ExperimentalEthernet = 2,
    AmateurRadioAx25 = 3,
    ProteonTokenRing = 4,
    Chaos = 5,
    Ieee802 = 6,
    Arcnet = 7,
    Hyperchannel = 8,
    Lanstar = 9,
    Autonet = 10,
    LocalTalk = 11,
    LocalNet = 12,
    UltraLink = 13,
    Smds = 14,
    FrameRelay = 15,
    Atm = 16,
    Hdlc = 17,
    FibreChannel = 18,
    Atm2 = 19,
    SerialLine = 20,
    Atm3 = 21,
    MilStd188220 = 22,
    Metricom = 23,
    Ieee1394 = 24,
    Mapos = 25,
    Twinaxial = 26,
    Eui64 = 27,
    HipArp = 28,
    Iso7816 = 29,
    ArpSec = 30,
    IpSec = 31,
    Infiniband = 32,
    Cai = 33,
    WiegandInterface = 34,
    PureIp = 35,
}

impl HwType {
    pub fn from_u8(v: u8) -> Result<Self, DhcpError> {
        use HwType::*;
        Ok(match v {
            1 => Ethernet,
            2 => ExperimentalEthernet,
            3 => AmateurRadioAx25,
            4 => ProteonTokenRing,
            5 => Chaos,
            6 => Ieee802,
            7 => Arcnet,
            8 => Hyperchannel,
            9 => Lanstar,
            10 => Autonet,
            11 => LocalTalk,
            12 => LocalNet,
            13 => UltraLink,
            14 => Smds,
            15 => FrameRelay,
            16 => Atm,
            17 => Hdlc,
            18 => FibreChannel,
            19 => Atm2,
            20 => SerialLine,
            21 => Atm3,
            22 => MilStd188220,
            23 => Metricom,
            24 => Ieee1394,
            25 => Mapos,
            26 => Twinaxial,
            27 => Eui64,
            28 => HipArp,
            29 => Iso7816,
            30 => ArpSec,
            31 => IpSec,
            32 => Infiniband,
            33 => Cai,
            34 => WiegandInterface,
            35 => PureIp,
            other => {
                return Err(DhcpError::BadEnumValue {
                    name: "HwType",
                    value: other as u32,
                })
            }
        })
    }
}

/// DHCP message type (RFC 2131 §3 / option 53).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Sequence)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Result<Self, DhcpError> {
        use MessageType::*;
        Ok(match v {
            1 => Discover,
            2 => Offer,
            3 => Request,
            4 => Decline,
            5 => Ack,
            6 => Nak,
            7 => Release,
            8 => Inform,
            other => {
                return Err(DhcpError::BadEnumValue {
                    name: "MessageType",
                    value: other as u32,
                })
            }
        })
    }
}

/// DHCPv4 option codes (RFC 2132 and assorted extensions). Only the codes
/// this crate gives a typed representation to are named here; everything
/// else decodes as [`DhcpOption::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OptionCode {
    Pad = 0,
    SubnetMask = 1,
    TimeOffset = 2,
    Router = 3,
    DomainNameServer = 6,
    Hostname = 12,
    DomainName = 15,
    BroadcastAddress = 28,
    RequestedIPAddress = 50,
    IPAddressLeaseTime = 51,
    DHCPMessageType = 53,
    ServerIdentifier = 54,
    ParameterRequestList = 55,
    MaxDHCPMessageSize = 57,
    RenewTime = 58,
    RebindTime = 59,
    VendorClassIdentifier = 60,
    ClientIdentifier = 61,
    TFTPServerName = 66,
    BootfileName = 67,
    UserClassInformation = 77,
    ClientSystemArchitectureType = 93,
    ClientNetworkInterfaceIdentifier = 94,
    ClientMachineIdentifier = 97,
    DNSDomainSearchList = 119,
    TFTPServerIPAddress = 128,
    StatusCode = 151,
    PXELinuxPathPrefix = 210,
    End = 255,
}

impl OptionCode {
    /// Matches an unrecognized wire code into [`OptionCode`], or `None`
    /// if it has no typed representation (the caller should fall back
    /// to [`DhcpOption::Unknown`]).
    pub fn from_u8(v: u8) -> Option<Self> {
        use OptionCode::*;
        Some(match v {
            0 => Pad,
            1 => SubnetMask,
            2 => TimeOffset,
            3 => Router,
            6 => DomainNameServer,
            12 => Hostname,
            15 => DomainName,
            28 => BroadcastAddress,
            50 => RequestedIPAddress,
            51 => IPAddressLeaseTime,
            53 => DHCPMessageType,
            54 => ServerIdentifier,
            55 => ParameterRequestList,
            57 => MaxDHCPMessageSize,
            58 => RenewTime,
            59 => RebindTime,
            60 => VendorClassIdentifier,
            61 => ClientIdentifier,
            66 => TFTPServerName,
            67 => BootfileName,
            77 => UserClassInformation,
            93 => ClientSystemArchitectureType,
            94 => ClientNetworkInterfaceIdentifier,
            97 => ClientMachineIdentifier,
            119 => DNSDomainSearchList,
            128 => TFTPServerIPAddress,
            151 => StatusCode,
            210 => PXELinuxPathPrefix,
            255 => End,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A typed DHCPv4 option value. Unrecognized wire codes decode into
/// [`DhcpOption::Unknown`] rather than failing the whole message, so a
/// vendor-specific option never breaks parsing of the rest of the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    Pad,
    SubnetMask(Ipv4Addr),
    TimeOffset(i32),
    Router(Vec<Ipv4Addr>),
    DomainNameServer(Vec<Ipv4Addr>),
    Hostname(String),
    DomainName(String),
    BroadcastAddress(Ipv4Addr),
    RequestedIPAddress(Ipv4Addr),
    IPAddressLeaseTime(u32),
    DHCPMessageType(MessageType),
    ServerIdentifier(Ipv4Addr),
    ParameterRequestList(Vec<u8>),
    MaxDHCPMessageSize(u16),
    RenewTime(u32),
    RebindTime(u32),
    VendorClassIdentifier(Vec<u8>),
    ClientIdentifier(Vec<u8>),
    TFTPServerName(String),
    BootfileName(String),
    UserClassInformation(Vec<u8>),
    ClientSystemArchitectureType(Vec<Arch>),
    ClientNetworkInterfaceIdentifier { major: u8, minor: u8 },
    ClientMachineIdentifier(Vec<u8>),
    DNSDomainSearchList(Vec<String>),
    TFTPServerIPAddress(Ipv4Addr),
    StatusCode { status: StatusCode, message: String },
    PXELinuxPathPrefix(String),
    End,
    /// Any option code this crate gives no typed meaning to.
    Unknown { code: u8, data: Vec<u8> },
}

impl DhcpOption {
    pub fn code(&self) -> u8 {
        use DhcpOption::*;
        match self {
            Pad => OptionCode::Pad.code(),
            SubnetMask(_) => OptionCode::SubnetMask.code(),
            TimeOffset(_) => OptionCode::TimeOffset.code(),
            Router(_) => OptionCode::Router.code(),
            DomainNameServer(_) => OptionCode::DomainNameServer.code(),
            Hostname(_) => OptionCode::Hostname.code(),
            DomainName(_) => OptionCode::DomainName.code(),
            BroadcastAddress(_) => OptionCode::BroadcastAddress.code(),
            RequestedIPAddress(_) => OptionCode::RequestedIPAddress.code(),
            IPAddressLeaseTime(_) => OptionCode::IPAddressLeaseTime.code(),
            DHCPMessageType(_) => OptionCode::DHCPMessageType.code(),
            ServerIdentifier(_) => OptionCode::ServerIdentifier.code(),
            ParameterRequestList(_) => OptionCode::ParameterRequestList.code(),
            MaxDHCPMessageSize(_) => OptionCode::MaxDHCPMessageSize.code(),
            RenewTime(_) => OptionCode::RenewTime.code(),
            RebindTime(_) => OptionCode::RebindTime.code(),
            VendorClassIdentifier(_) => OptionCode::VendorClassIdentifier.code(),
            ClientIdentifier(_) => OptionCode::ClientIdentifier.code(),
            TFTPServerName(_) => OptionCode::TFTPServerName.code(),
            BootfileName(_) => OptionCode::BootfileName.code(),
            UserClassInformation(_) => OptionCode::UserClassInformation.code(),
            ClientSystemArchitectureType(_) => OptionCode::ClientSystemArchitectureType.code(),
            ClientNetworkInterfaceIdentifier { .. } => {
                OptionCode::ClientNetworkInterfaceIdentifier.code()
            }
            ClientMachineIdentifier(_) => OptionCode::ClientMachineIdentifier.code(),
            DNSDomainSearchList(_) => OptionCode::DNSDomainSearchList.code(),
            TFTPServerIPAddress(_) => OptionCode::TFTPServerIPAddress.code(),
            StatusCode { .. } => OptionCode::StatusCode.code(),
            PXELinuxPathPrefix(_) => OptionCode::PXELinuxPathPrefix.code(),
            End => OptionCode::End.code(),
            Unknown { code, .. } => *code,
        }
    }

    /// Decodes one option's payload, given its wire code and the bytes
    /// between its length byte and the next option's code byte.
    pub fn decode(code: u8, data: &[u8]) -> Result<Self, DhcpError> {
        let mut c = Cursor::new(data);
        Ok(match OptionCode::from_u8(code) {
            Some(OptionCode::Pad) => DhcpOption::Pad,
            Some(OptionCode::SubnetMask) => DhcpOption::SubnetMask(c.read_ipv4()?),
            Some(OptionCode::TimeOffset) => DhcpOption::TimeOffset(c.read_i32()?),
            Some(OptionCode::Router) => {
                DhcpOption::Router(c.read_greedy_list(|c| c.read_ipv4())?)
            }
            Some(OptionCode::DomainNameServer) => {
                DhcpOption::DomainNameServer(c.read_greedy_list(|c| c.read_ipv4())?)
            }
            Some(OptionCode::Hostname) => {
                DhcpOption::Hostname(String::from_utf8_lossy(c.read_greedy()).into_owned())
            }
            Some(OptionCode::DomainName) => {
                DhcpOption::DomainName(String::from_utf8_lossy(c.read_greedy()).into_owned())
            }
            Some(OptionCode::BroadcastAddress) => {
                DhcpOption::BroadcastAddress(c.read_ipv4()?)
            }
            Some(OptionCode::RequestedIPAddress) => {
                DhcpOption::RequestedIPAddress(c.read_ipv4()?)
            }
            Some(OptionCode::IPAddressLeaseTime) => {
                DhcpOption::IPAddressLeaseTime(c.read_u32()?)
            }
            Some(OptionCode::DHCPMessageType) => {
                DhcpOption::DHCPMessageType(MessageType::from_u8(c.read_u8()?)?)
            }
            Some(OptionCode::ServerIdentifier) => {
                DhcpOption::ServerIdentifier(c.read_ipv4()?)
            }
            Some(OptionCode::ParameterRequestList) => {
                DhcpOption::ParameterRequestList(c.read_greedy().to_vec())
            }
            Some(OptionCode::MaxDHCPMessageSize) => {
                DhcpOption::MaxDHCPMessageSize(c.read_u16()?)
            }
            Some(OptionCode::RenewTime) => DhcpOption::RenewTime(c.read_u32()?),
            Some(OptionCode::RebindTime) => DhcpOption::RebindTime(c.read_u32()?),
            Some(OptionCode::VendorClassIdentifier) => {
                DhcpOption::VendorClassIdentifier(c.read_greedy().to_vec())
            }
            Some(OptionCode::ClientIdentifier) => {
                DhcpOption::ClientIdentifier(c.read_greedy().to_vec())
            }
            Some(OptionCode::TFTPServerName) => DhcpOption::TFTPServerName(
                String::from_utf8_lossy(c.read_greedy()).into_owned(),
            ),
            Some(OptionCode::BootfileName) => DhcpOption::BootfileName(
                String::from_utf8_lossy(c.read_greedy()).into_owned(),
            ),
            Some(OptionCode::UserClassInformation) => {
                DhcpOption::UserClassInformation(c.read_greedy().to_vec())
            }
            Some(OptionCode::ClientSystemArchitectureType) => {
                DhcpOption::ClientSystemArchitectureType(
                    c.read_greedy_list(|c| Arch::from_u16(c.read_u16()?))?,
                )
            }
            Some(OptionCode::ClientNetworkInterfaceIdentifier) => {
                let _type = c.read_u8()?;
                let major = c.read_u8()?;
                let minor = c.read_u8()?;
                DhcpOption::ClientNetworkInterfaceIdentifier { major, minor }
            }
            Some(OptionCode::ClientMachineIdentifier) => {
                DhcpOption::ClientMachineIdentifier(c.read_greedy().to_vec())
            }
            Some(OptionCode::DNSDomainSearchList) => {
                let mut names = Vec::new();
                while !c.is_empty() {
                    names.push(c.read_domain_name()?);
                }
                DhcpOption::DNSDomainSearchList(names)
            }
            Some(OptionCode::TFTPServerIPAddress) => {
                DhcpOption::TFTPServerIPAddress(c.read_ipv4()?)
            }
            Some(OptionCode::StatusCode) => {
                let status = StatusCode::from_u8(c.read_u8()?);
                let message = String::from_utf8_lossy(c.read_greedy()).into_owned();
                DhcpOption::StatusCode { status, message }
            }
            Some(OptionCode::PXELinuxPathPrefix) => DhcpOption::PXELinuxPathPrefix(
                String::from_utf8_lossy(c.read_greedy()).into_owned(),
            ),
            Some(OptionCode::End) => DhcpOption::End,
            None => DhcpOption::Unknown {
                code,
                data: data.to_vec(),
            },
        })
    }

    /// Encodes this option's payload (not including the code/length header).
    pub fn encode_value(&self) -> Result<Vec<u8>, DhcpError> {
        let mut w = Writer::new();
        match self {
            DhcpOption::Pad | DhcpOption::End => {}
            DhcpOption::SubnetMask(ip)
            | DhcpOption::BroadcastAddress(ip)
            | DhcpOption::RequestedIPAddress(ip)
            | DhcpOption::ServerIdentifier(ip)
            | DhcpOption::TFTPServerIPAddress(ip) => w.write_ipv4(*ip),
            DhcpOption::TimeOffset(v) => w.write_i32(*v),
            DhcpOption::Router(ips) | DhcpOption::DomainNameServer(ips) => {
                for ip in ips {
                    w.write_ipv4(*ip);
                }
            }
            DhcpOption::Hostname(s)
            | DhcpOption::DomainName(s)
            | DhcpOption::TFTPServerName(s)
            | DhcpOption::BootfileName(s)
            | DhcpOption::PXELinuxPathPrefix(s) => w.write_slice(s.as_bytes()),
            DhcpOption::IPAddressLeaseTime(v)
            | DhcpOption::RenewTime(v)
            | DhcpOption::RebindTime(v) => w.write_u32(*v),
            DhcpOption::DHCPMessageType(mt) => w.write_u8(*mt as u8),
            DhcpOption::ParameterRequestList(codes) => w.write_slice(codes),
            DhcpOption::MaxDHCPMessageSize(v) => w.write_u16(*v),
            DhcpOption::VendorClassIdentifier(v)
            | DhcpOption::ClientIdentifier(v)
            | DhcpOption::UserClassInformation(v)
            | DhcpOption::ClientMachineIdentifier(v) => w.write_slice(v),
            DhcpOption::ClientSystemArchitectureType(archs) => {
                for a in archs {
                    w.write_u16(*a as u16);
                }
            }
            DhcpOption::ClientNetworkInterfaceIdentifier { major, minor } => {
                w.write_u8(1);
                w.write_u8(*major);
                w.write_u8(*minor);
            }
            DhcpOption::DNSDomainSearchList(names) => {
                for name in names {
                    w.write_domain_name(name)?;
                }
            }
            DhcpOption::StatusCode { status, message } => {
                w.write_u8((*status).into());
                w.write_slice(message.as_bytes());
            }
            DhcpOption::Unknown { data, .. } => w.write_slice(data),
        }
        let bytes = w.into_bytes();
        if bytes.len() > u8::MAX as usize {
            return Err(DhcpError::OptionTooLong { len: bytes.len() });
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_message_type() {
        let opt = DhcpOption::DHCPMessageType(MessageType::Discover);
        let value = opt.encode_value().unwrap();
        let decoded = DhcpOption::decode(opt.code(), &value).unwrap();
        assert_eq!(opt, decoded);
    }

    #[test]
    fn roundtrip_router_list() {
        let opt = DhcpOption::Router(vec![
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        ]);
        let value = opt.encode_value().unwrap();
        assert_eq!(value.len(), 8);
        let decoded = DhcpOption::decode(opt.code(), &value).unwrap();
        assert_eq!(opt, decoded);
    }

    #[test]
    fn unknown_code_preserved() {
        let decoded = DhcpOption::decode(200, &[1, 2, 3]).unwrap();
        assert_eq!(
            decoded,
            DhcpOption::Unknown {
                code: 200,
                data: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn oversized_option_rejected_not_truncated() {
        let opt = DhcpOption::ClientIdentifier(vec![0u8; 300]);
        assert!(matches!(
            opt.encode_value(),
            Err(DhcpError::OptionTooLong { len: 300 })
        ));
    }

    #[test]
    fn domain_search_list_roundtrip() {
        let opt = DhcpOption::DNSDomainSearchList(vec![
            "eng.example.com".to_string(),
            "example.com".to_string(),
        ]);
        let value = opt.encode_value().unwrap();
        let decoded = DhcpOption::decode(opt.code(), &value).unwrap();
        assert_eq!(opt, decoded);
    }
}
