//! DHCPv6 options (RFC 8415 §21). Unlike DHCPv4, every option carries a
//! 16-bit code and a 16-bit length prefix.

use std::net::Ipv6Addr;
use std::time::Duration;

use crate::error::{DhcpError, DhcpResult, StatusCode};
use crate::wire::{Cursor, Writer};

use super::duid::Duid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OptionCode {
    ClientIdentifier = 1,
    ServerIdentifier = 2,
    NonTemporaryAddress = 3,
    TemporaryAddress = 4,
    Address = 5,
    OptionRequest = 6,
    Preference = 7,
    ElapsedTime = 8,
    RelayMessage = 9,
    Authentication = 11,
    ServerUnicast = 12,
    StatusCode = 13,
    RapidCommit = 14,
    UserClass = 15,
    VendorClass = 16,
    VendorInfo = 17,
    InterfaceId = 18,
    ReconfMessage = 19,
    ReconfAccept = 20,
    DnsRecursiveNameServer = 23,
    DomainSearchList = 24,
    IdAssocPrefixDeleg = 25,
    IaPrefix = 26,
    InfoRefreshTime = 32,
    SolMaxRt = 82,
    InfMaxRt = 83,
}

impl OptionCode {
    pub fn from_u16(v: u16) -> Option<Self> {
        use OptionCode::*;
        Some(match v {
            1 => ClientIdentifier,
            2 => ServerIdentifier,
            3 => NonTemporaryAddress,
            4 => TemporaryAddress,
            5 => Address,
            6 => OptionRequest,
            7 => Preference,
            8 => ElapsedTime,
            9 => RelayMessage,
            11 => Authentication,
            12 => ServerUnicast,
            13 => StatusCode,
            14 => RapidCommit,
            15 => UserClass,
            16 => VendorClass,
            17 => VendorInfo,
            18 => InterfaceId,
            19 => ReconfMessage,
            20 => ReconfAccept,
            23 => DnsRecursiveNameServer,
            24 => DomainSearchList,
            25 => IdAssocPrefixDeleg,
            26 => IaPrefix,
            32 => InfoRefreshTime,
            82 => SolMaxRt,
            83 => InfMaxRt,
            _ => return None,
        })
    }

    pub fn code(&self) -> u16 {
        *self as u16
    }
}

/// A decoded DHCPv6 option. Unrecognized codes are preserved verbatim in
/// `Unknown` rather than rejected, matching how an unrecognized vendor or
/// future option should be carried through by a relay or server.
#[derive(Debug, Clone, PartialEq)]
pub enum DhcpOption {
    ClientIdentifier(Duid),
    ServerIdentifier(Duid),
    NonTemporaryAddress {
        iaid: u32,
        t1: u32,
        t2: u32,
        options: Vec<u8>,
    },
    TemporaryAddress {
        iaid: u32,
        options: Vec<u8>,
    },
    Address {
        address: Ipv6Addr,
        pref_lifetime: Duration,
        valid_lifetime: Duration,
        options: Vec<u8>,
    },
    OptionRequest(Vec<u16>),
    Preference(u8),
    ElapsedTime(Duration),
    RelayMessage(Vec<u8>),
    Authentication {
        protocol: u8,
        algorithm: u8,
        rdm: u8,
        replay_detection: [u8; 8],
        info: Vec<u8>,
    },
    ServerUnicast(Ipv6Addr),
    StatusCode { status: StatusCode, message: Vec<u8> },
    IdAssocPrefixDeleg {
        iaid: u32,
        t1: Duration,
        t2: Duration,
        options: Vec<u8>,
    },
    IaPrefix {
        pref_lifetime: Duration,
        valid_lifetime: Duration,
        prefix_length: u8,
        prefix: Ipv6Addr,
        options: Vec<u8>,
    },
    Unknown { code: u16, data: Vec<u8> },
}

impl DhcpOption {
    pub fn code(&self) -> u16 {
        use DhcpOption::*;
        match self {
            ClientIdentifier(_) => OptionCode::ClientIdentifier.code(),
            ServerIdentifier(_) => OptionCode::ServerIdentifier.code(),
            NonTemporaryAddress { .. } => OptionCode::NonTemporaryAddress.code(),
            TemporaryAddress { .. } => OptionCode::TemporaryAddress.code(),
            Address { .. } => OptionCode::Address.code(),
            OptionRequest(_) => OptionCode::OptionRequest.code(),
            Preference(_) => OptionCode::Preference.code(),
            ElapsedTime(_) => OptionCode::ElapsedTime.code(),
            RelayMessage(_) => OptionCode::RelayMessage.code(),
            Authentication { .. } => OptionCode::Authentication.code(),
            ServerUnicast(_) => OptionCode::ServerUnicast.code(),
            StatusCode { .. } => OptionCode::StatusCode.code(),
            IdAssocPrefixDeleg { .. } => OptionCode::IdAssocPrefixDeleg.code(),
            IaPrefix { .. } => OptionCode::IaPrefix.code(),
            Unknown { code, .. } => *code,
        }
    }

    pub fn decode(code: u16, data: &[u8]) -> DhcpResult<Self> {
        let Some(known) = OptionCode::from_u16(code) else {
            return Ok(DhcpOption::Unknown {
                code,
                data: data.to_vec(),
            });
        };
        let mut c = Cursor::new(data);
        Ok(match known {
            OptionCode::ClientIdentifier => DhcpOption::ClientIdentifier(Duid::decode(data)?),
            OptionCode::ServerIdentifier => DhcpOption::ServerIdentifier(Duid::decode(data)?),
            OptionCode::NonTemporaryAddress => DhcpOption::NonTemporaryAddress {
                iaid: c.read_u32()?,
                t1: c.read_u32()?,
                t2: c.read_u32()?,
                options: c.read_greedy().to_vec(),
            },
            OptionCode::TemporaryAddress => DhcpOption::TemporaryAddress {
                iaid: c.read_u32()?,
                options: c.read_greedy().to_vec(),
            },
            OptionCode::Address => DhcpOption::Address {
                address: c.read_ipv6()?,
                pref_lifetime: Duration::from_secs(c.read_u32()? as u64),
                valid_lifetime: Duration::from_secs(c.read_u32()? as u64),
                options: c.read_greedy().to_vec(),
            },
            OptionCode::OptionRequest => {
                let mut codes = Vec::new();
                while !c.is_empty() {
                    codes.push(c.read_u16()?);
                }
                DhcpOption::OptionRequest(codes)
            }
            OptionCode::Preference => DhcpOption::Preference(c.read_u8()?),
            OptionCode::ElapsedTime => {
                DhcpOption::ElapsedTime(Duration::from_millis(c.read_u16()? as u64 * 10))
            }
            OptionCode::RelayMessage => DhcpOption::RelayMessage(c.read_greedy().to_vec()),
            OptionCode::Authentication => DhcpOption::Authentication {
                protocol: c.read_u8()?,
                algorithm: c.read_u8()?,
                rdm: c.read_u8()?,
                replay_detection: c.read_fixed(8)?.try_into().unwrap(),
                info: c.read_greedy().to_vec(),
            },
            OptionCode::ServerUnicast => DhcpOption::ServerUnicast(c.read_ipv6()?),
            OptionCode::StatusCode => DhcpOption::StatusCode {
                status: StatusCode::from_u8(c.read_u16()? as u8),
                message: c.read_greedy().to_vec(),
            },
            OptionCode::IdAssocPrefixDeleg => DhcpOption::IdAssocPrefixDeleg {
                iaid: c.read_u32()?,
                t1: Duration::from_secs(c.read_u32()? as u64),
                t2: Duration::from_secs(c.read_u32()? as u64),
                options: c.read_greedy().to_vec(),
            },
            OptionCode::IaPrefix => DhcpOption::IaPrefix {
                pref_lifetime: Duration::from_secs(c.read_u32()? as u64),
                valid_lifetime: Duration::from_secs(c.read_u32()? as u64),
                prefix_length: c.read_u8()?,
                prefix: c.read_ipv6()?,
                options: c.read_greedy().to_vec(),
            },
            _ => DhcpOption::Unknown {
                code,
                data: data.to_vec(),
            },
        })
    }

    pub fn encode_value(&self) -> DhcpResult<Vec<u8>> {
        let mut w = Writer::new();
        match self {
            DhcpOption::ClientIdentifier(duid) | DhcpOption::ServerIdentifier(duid) => {
                return Ok(duid.encode());
            }
            DhcpOption::NonTemporaryAddress {
                iaid,
                t1,
                t2,
                options,
            } => {
                w.write_u32(*iaid);
                w.write_u32(*t1);
                w.write_u32(*t2);
                w.write_slice(options);
            }
            DhcpOption::TemporaryAddress { iaid, options } => {
                w.write_u32(*iaid);
                w.write_slice(options);
            }
            DhcpOption::Address {
                address,
                pref_lifetime,
                valid_lifetime,
                options,
            } => {
                w.write_ipv6(*address);
                w.write_u32(pref_lifetime.as_secs() as u32);
                w.write_u32(valid_lifetime.as_secs() as u32);
                w.write_slice(options);
            }
            DhcpOption::OptionRequest(codes) => {
                for code in codes {
                    w.write_u16(*code);
                }
            }
            DhcpOption::Preference(p) => w.write_u8(*p),
            DhcpOption::ElapsedTime(d) => {
                w.write_u16((d.as_millis() / 10).min(u16::MAX as u128) as u16)
            }
            DhcpOption::RelayMessage(data) => w.write_slice(data),
            DhcpOption::Authentication {
                protocol,
                algorithm,
                rdm,
                replay_detection,
                info,
            } => {
                w.write_u8(*protocol);
                w.write_u8(*algorithm);
                w.write_u8(*rdm);
                w.write_slice(replay_detection);
                w.write_slice(info);
            }
            DhcpOption::ServerUnicast(addr) => w.write_ipv6(*addr),
            DhcpOption::StatusCode { status, message } => {
                w.write_u16(u8::from(*status) as u16);
                w.write_slice(message);
            }
            DhcpOption::IdAssocPrefixDeleg {
                iaid,
                t1,
                t2,
                options,
            } => {
                w.write_u32(*iaid);
                w.write_u32(t1.as_secs() as u32);
                w.write_u32(t2.as_secs() as u32);
                w.write_slice(options);
            }
            DhcpOption::IaPrefix {
                pref_lifetime,
                valid_lifetime,
                prefix_length,
                prefix,
                options,
            } => {
                w.write_u32(pref_lifetime.as_secs() as u32);
                w.write_u32(valid_lifetime.as_secs() as u32);
                w.write_u8(*prefix_length);
                w.write_ipv6(*prefix);
                w.write_slice(options);
            }
            DhcpOption::Unknown { data, .. } => w.write_slice(data),
        }
        let bytes = w.into_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(DhcpError::OptionTooLong { len: bytes.len() });
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4::option::HwType;

    #[test]
    fn client_identifier_roundtrips() {
        let opt = DhcpOption::ClientIdentifier(Duid::LinkLayer {
            hw_type: HwType::Ethernet,
            address: vec![1, 2, 3, 4, 5, 6],
        });
        let bytes = opt.encode_value().unwrap();
        let decoded = DhcpOption::decode(OptionCode::ClientIdentifier.code(), &bytes).unwrap();
        assert_eq!(decoded, opt);
    }

    #[test]
    fn option_request_list_roundtrips() {
        let opt = DhcpOption::OptionRequest(vec![23, 24]);
        let bytes = opt.encode_value().unwrap();
        let decoded = DhcpOption::decode(OptionCode::OptionRequest.code(), &bytes).unwrap();
        assert_eq!(decoded, opt);
    }

    #[test]
    fn unknown_code_is_preserved() {
        let opt = DhcpOption::decode(9999, &[1, 2, 3]).unwrap();
        assert_eq!(
            opt,
            DhcpOption::Unknown {
                code: 9999,
                data: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn status_code_roundtrips() {
        let opt = DhcpOption::StatusCode {
            status: StatusCode::NoAddrsAvail,
            message: b"no addresses".to_vec(),
        };
        let bytes = opt.encode_value().unwrap();
        let decoded = DhcpOption::decode(OptionCode::StatusCode.code(), &bytes).unwrap();
        assert_eq!(decoded, opt);
    }
}
