//! DHCP Unique Identifiers (RFC 8415 §11).

use chrono::{DateTime, TimeZone, Utc};

use crate::error::DhcpError;
use crate::wire::{Cursor, Writer};
use crate::v4::option::HwType;

/// The DUID epoch: midnight UTC, January 1st 2000 (RFC 8415 §11.2).
fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DuidType {
    LinkLayerPlusTime = 1,
    EnterpriseNumber = 2,
    LinkLayer = 3,
    UniqueIdentifier = 4,
}

impl DuidType {
    pub fn from_u16(v: u16) -> Result<Self, DhcpError> {
        match v {
            1 => Ok(DuidType::LinkLayerPlusTime),
            2 => Ok(DuidType::EnterpriseNumber),
            3 => Ok(DuidType::LinkLayer),
            4 => Ok(DuidType::UniqueIdentifier),
            other => Err(DhcpError::BadEnumValue {
                name: "DuidType",
                value: other as u32,
            }),
        }
    }
}

/// A DHCP Unique Identifier, as carried in the `ClientIdentifier` and
/// `ServerIdentifier` DHCPv6 options.
#[derive(Debug, Clone, PartialEq)]
pub enum Duid {
    LinkLayerPlusTime {
        hw_type: HwType,
        time: DateTime<Utc>,
        address: Vec<u8>,
    },
    /// IANA Private Enterprise Number. The wire format splits the 32-bit
    /// number into two big-endian halves; we reassemble it into one `u32`.
    EnterpriseNumber { enterprise_number: u32, identifier: Vec<u8> },
    LinkLayer { hw_type: HwType, address: Vec<u8> },
    UniqueIdentifier([u8; 128]),
}

impl Duid {
    pub fn duid_type(&self) -> DuidType {
        match self {
            Duid::LinkLayerPlusTime { .. } => DuidType::LinkLayerPlusTime,
            Duid::EnterpriseNumber { .. } => DuidType::EnterpriseNumber,
            Duid::LinkLayer { .. } => DuidType::LinkLayer,
            Duid::UniqueIdentifier(_) => DuidType::UniqueIdentifier,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u16(self.duid_type() as u16);
        match self {
            Duid::LinkLayerPlusTime {
                hw_type,
                time,
                address,
            } => {
                w.write_u16(*hw_type as u16);
                let secs = (*time - epoch()).num_seconds().max(0) as u32;
                w.write_u32(secs);
                w.write_slice(address);
            }
            Duid::EnterpriseNumber {
                enterprise_number,
                identifier,
            } => {
                w.write_u16((*enterprise_number >> 16) as u16);
                w.write_u16((*enterprise_number & 0xFFFF) as u16);
                w.write_slice(identifier);
            }
            Duid::LinkLayer { hw_type, address } => {
                w.write_u16(*hw_type as u16);
                w.write_slice(address);
            }
            Duid::UniqueIdentifier(uuid) => w.write_slice(uuid),
        }
        w.into_bytes()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DhcpError> {
        let mut c = Cursor::new(raw);
        let duid_type = DuidType::from_u16(c.read_u16()?)?;
        Ok(match duid_type {
            DuidType::LinkLayerPlusTime => {
                let hw_type = HwType::from_u8(c.read_u16()? as u8)?;
                let secs = c.read_u32()?;
                let time = epoch() + chrono::Duration::seconds(secs as i64);
                Duid::LinkLayerPlusTime {
                    hw_type,
                    time,
                    address: c.read_greedy().to_vec(),
                }
            }
            DuidType::EnterpriseNumber => {
                let hi = c.read_u16()? as u32;
                let lo = c.read_u16()? as u32;
                Duid::EnterpriseNumber {
                    enterprise_number: (hi << 16) | lo,
                    identifier: c.read_greedy().to_vec(),
                }
            }
            DuidType::LinkLayer => {
                let hw_type = HwType::from_u8(c.read_u16()? as u8)?;
                Duid::LinkLayer {
                    hw_type,
                    address: c.read_greedy().to_vec(),
                }
            }
            DuidType::UniqueIdentifier => {
                let raw = c.read_fixed(128)?;
                Duid::UniqueIdentifier(raw.try_into().unwrap())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_layer_roundtrips() {
        let duid = Duid::LinkLayer {
            hw_type: HwType::Ethernet,
            address: vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
        };
        let bytes = duid.encode();
        assert_eq!(Duid::decode(&bytes).unwrap(), duid);
    }

    #[test]
    fn enterprise_number_reassembles_32_bits() {
        let duid = Duid::EnterpriseNumber {
            enterprise_number: 0x0001_0002,
            identifier: vec![1, 2, 3],
        };
        let bytes = duid.encode();
        assert_eq!(Duid::decode(&bytes).unwrap(), duid);
    }

    #[test]
    fn link_layer_plus_time_roundtrips() {
        let time = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let duid = Duid::LinkLayerPlusTime {
            hw_type: HwType::Ethernet,
            time,
            address: vec![1, 2, 3, 4, 5, 6],
        };
        let bytes = duid.encode();
        assert_eq!(Duid::decode(&bytes).unwrap(), duid);
    }
}
