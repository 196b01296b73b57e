//! Shared error taxonomy for the wire codec and the session state machine.
//!
//! Every [`DhcpError`] carries a [`StatusCode`] (the IANA status codes
//! shared between DHCPv4 `StatusCode` option and DHCPv6), so that a
//! session can turn any handler failure into a `StatusCode` option on a
//! Nak without a separate translation table.

use thiserror::Error;

/// IANA DHCP/DHCPv6 status codes (RFC 3315 §24.4, RFC 5007, RFC 5460, RFC 7653, RFC 8156).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    UnspecFail = 1,
    NoAddrsAvail = 2,
    NoBinding = 3,
    NotOnLink = 4,
    UseMulticast = 5,
    NoPrefixAvail = 6,
    UnknownQueryType = 7,
    MalformedQuery = 8,
    NotConfigured = 9,
    NotAllowed = 10,
    QueryTerminated = 11,
    DataMissing = 12,
    CatchUpComplete = 13,
    NotSupported = 14,
    TlsConnectionRefused = 15,
    AddressInUse = 16,
    ConfigurationConflict = 17,
    MissingBindingInformation = 18,
    OutdatedBindingInformation = 19,
    ServerShuttingDown = 20,
    DnsUpdateNotSupported = 21,
    ExcessiveTimeSkew = 22,
}

impl StatusCode {
    pub fn from_u8(code: u8) -> Self {
        use StatusCode::*;
        match code {
            0 => Success,
            2 => NoAddrsAvail,
            3 => NoBinding,
            4 => NotOnLink,
            5 => UseMulticast,
            6 => NoPrefixAvail,
            7 => UnknownQueryType,
            8 => MalformedQuery,
            9 => NotConfigured,
            10 => NotAllowed,
            11 => QueryTerminated,
            12 => DataMissing,
            13 => CatchUpComplete,
            14 => NotSupported,
            15 => TlsConnectionRefused,
            16 => AddressInUse,
            17 => ConfigurationConflict,
            18 => MissingBindingInformation,
            19 => OutdatedBindingInformation,
            20 => ServerShuttingDown,
            21 => DnsUpdateNotSupported,
            22 => ExcessiveTimeSkew,
            _ => UnspecFail,
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(value: StatusCode) -> Self {
        value as u8
    }
}

/// Errors raised while decoding wire data, dispatching a session, or
/// allocating a lease. Every variant carries (or derives) a [`StatusCode`]
/// so the session can append a `StatusCode` option without guesswork.
#[derive(Debug, Error)]
pub enum DhcpError {
    #[error("buffer too short: needed {needed} bytes, had {available}")]
    ShortBuffer { needed: usize, available: usize },

    #[error("bad magic cookie: {0:02x?}")]
    BadMagicCookie([u8; 4]),

    #[error("unrecognized value {value} for enum {name}")]
    BadEnumValue { name: &'static str, value: u32 },

    #[error("option payload of {len} bytes exceeds the 255 byte wire limit")]
    OptionTooLong { len: usize },

    #[error("missing DHCP message type option")]
    MissingMessageType,

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("unknown query type: {0}")]
    UnknownQueryType(String),

    #[error("no addresses available")]
    NoAddrsAvailable,

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("address already in use")]
    AddressInUse,

    #[error("{0}")]
    UnspecFail(String),
}

impl DhcpError {
    /// The [`StatusCode`] this error should be reported under.
    pub fn code(&self) -> StatusCode {
        use DhcpError::*;
        match self {
            ShortBuffer { .. }
            | BadMagicCookie(_)
            | BadEnumValue { .. }
            | OptionTooLong { .. } => StatusCode::MalformedQuery,
            MissingMessageType => StatusCode::UnknownQueryType,
            MalformedQuery(_) => StatusCode::MalformedQuery,
            UnknownQueryType(_) => StatusCode::UnknownQueryType,
            NoAddrsAvailable => StatusCode::NoAddrsAvail,
            NotAllowed(_) => StatusCode::NotAllowed,
            NotSupported(_) => StatusCode::NotSupported,
            AddressInUse => StatusCode::AddressInUse,
            UnspecFail(_) => StatusCode::UnspecFail,
        }
    }
}

pub type DhcpResult<T> = Result<T, DhcpError>;
