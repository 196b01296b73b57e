//! DHCPv6 (RFC 8415): wire codec only. Kept alongside the v4 server for
//! wire-format symmetry; no session/backend logic is implemented for v6.

pub mod duid;
pub mod message;
pub mod option;

pub use duid::{Duid, DuidType};
pub use message::{Message, MessageType, RelayForwardMessage, RelayReplyMessage};
pub use option::{DhcpOption, OptionCode};
