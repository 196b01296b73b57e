//! DHCPv4 (RFC 2131/2132): wire codec, address backends, and the server
//! session state machine.

pub mod cache;
pub mod client;
pub mod lease;
pub mod message;
pub mod option;
pub mod pxe;
pub mod session;

pub use client::{Client, IpAssignment};
pub use lease::{Assignment, Backend, IpRecord, MemoryBackend};
pub use message::{Message, OptionList};
pub use option::{Arch, DhcpOption, HwType, MessageType, OpCode, OptionCode};
pub use pxe::{PxeConfig, PxeDynConfig, PxeOverlay, PxeTftpConfig};
pub use session::Session;
