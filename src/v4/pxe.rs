//! PXE/TFTP boot configuration overlay.
//!
//! Unlike [`super::cache::Cache`], [`PxeOverlay`] does not implement
//! [`Backend`](super::lease::Backend) — it has no opinion on address
//! assignment. It only answers when a request's parameter request list
//! asks for PXE-relevant options, synthesizing a response that carries
//! TFTP server/boot-file information (and, for a primary boot server,
//! the fixed-header `sname`/`file` fields) without consulting an address
//! backend at all. [`super::session`] consults it before the address
//! backend chain and falls through when it returns `None`.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::message::{Message, OptionList};
use super::option::{Arch, DhcpOption};

/// Option codes that signal a client is PXE-booting and wants TFTP
/// configuration in the reply.
const PXE_OPTION_CODES: [u8; 4] = [66, 67, 128, 210];

/// Per-arch or per-vendor TFTP configuration override.
#[derive(Debug, Clone, Default)]
pub struct PxeTftpConfig {
    pub filename: Option<String>,
    pub hostname: Option<String>,
    pub ipaddr: Option<Ipv4Addr>,
}

/// Dynamic sub-configuration selection rules.
#[derive(Debug, Clone, Default)]
pub struct PxeDynConfig {
    /// Client architecture (option 93) -> override.
    pub arches: HashMap<Arch, PxeTftpConfig>,
    /// Substring of the vendor class identifier (option 60) -> named config.
    pub vendors: Vec<(String, String)>,
    /// Named configs referenced by `vendors`.
    pub configs: HashMap<String, PxeTftpConfig>,
}

/// Static PXE boot server configuration.
#[derive(Debug, Clone)]
pub struct PxeConfig {
    pub ipaddr: Ipv4Addr,
    /// Whether this server also owns the DHCP `sname`/`file` header fields,
    /// as opposed to only supplying option 66/67/128.
    pub primary: bool,
    pub prefix: Option<String>,
    pub hostname: Option<String>,
    pub filename: Option<String>,
    pub dynamic: PxeDynConfig,
}

impl PxeConfig {
    pub fn new(ipaddr: Ipv4Addr) -> Self {
        PxeConfig {
            ipaddr,
            primary: false,
            prefix: None,
            hostname: None,
            filename: None,
            dynamic: PxeDynConfig::default(),
        }
    }
}

/// Resolves and applies PXE boot configuration to requests that ask for it.
pub struct PxeOverlay {
    config: PxeConfig,
}

impl PxeOverlay {
    pub fn new(config: PxeConfig) -> Self {
        PxeOverlay { config }
    }

    /// Picks the effective config for this request: arch match first,
    /// then vendor-substring match, falling back to the static config.
    fn resolve_config(&self, req: &Message) -> PxeConfig {
        let mut sub: Option<&PxeTftpConfig> = None;

        if let Some(DhcpOption::ClientSystemArchitectureType(arches)) =
            req.options.get(93)
        {
            if !self.config.dynamic.arches.is_empty() {
                for arch in arches {
                    if let Some(cfg) = self.config.dynamic.arches.get(arch) {
                        sub = Some(cfg);
                        break;
                    }
                }
            }
        }

        if sub.is_none() {
            if let Some(DhcpOption::VendorClassIdentifier(vendor)) = req.options.get(60) {
                let vendor = String::from_utf8_lossy(vendor);
                for (config_name, needle) in &self.config.dynamic.vendors {
                    if vendor.contains(needle.as_str()) {
                        if let Some(cfg) = self.config.dynamic.configs.get(config_name) {
                            sub = Some(cfg);
                            break;
                        }
                    }
                }
            }
        }

        let mut effective = self.config.clone();
        if let Some(sub) = sub {
            if sub.ipaddr.is_some() {
                effective.ipaddr = sub.ipaddr.unwrap();
            }
            if sub.hostname.is_some() {
                effective.hostname = sub.hostname.clone();
            }
            if sub.filename.is_some() {
                effective.filename = sub.filename.clone();
            }
        }
        effective
    }

    /// Synthesizes the PXE reply, or `None` if this request isn't PXE-booting.
    fn pxe_reply(&self, req: &Message) -> Option<Message> {
        let requested = req.requested_options();
        if !requested.iter().any(|code| PXE_OPTION_CODES.contains(code)) {
            return None;
        }

        let config = self.resolve_config(req);
        let mut options = OptionList::new();
        options.set(DhcpOption::TFTPServerIPAddress(config.ipaddr));
        if let Some(prefix) = &config.prefix {
            options.set(DhcpOption::PXELinuxPathPrefix(prefix.clone()));
        }
        if let Some(hostname) = &config.hostname {
            options.set(DhcpOption::TFTPServerName(hostname.clone()));
        }
        if let Some(filename) = &config.filename {
            options.set(DhcpOption::BootfileName(format!("{filename}\0")));
        }

        let mut response = req.reply(options);
        response.server_addr = config.ipaddr;
        if config.primary {
            if let Some(filename) = &config.filename {
                response.boot_file = filename.as_bytes().to_vec();
            }
            if let Some(hostname) = &config.hostname {
                response.server_name = hostname.as_bytes().to_vec();
            }
        }
        Some(response)
    }

    pub fn discover(&self, req: &Message) -> Option<Message> {
        self.pxe_reply(req)
    }

    pub fn request(&self, req: &Message) -> Option<Message> {
        self.pxe_reply(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4::message::Message;

    fn discover_with_pxe_options(codes: &[u8]) -> Message {
        let mut msg = Message::discover(1, vec![1, 2, 3, 4, 5, 6], None);
        msg.options.set(DhcpOption::ParameterRequestList(codes.to_vec()));
        msg
    }

    #[test]
    fn non_pxe_request_falls_through() {
        let overlay = PxeOverlay::new(PxeConfig::new(Ipv4Addr::new(10, 0, 0, 5)));
        let req = discover_with_pxe_options(&[1, 3, 6]);
        assert!(overlay.discover(&req).is_none());
    }

    #[test]
    fn pxe_request_gets_tftp_options() {
        let mut config = PxeConfig::new(Ipv4Addr::new(10, 0, 0, 5));
        config.filename = Some("pxelinux.0".to_string());
        let overlay = PxeOverlay::new(config);
        let req = discover_with_pxe_options(&[67]);
        let response = overlay.discover(&req).unwrap();
        assert_eq!(response.server_addr, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(
            response.options.get(67),
            Some(&DhcpOption::BootfileName("pxelinux.0\0".to_string()))
        );
    }

    #[test]
    fn arch_override_takes_priority_over_static_config() {
        let mut config = PxeConfig::new(Ipv4Addr::new(10, 0, 0, 5));
        config.filename = Some("default.efi".to_string());
        config.dynamic.arches.insert(
            Arch::EfiX86_64,
            PxeTftpConfig {
                filename: Some("x64.efi".to_string()),
                hostname: None,
                ipaddr: None,
            },
        );
        let overlay = PxeOverlay::new(config);
        let mut req = discover_with_pxe_options(&[67]);
        req.options
            .set(DhcpOption::ClientSystemArchitectureType(vec![Arch::EfiX86_64]));
        let response = overlay.discover(&req).unwrap();
        assert_eq!(
            response.options.get(67),
            Some(&DhcpOption::BootfileName("x64.efi\0".to_string()))
        );
    }
}
