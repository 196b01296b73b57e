//! On-disk server configuration: the one piece of "configuration loading"
//! this crate owns. Deserialized from TOML; not a CLI.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{DhcpError, DhcpResult};
use crate::v4::lease::{mac_key, MemoryBackend};
use crate::v4::pxe::{PxeConfig, PxeOverlay};

fn default_lease_seconds() -> u64 {
    crate::v4::lease::DEFAULT_LEASE.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
    #[serde(default)]
    pub dns_search: Vec<String>,
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
    #[serde(default)]
    pub static_reservations: Vec<StaticReservation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticReservation {
    pub mac: String,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub expiration_seconds: Option<u64>,
    #[serde(default)]
    pub maxsize: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PxeServerConfig {
    pub ipaddr: Ipv4Addr,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub server_id: Ipv4Addr,
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub pxe: Option<PxeServerConfig>,
    #[serde(default)]
    pub verbosity: u64,
}

impl ServerConfig {
    pub fn from_path(path: impl AsRef<Path>) -> DhcpResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| DhcpError::UnspecFail(format!("failed to read config: {e}")))?;
        toml::from_str(&raw).map_err(|e| DhcpError::UnspecFail(format!("invalid config: {e}")))
    }

    /// Builds the `MemoryBackend` this configuration describes, with its
    /// static reservations already applied.
    pub fn build_backend(&self) -> DhcpResult<MemoryBackend> {
        let net = &self.network;
        let mut backend = MemoryBackend::new(net.network, net.prefix_len, net.gateway, net.dns.clone())
            .with_default_lease(Duration::from_secs(net.lease_seconds));
        if !net.dns_search.is_empty() {
            backend = backend.with_dns_search(net.dns_search.clone());
        }
        for reservation in &net.static_reservations {
            let mac = parse_mac(&reservation.mac)?;
            backend.set_static(&mac_key(&mac), reservation.address);
        }
        Ok(backend)
    }

    /// Builds the PXE overlay this configuration describes, if any.
    pub fn build_pxe(&self) -> Option<PxeOverlay> {
        let pxe = self.pxe.as_ref()?;
        let mut config = PxeConfig::new(pxe.ipaddr);
        config.primary = pxe.primary;
        config.prefix = pxe.prefix.clone();
        config.hostname = pxe.hostname.clone();
        config.filename = pxe.filename.clone();
        Some(PxeOverlay::new(config))
    }
}

/// Parses a colon-separated MAC address string (`aa:bb:cc:dd:ee:ff`) into
/// raw bytes, as used by `static_reservations` entries.
fn parse_mac(text: &str) -> DhcpResult<Vec<u8>> {
    text.split(':')
        .map(|byte| {
            u8::from_str_radix(byte, 16)
                .map_err(|_| DhcpError::MalformedQuery(format!("invalid MAC address: {text}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4::lease::Backend;

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            bind_address = "0.0.0.0:67"
            server_id = "192.168.1.1"

            [network]
            network = "192.168.1.0"
            prefix_len = 24
            gateway = "192.168.1.1"
            dns = ["8.8.8.8"]
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.network.prefix_len, 24);
        assert_eq!(config.network.lease_seconds, default_lease_seconds());
        assert!(config.pxe.is_none());
    }

    #[test]
    fn parses_static_reservations_and_pxe() {
        let toml = r#"
            bind_address = "0.0.0.0:67"
            server_id = "192.168.1.1"

            [network]
            network = "192.168.1.0"
            prefix_len = 24
            gateway = "192.168.1.1"

            [[network.static_reservations]]
            mac = "aa:bb:cc:dd:ee:ff"
            address = "192.168.1.50"

            [pxe]
            ipaddr = "192.168.1.2"
            primary = true
            filename = "pxelinux.0"
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        let backend = config.build_backend().unwrap();
        let mac = mac_key(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        let assigned = backend.request_address(&mac, None).unwrap();
        assert_eq!(assigned.address, Ipv4Addr::new(192, 168, 1, 50));
        assert!(config.build_pxe().is_some());
    }

    #[test]
    fn rejects_malformed_mac() {
        assert!(parse_mac("not-a-mac").is_err());
    }
}
