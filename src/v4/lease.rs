//! Address-assignment backends.
//!
//! A [`Backend`] turns a DISCOVER/REQUEST into an [`Assignment`], and a
//! DECLINE/RELEASE into a freed address. [`MemoryBackend`] is the only
//! backend that actually owns address state; [`super::cache`] and
//! [`super::pxe`] wrap a backend to add caching and PXE-specific overlays
//! without needing to know how addresses are allocated underneath them.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::StatusCode;

use super::message::{Message, OptionList};
use super::option::DhcpOption;

/// Default lease length when neither a static record nor the caller
/// specifies one.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(3600);

/// Lowercases and strips separators from a MAC-style key, the same
/// normalization a hex digest of `client_hw` already gives us.
pub fn mac_key(hwaddr: &[u8]) -> String {
    hwaddr.iter().map(|b| format!("{b:02x}")).collect()
}

/// A granted IP assignment, independent of wire representation.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub routers: Vec<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub dns_search: Vec<String>,
    pub lease: Duration,
}

/// A pre-provisioned static lease, keyed by MAC in [`MemoryBackend::static_records`].
#[derive(Debug, Clone)]
pub struct IpRecord {
    pub address: Ipv4Addr,
    pub dns: Option<Vec<Ipv4Addr>>,
    pub search: Option<Vec<String>>,
    pub lease: Option<Duration>,
    pub gateway: Option<Ipv4Addr>,
}

impl IpRecord {
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            dns: None,
            search: None,
            lease: None,
            gateway: None,
        }
    }
}

/// Backend implementations turn a DHCP request into a response message
/// (or `None`, meaning "I have no opinion, let the next backend try").
pub trait Backend: Send + Sync {
    fn source(&self) -> &'static str;

    /// Grants or renews an address for `mac`, honoring `requested` if set
    /// and available. Returns `None` when no address could be granted.
    fn request_address(&self, mac: &str, requested: Option<Ipv4Addr>) -> Option<Assignment>;

    /// Frees any address currently held by `mac`.
    fn release_address(&self, mac: &str);

    fn discover(&self, req: &Message) -> Option<Message> {
        self.assign(req)
    }

    fn request(&self, req: &Message) -> Option<Message> {
        self.assign(req)
    }

    fn decline(&self, req: &Message) -> Option<Message> {
        self.release_address(&mac_key(&req.client_hw));
        None
    }

    fn release(&self, req: &Message) -> Option<Message> {
        self.release_address(&mac_key(&req.client_hw));
        None
    }

    /// Shared DISCOVER/REQUEST handling: request an assignment and turn
    /// it into either an address-bearing reply or a `NoAddrsAvail` Nak.
    fn assign(&self, req: &Message) -> Option<Message> {
        let mac = mac_key(&req.client_hw);
        let requested = req.requested_address();
        match self.request_address(&mac, requested) {
            Some(assignment) => Some(build_assign_reply(req, &assignment)),
            None => Some(build_nak(req, StatusCode::NoAddrsAvail, "all addresses in use")),
        }
    }
}

/// Builds the option set an accepted DISCOVER/REQUEST replies with:
/// address, mask, routers, DNS, domain search, and the lease/renew/rebind
/// timer triad (renew at half the lease, rebind at 7/8, per RFC 2131 §4.4).
pub fn build_assign_reply(req: &Message, assignment: &Assignment) -> Message {
    let lease_secs = assignment.lease.as_secs() as u32;
    let mut options = OptionList::new();
    options.set(DhcpOption::SubnetMask(assignment.subnet_mask));
    if !assignment.routers.is_empty() {
        options.set(DhcpOption::Router(assignment.routers.clone()));
    }
    if !assignment.dns.is_empty() {
        options.set(DhcpOption::DomainNameServer(assignment.dns.clone()));
    }
    if !assignment.dns_search.is_empty() {
        options.set(DhcpOption::DNSDomainSearchList(assignment.dns_search.clone()));
    }
    options.set(DhcpOption::IPAddressLeaseTime(lease_secs));
    options.set(DhcpOption::RenewTime(lease_secs / 2));
    options.set(DhcpOption::RebindTime(lease_secs * 7 / 8));

    let mut reply = req.reply(options);
    reply.your_addr = assignment.address;
    reply
}

/// Builds a Nak reply carrying a `StatusCode` option describing the failure.
pub fn build_nak(req: &Message, status: StatusCode, message: &str) -> Message {
    let mut options = OptionList::new();
    options.set(DhcpOption::StatusCode {
        status,
        message: message.to_string(),
    });
    req.reply(options)
}

struct LeaseRecord {
    record: IpRecord,
    expires: Instant,
}

struct Inner {
    records: HashMap<String, LeaseRecord>,
    reclaimed: Vec<Ipv4Addr>,
    next_host: u32,
}

/// A simple in-memory DHCPv4 address pool: static reservations plus a
/// dynamic range, ephemeral and unpersisted by design — restarting the
/// server forgets every dynamic lease.
pub struct MemoryBackend {
    network: u32,
    broadcast: u32,
    prefix_len: u8,
    gateway: Ipv4Addr,
    dns: Vec<Ipv4Addr>,
    dns_search: Vec<String>,
    default_lease: Duration,
    static_records: HashMap<String, IpRecord>,
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new(network: Ipv4Addr, prefix_len: u8, gateway: Ipv4Addr, dns: Vec<Ipv4Addr>) -> Self {
        let net_u32 = u32::from(network);
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        };
        let network_addr = net_u32 & mask;
        let broadcast_addr = network_addr | !mask;
        MemoryBackend {
            network: network_addr,
            broadcast: broadcast_addr,
            prefix_len,
            gateway,
            dns,
            dns_search: Vec::new(),
            default_lease: DEFAULT_LEASE,
            static_records: HashMap::new(),
            inner: Mutex::new(Inner {
                records: HashMap::new(),
                reclaimed: Vec::new(),
                next_host: network_addr + 1,
            }),
        }
    }

    pub fn with_dns_search(mut self, search: Vec<String>) -> Self {
        self.dns_search = search;
        self
    }

    pub fn with_default_lease(mut self, lease: Duration) -> Self {
        self.default_lease = lease;
        self
    }

    pub fn subnet_mask(&self) -> Ipv4Addr {
        let mask = if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        };
        Ipv4Addr::from(mask)
    }

    /// Reserves `address` for `mac`, bypassing dynamic allocation entirely.
    pub fn set_static(&mut self, mac: &str, address: Ipv4Addr) {
        self.static_records
            .insert(mac.to_lowercase(), IpRecord::new(address));
    }

    fn reserved(&self) -> std::collections::HashSet<Ipv4Addr> {
        let mut reserved: std::collections::HashSet<Ipv4Addr> =
            self.static_records.values().map(|r| r.address).collect();
        reserved.insert(self.gateway);
        reserved.extend(self.dns.iter().copied());
        reserved
    }

    fn reclaim_all(&self, inner: &mut Inner) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .records
            .iter()
            .filter(|(_, r)| r.expires <= now)
            .map(|(mac, _)| mac.clone())
            .collect();
        for mac in expired {
            if let Some(record) = inner.records.remove(&mac) {
                inner.reclaimed.push(record.record.address);
            }
        }
        inner.reclaimed.sort_unstable_by_key(|ip| u32::from(*ip));
    }

    fn next_ip(&self, inner: &mut Inner, mac: &str, requested: Option<Ipv4Addr>) -> Option<IpRecord> {
        if let Some(existing) = inner.records.get_mut(mac) {
            if existing.expires >= Instant::now() {
                let lease = existing.record.lease.unwrap_or(self.default_lease);
                existing.expires = Instant::now() + lease;
                return Some(existing.record.clone());
            }
        }
        if let Some(ip) = requested {
            if let Some(pos) = inner.reclaimed.iter().position(|&r| r == ip) {
                inner.reclaimed.remove(pos);
                return Some(IpRecord::new(ip));
            }
        }
        if !inner.reclaimed.is_empty() {
            return Some(IpRecord::new(inner.reclaimed.remove(0)));
        }
        let reserved = self.reserved();
        while inner.next_host < self.broadcast {
            let candidate = Ipv4Addr::from(inner.next_host);
            inner.next_host += 1;
            if !reserved.contains(&candidate) {
                return Some(IpRecord::new(candidate));
            }
        }
        None
    }
}

impl Backend for MemoryBackend {
    fn source(&self) -> &'static str {
        "MEMORY"
    }

    fn request_address(&self, mac: &str, requested: Option<Ipv4Addr>) -> Option<Assignment> {
        let mut inner = self.inner.lock().unwrap();
        self.reclaim_all(&mut inner);

        let record = match self.static_records.get(mac) {
            Some(r) => r.clone(),
            None => self.next_ip(&mut inner, mac, requested)?,
        };

        let lease = record.lease.unwrap_or(self.default_lease);
        inner.records.insert(
            mac.to_string(),
            LeaseRecord {
                record: record.clone(),
                expires: Instant::now() + lease,
            },
        );

        Some(Assignment {
            address: record.address,
            subnet_mask: self.subnet_mask(),
            routers: vec![record.gateway.unwrap_or(self.gateway)],
            dns: record.dns.unwrap_or_else(|| self.dns.clone()),
            dns_search: record.search.unwrap_or_else(|| self.dns_search.clone()),
            lease,
        })
    }

    fn release_address(&self, mac: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.remove(mac) {
            inner.reclaimed.push(record.record.address);
        }
        self.reclaim_all(&mut inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(
            Ipv4Addr::new(192, 168, 1, 0),
            24,
            Ipv4Addr::new(192, 168, 1, 1),
            vec![Ipv4Addr::new(8, 8, 8, 8)],
        )
    }

    #[test]
    fn allocates_and_renews() {
        let b = backend();
        let a1 = b.request_address("aa:bb", None).unwrap();
        let a2 = b.request_address("aa:bb", None).unwrap();
        assert_eq!(a1.address, a2.address);
    }

    #[test]
    fn skips_reserved_gateway_and_dns() {
        let mut b = MemoryBackend::new(
            Ipv4Addr::new(10, 0, 0, 0),
            29,
            Ipv4Addr::new(10, 0, 0, 1),
            vec![Ipv4Addr::new(10, 0, 0, 2)],
        );
        b.set_static("static-client", Ipv4Addr::new(10, 0, 0, 3));
        let assigned = b.request_address("dynamic-client", None).unwrap();
        assert_eq!(assigned.address, Ipv4Addr::new(10, 0, 0, 4));
    }

    #[test]
    fn release_then_reuse() {
        let b = backend();
        let a1 = b.request_address("client-1", None).unwrap();
        b.release_address("client-1");
        let a2 = b.request_address("client-2", None).unwrap();
        assert_eq!(a1.address, a2.address);
    }

    #[test]
    fn exhaustion_returns_none() {
        let b = MemoryBackend::new(
            Ipv4Addr::new(10, 0, 0, 0),
            30,
            Ipv4Addr::new(10, 0, 0, 1),
            vec![],
        );
        // /30 network: .0 network, .1 gateway (reserved), .2 usable, .3 broadcast.
        assert!(b.request_address("only-client", None).is_some());
        assert!(b.request_address("second-client", None).is_none());
    }

    #[test]
    fn static_record_bypasses_pool() {
        let mut b = backend();
        b.set_static("static-mac", Ipv4Addr::new(192, 168, 1, 50));
        let assign = b.request_address("static-mac", None).unwrap();
        assert_eq!(assign.address, Ipv4Addr::new(192, 168, 1, 50));
    }

    #[test]
    fn small_subnet_allocates_releases_and_exhausts_in_order() {
        let b = MemoryBackend::new(
            Ipv4Addr::new(192, 168, 1, 0),
            29,
            Ipv4Addr::new(192, 168, 1, 1),
            vec![Ipv4Addr::new(1, 1, 1, 1)],
        )
        .with_default_lease(Duration::from_secs(1));

        let first = b.request_address("aa:bb:cc:dd:ee:ff", None).unwrap();
        assert_eq!(first.address, Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(first.routers, vec![Ipv4Addr::new(192, 168, 1, 1)]);
        assert_eq!(first.dns, vec![Ipv4Addr::new(1, 1, 1, 1)]);
        assert_eq!(first.lease, Duration::from_secs(1));

        // a repeat request for the same host renews the same address
        let repeat = b.request_address("aa:bb:cc:dd:ee:ff", None).unwrap();
        assert_eq!(repeat.address, Ipv4Addr::new(192, 168, 1, 2));

        // four more distinct hosts fill out the rest of the /29
        let macs = ["11:11", "22:22", "33:33", "44:44"];
        let expected = [
            Ipv4Addr::new(192, 168, 1, 3),
            Ipv4Addr::new(192, 168, 1, 4),
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(192, 168, 1, 6),
        ];
        for (mac, addr) in macs.iter().zip(expected.iter()) {
            let a = b.request_address(mac, None).unwrap();
            assert_eq!(a.address, *addr);
        }

        // the pool is now exhausted: a sixth distinct host gets nothing
        assert!(b.request_address("ff:ff", None).is_none());

        // releasing the first host and requesting again reuses .2, not a new address
        b.release_address("aa:bb:cc:dd:ee:ff");
        let reused = b.request_address("new-client", None).unwrap();
        assert_eq!(reused.address, Ipv4Addr::new(192, 168, 1, 2));
    }
}
