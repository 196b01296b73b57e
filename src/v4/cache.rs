//! A cache overlay in front of a [`Backend`], keyed by hardware address.
//!
//! Wraps any backend, remembering its last assignment so repeat requests
//! from the same client skip straight back to the earlier answer instead
//! of re-running allocation. Primarily useful in front of a backend whose
//! `request_address` does meaningful work (a database lookup, an upstream
//! RPC) that a [`MemoryBackend`](super::lease::MemoryBackend) itself
//! doesn't need.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::lease::{Assignment, Backend};
use super::message::Message;

struct CacheRecord {
    assignment: Assignment,
    expires: Option<Instant>,
}

/// Caches [`Assignment`]s from a wrapped [`Backend`] by MAC address.
pub struct Cache {
    backend: Box<dyn Backend>,
    expiration: Option<Duration>,
    maxsize: Option<usize>,
    ignore: Vec<&'static str>,
    entries: Mutex<HashMap<String, CacheRecord>>,
}

impl Cache {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Cache {
            backend,
            expiration: None,
            maxsize: None,
            ignore: Vec::new(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        self.expiration = Some(ttl);
        self
    }

    pub fn with_maxsize(mut self, maxsize: usize) -> Self {
        self.maxsize = Some(maxsize);
        self
    }

    /// Marks a backend source (e.g. `"PXE"`) whose answers should never
    /// be cached, because they're cheap to recompute or context-dependent.
    pub fn ignoring(mut self, source: &'static str) -> Self {
        self.ignore.push(source);
        self
    }

    fn get_cached(&self, key: &str) -> Option<Assignment> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(record) => {
                if let Some(expires) = record.expires {
                    if expires <= Instant::now() {
                        entries.remove(key);
                        return None;
                    }
                }
                Some(entries[key].assignment.clone())
            }
            None => None,
        }
    }

    fn set_cached(&self, key: &str, assignment: Assignment) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(maxsize) = self.maxsize {
            while entries.len() >= maxsize {
                let evict = match entries.keys().next() {
                    Some(k) => k.clone(),
                    None => break,
                };
                entries.remove(&evict);
            }
        }
        let expires = self.expiration.map(|ttl| Instant::now() + ttl);
        entries.insert(key.to_string(), CacheRecord { assignment, expires });
    }
}

impl Backend for Cache {
    fn source(&self) -> &'static str {
        "Cache"
    }

    fn request_address(&self, mac: &str, requested: Option<Ipv4Addr>) -> Option<Assignment> {
        if let Some(assignment) = self.get_cached(mac) {
            return Some(assignment);
        }
        let assignment = self.backend.request_address(mac, requested)?;
        if !self.ignore.contains(&self.backend.source()) {
            self.set_cached(mac, assignment.clone());
        }
        Some(assignment)
    }

    fn release_address(&self, mac: &str) {
        self.entries.lock().unwrap().remove(mac);
        self.backend.release_address(mac);
    }

    fn discover(&self, req: &Message) -> Option<Message> {
        self.assign(req)
    }

    fn request(&self, req: &Message) -> Option<Message> {
        self.assign(req)
    }

    fn decline(&self, req: &Message) -> Option<Message> {
        self.backend.decline(req)
    }

    fn release(&self, req: &Message) -> Option<Message> {
        self.backend.release(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4::lease::MemoryBackend;

    #[test]
    fn caches_repeat_lookups() {
        let memory = MemoryBackend::new(
            Ipv4Addr::new(192, 168, 1, 0),
            24,
            Ipv4Addr::new(192, 168, 1, 1),
            vec![Ipv4Addr::new(8, 8, 8, 8)],
        );
        let cache = Cache::new(Box::new(memory));
        let a1 = cache.request_address("aa:bb", None).unwrap();
        let a2 = cache.request_address("aa:bb", None).unwrap();
        assert_eq!(a1.address, a2.address);
    }

    #[test]
    fn expired_entry_falls_through_to_backend() {
        let memory = MemoryBackend::new(
            Ipv4Addr::new(192, 168, 1, 0),
            24,
            Ipv4Addr::new(192, 168, 1, 1),
            vec![],
        );
        let cache = Cache::new(Box::new(memory)).with_expiration(Duration::from_millis(1));
        let a1 = cache.request_address("aa:bb", None).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let a2 = cache.request_address("aa:bb", None).unwrap();
        // same MAC renews to the same memory-backend lease regardless of cache expiry
        assert_eq!(a1.address, a2.address);
    }
}
