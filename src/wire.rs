//! Wire codec primitives: a cursor-tracked reader and a growable writer
//! used by every fixed-header and option codec in [`crate::v4`] and
//! [`crate::v6`].
//!
//! Each option is decoded under its own [`Cursor`] scoped to just that
//! option's payload, so a greedy read (a list, a trailing byte run)
//! naturally stops at the option boundary instead of running into the
//! next option in the datagram.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::DhcpError;

/// A read cursor over a borrowed byte slice. Tracks its own index so
/// nested/greedy reads never see bytes past what they were handed.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Borrow everything read so far, useful for domain-name pointer backreferences.
    pub fn consumed(&self) -> &'a [u8] {
        &self.buf[..self.pos]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DhcpError> {
        if self.remaining() < n {
            return Err(DhcpError::ShortBuffer {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DhcpError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DhcpError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32, DhcpError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DhcpError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, DhcpError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_ipv4(&mut self) -> Result<Ipv4Addr, DhcpError> {
        let b = self.take(4)?;
        Ok(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
    }

    pub fn read_ipv6(&mut self) -> Result<Ipv6Addr, DhcpError> {
        let b: [u8; 16] = self.take(16)?.try_into().unwrap();
        Ok(Ipv6Addr::from(b))
    }

    /// Reads a fixed-width field. Zero bytes are preserved; callers that
    /// want a trimmed string should use [`Cursor::read_fixed_str`].
    pub fn read_fixed(&mut self, n: usize) -> Result<&'a [u8], DhcpError> {
        self.take(n)
    }

    /// Reads a fixed-width field and decodes it as a NUL-trimmed UTF-8 string
    /// (lossily, since field contents are attacker controlled).
    pub fn read_fixed_str(&mut self, n: usize) -> Result<String, DhcpError> {
        let raw = self.take(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Reads an 8-bit-prefixed or 16-bit-prefixed byte string.
    pub fn read_length_prefixed(&mut self, prefix_bits: u8) -> Result<&'a [u8], DhcpError> {
        let len = match prefix_bits {
            8 => self.read_u8()? as usize,
            16 => self.read_u16()? as usize,
            other => panic!("unsupported length-prefix width: {other}"),
        };
        self.take(len)
    }

    /// Consumes the remainder of the cursor.
    pub fn read_greedy(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    /// Repeatedly applies `read_one` until the cursor is drained.
    pub fn read_greedy_list<T>(
        &mut self,
        mut read_one: impl FnMut(&mut Self) -> Result<T, DhcpError>,
    ) -> Result<Vec<T>, DhcpError> {
        let mut out = Vec::new();
        while !self.is_empty() {
            out.push(read_one(self)?);
        }
        Ok(out)
    }

    /// RFC 1035 style domain-name decode: a sequence of length-prefixed
    /// labels terminated by a zero byte, with RFC 1035 §4.1.4 pointer
    /// backreferences (`0xC0` high bits) resolved against everything
    /// consumed so far in the enclosing buffer.
    pub fn read_domain_name(&mut self) -> Result<String, DhcpError> {
        let mut labels = Vec::new();
        self.read_domain_labels(&mut labels, 0)?;
        Ok(labels.join("."))
    }

    fn read_domain_labels(&mut self, labels: &mut Vec<String>, depth: u8) -> Result<(), DhcpError> {
        if depth > 16 {
            return Err(DhcpError::MalformedQuery(
                "domain name pointer chain too deep".into(),
            ));
        }
        loop {
            let len = self.read_u8()?;
            if len == 0 {
                return Ok(());
            }
            if len & 0xC0 == 0xC0 {
                let lo = self.read_u8()?;
                let offset = (((len & 0x3F) as usize) << 8) | lo as usize;
                let whole = [self.consumed(), &self.buf[self.pos..]].concat();
                if offset >= whole.len() {
                    return Err(DhcpError::MalformedQuery(
                        "domain name pointer out of range".into(),
                    ));
                }
                let mut sub = Cursor::new(&self.buf[..self.buf.len()]);
                sub.pos = offset;
                // Pointers only ever point backwards into the same buffer.
                sub.read_domain_labels(labels, depth + 1)?;
                return Ok(());
            }
            let label = self.take(len as usize)?;
            labels.push(String::from_utf8_lossy(label).into_owned());
        }
    }
}

/// A growable byte buffer used to serialize messages and options.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u24(&mut self, v: u32) {
        let b = v.to_be_bytes();
        self.buf.extend_from_slice(&b[1..]);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    pub fn write_ipv4(&mut self, v: Ipv4Addr) {
        self.buf.extend_from_slice(&v.octets());
    }

    pub fn write_ipv6(&mut self, v: Ipv6Addr) {
        self.buf.extend_from_slice(&v.octets());
    }

    pub fn write_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes `data` into a field of exactly `n` bytes, right-padding
    /// with `0x00` (truncating is a caller bug, so we assert instead).
    pub fn write_fixed(&mut self, data: &[u8], n: usize) {
        assert!(data.len() <= n, "fixed field overflow: {} > {n}", data.len());
        self.buf.extend_from_slice(data);
        self.buf.resize(self.buf.len() + (n - data.len()), 0);
    }

    pub fn write_length_prefixed(&mut self, data: &[u8], prefix_bits: u8) -> Result<(), DhcpError> {
        match prefix_bits {
            8 => {
                if data.len() > u8::MAX as usize {
                    return Err(DhcpError::OptionTooLong { len: data.len() });
                }
                self.write_u8(data.len() as u8);
            }
            16 => self.write_u16(data.len() as u16),
            other => panic!("unsupported length-prefix width: {other}"),
        }
        self.write_slice(data);
        Ok(())
    }

    /// Writes a domain name as plain (uncompressed) labels terminated by
    /// a zero byte. We never emit pointer compression; we only need to
    /// read it back out of other implementations.
    pub fn write_domain_name(&mut self, name: &str) -> Result<(), DhcpError> {
        for label in name.split('.').filter(|l| !l.is_empty()) {
            if label.len() > 63 {
                return Err(DhcpError::MalformedQuery(format!(
                    "domain label {label:?} exceeds 63 bytes"
                )));
            }
            self.write_u8(label.len() as u8);
            self.write_slice(label.as_bytes());
        }
        self.write_u8(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        let mut w = Writer::new();
        w.write_u8(0xAB);
        w.write_u16(0x1234);
        w.write_u24(0x0A0B0C);
        w.write_u32(0xDEADBEEF);
        w.write_ipv4(Ipv4Addr::new(192, 168, 1, 1));
        let bytes = w.into_bytes();

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_u8().unwrap(), 0xAB);
        assert_eq!(c.read_u16().unwrap(), 0x1234);
        assert_eq!(c.read_u24().unwrap(), 0x0A0B0C);
        assert_eq!(c.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(c.read_ipv4().unwrap(), Ipv4Addr::new(192, 168, 1, 1));
        assert!(c.is_empty());
    }

    #[test]
    fn fixed_field_preserves_and_trims() {
        let mut w = Writer::new();
        w.write_fixed(b"hello", 10);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 10);

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_fixed_str(10).unwrap(), "hello");
    }

    #[test]
    fn short_buffer_errors() {
        let bytes = [0u8; 2];
        let mut c = Cursor::new(&bytes);
        assert!(c.read_u32().is_err());
    }

    #[test]
    fn domain_name_pointer_backreference() {
        // "openzone.centralsupelec.fr" followed by "r" pointing back at "openzone.centralsupelec.fr"
        let mut w = Writer::new();
        let base = w.len();
        w.write_domain_name("openzone.centralsupelec.fr").unwrap();
        let mut bytes = w.into_bytes();
        // append a pointer back to `base`
        bytes.push(0xC0);
        bytes.push(base as u8);

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_domain_name().unwrap(), "openzone.centralsupelec.fr");
        assert_eq!(c.read_domain_name().unwrap(), "openzone.centralsupelec.fr");
    }
}
