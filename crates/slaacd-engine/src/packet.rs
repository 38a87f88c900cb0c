//! Neighbor Discovery wire format (RFC 4861, RFC 8106).
//!
//! Everything here works on borrowed slices of a captured packet and never
//! reads past the end of the buffer it was given.

use crate::error::DecodeError;

pub const ND_ROUTER_ADVERT: u8 = 134;

/// type, code, checksum, hop limit, flags, router lifetime, reachable, retrans
pub const RA_HEADER_LEN: usize = 16;
pub const ND_OPT_HDR_LEN: usize = 2;

pub const ND_OPT_SOURCE_LINKADDR: u8 = 1;
pub const ND_OPT_TARGET_LINKADDR: u8 = 2;
pub const ND_OPT_PREFIX_INFORMATION: u8 = 3;
pub const ND_OPT_REDIRECTED_HEADER: u8 = 4;
pub const ND_OPT_MTU: u8 = 5;
pub const ND_OPT_ROUTE_INFO: u8 = 24;
pub const ND_OPT_RDNSS: u8 = 25;
pub const ND_OPT_DNSSL: u8 = 31;

pub const ND_RA_FLAG_MANAGED: u8 = 0x80;
pub const ND_RA_FLAG_OTHER: u8 = 0x40;
pub const ND_RA_FLAG_RTPREF_MASK: u8 = 0x18;
pub const ND_RA_FLAG_RTPREF_HIGH: u8 = 0x08;
pub const ND_RA_FLAG_RTPREF_MEDIUM: u8 = 0x00;
pub const ND_RA_FLAG_RTPREF_LOW: u8 = 0x18;
pub const ND_RA_FLAG_RTPREF_RSV: u8 = 0x10;

pub const ND_OPT_PI_FLAG_ONLINK: u8 = 0x80;
pub const ND_OPT_PI_FLAG_AUTO: u8 = 0x40;

/// Minimum link MTU for IPv6.
pub const IPV6_MMTU: u32 = 1280;

/// Longest accepted search list, space-joined.
pub const MAX_DNSSL_LEN: usize = 1024;
const MAX_LABEL_LEN: usize = 63;

/// Bounds-checked cursor over a byte buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Split off the next `n` bytes. The cursor does not move on failure.
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.buf.len() {
            return None;
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Some(head)
    }
}

/// A single ND option. `body` excludes the two header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdOption<'a> {
    pub kind: u8,
    /// Declared length in units of 8 octets, header included.
    pub len_units: u8,
    pub body: &'a [u8],
}

/// Walks the options following the RA header.
///
/// Yields at most one error, after which iteration ends. A trailing fragment
/// shorter than an option header is ignored.
pub struct Options<'a> {
    reader: Reader<'a>,
    done: bool,
}

impl<'a> Options<'a> {
    pub fn new(reader: Reader<'a>) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<'a> Iterator for Options<'a> {
    type Item = Result<NdOption<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header = match self.reader.take(ND_OPT_HDR_LEN) {
            Some(h) => h,
            None => {
                self.done = true;
                return None;
            }
        };
        let (kind, len_units) = (header[0], header[1]);

        if len_units == 0 {
            self.done = true;
            return Some(Err(DecodeError::ZeroLengthOption(kind)));
        }

        let declared = usize::from(len_units) * 8 - ND_OPT_HDR_LEN;
        let remaining = self.reader.remaining();
        match self.reader.take(declared) {
            Some(body) => Some(Ok(NdOption {
                kind,
                len_units,
                body,
            })),
            None => {
                self.done = true;
                Some(Err(DecodeError::OptionOverrun {
                    declared,
                    remaining,
                }))
            }
        }
    }
}

/// Decode the DNS-encoded domain names of a DNSSL option.
///
/// A zero-length label ends a domain; a zero byte following a terminator is
/// padding and ends the list. Reaching the end of `data` right after a complete
/// label also ends the current domain.
pub fn parse_dnssl(data: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut domains = Vec::new();
    let mut current = String::new();
    let mut pos = 0;

    while pos < data.len() {
        let len = usize::from(data[pos]);
        if len > MAX_LABEL_LEN || pos + 1 + len > data.len() {
            return Err(DecodeError::MalformedDnsslOption(format!(
                "invalid label of length {len} at offset {pos}"
            )));
        }

        if len == 0 {
            if !current.is_empty() {
                domains.push(std::mem::take(&mut current));
            }
            if pos + 1 >= data.len() || data[pos + 1] == 0 {
                break;
            }
        } else {
            if !current.is_empty() {
                current.push('.');
            }
            current.push_str(&String::from_utf8_lossy(&data[pos + 1..pos + 1 + len]));
        }
        pos += len + 1;
    }

    if !current.is_empty() {
        domains.push(current);
    }

    let joined_len = domains.iter().map(String::len).sum::<usize>()
        + domains.len().saturating_sub(1);
    if joined_len > MAX_DNSSL_LEN {
        return Err(DecodeError::MalformedDnsslOption(format!(
            "search list too long ({joined_len} bytes)"
        )));
    }

    Ok(domains)
}

pub fn is_link_local(addr: &std::net::Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}
