//! Packet builders shared by the unit tests.

use crate::packet::*;
use std::net::Ipv6Addr;

pub(crate) fn router() -> Ipv6Addr {
    "fe80::1".parse().unwrap()
}

pub(crate) struct RaBuilder {
    curhoplimit: u8,
    flags: u8,
    router_lifetime: u16,
    reachable: u32,
    retrans: u32,
    options: Vec<u8>,
}

impl RaBuilder {
    pub(crate) fn new(router_lifetime: u16) -> Self {
        Self {
            curhoplimit: 64,
            flags: 0,
            router_lifetime,
            reachable: 0,
            retrans: 0,
            options: Vec::new(),
        }
    }

    pub(crate) fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn timers(mut self, reachable: u32, retrans: u32) -> Self {
        self.reachable = reachable;
        self.retrans = retrans;
        self
    }

    pub(crate) fn prefix(mut self, prefix: &str, len: u8, flags: u8, valid: u32, preferred: u32) -> Self {
        let addr: Ipv6Addr = prefix.parse().unwrap();
        self.options.extend_from_slice(&[ND_OPT_PREFIX_INFORMATION, 4, len, flags]);
        self.options.extend_from_slice(&valid.to_be_bytes());
        self.options.extend_from_slice(&preferred.to_be_bytes());
        self.options.extend_from_slice(&[0; 4]);
        self.options.extend_from_slice(&addr.octets());
        self
    }

    pub(crate) fn rdnss(mut self, lifetime: u32, servers: &[&str]) -> Self {
        let len_units = 1 + 2 * servers.len() as u8;
        self.options.extend_from_slice(&[ND_OPT_RDNSS, len_units, 0, 0]);
        self.options.extend_from_slice(&lifetime.to_be_bytes());
        for server in servers {
            let addr: Ipv6Addr = server.parse().unwrap();
            self.options.extend_from_slice(&addr.octets());
        }
        self
    }

    /// `labels` is zero-padded to a multiple of 8 bytes.
    pub(crate) fn dnssl(mut self, lifetime: u32, labels: &[u8]) -> Self {
        let padded = labels.len().div_ceil(8) * 8;
        let len_units = 1 + (padded / 8) as u8;
        self.options.extend_from_slice(&[ND_OPT_DNSSL, len_units, 0, 0]);
        self.options.extend_from_slice(&lifetime.to_be_bytes());
        self.options.extend_from_slice(labels);
        self.options.resize(self.options.len() + padded - labels.len(), 0);
        self
    }

    pub(crate) fn mtu(mut self, mtu: u32) -> Self {
        self.options.extend_from_slice(&[ND_OPT_MTU, 1, 0, 0]);
        self.options.extend_from_slice(&mtu.to_be_bytes());
        self
    }

    pub(crate) fn raw_option(mut self, bytes: &[u8]) -> Self {
        self.options.extend_from_slice(bytes);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut pkt = vec![ND_ROUTER_ADVERT, 0, 0, 0, self.curhoplimit, self.flags];
        pkt.extend_from_slice(&self.router_lifetime.to_be_bytes());
        pkt.extend_from_slice(&self.reachable.to_be_bytes());
        pkt.extend_from_slice(&self.retrans.to_be_bytes());
        pkt.extend_from_slice(&self.options);
        pkt
    }
}
