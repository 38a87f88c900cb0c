//! Router Advertisement decoding.

use crate::error::DecodeError;
use crate::packet::*;
use crate::timer::TimerId;
use bytes::Buf;
use chrono::{DateTime, Utc};
use ipnet::Ipv6Net;
use slaacd_core::types::{
    DnsslReport, Lifetime, PrefixReport, RaReport, RdnsReport, RouterPreference,
};
use std::net::Ipv6Addr;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// A Prefix Information option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub on_link: bool,
    pub autonomous: bool,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
}

impl Prefix {
    fn parse(mut body: &[u8]) -> Self {
        let prefix_len = body.get_u8();
        let flags = body.get_u8();
        let valid_lifetime = body.get_u32();
        let preferred_lifetime = body.get_u32();
        body.advance(4);
        let mut octets = [0u8; 16];
        body.copy_to_slice(&mut octets);

        Self {
            prefix: Ipv6Addr::from(octets),
            prefix_len,
            on_link: flags & ND_OPT_PI_FLAG_ONLINK != 0,
            autonomous: flags & ND_OPT_PI_FLAG_AUTO != 0,
            valid_lifetime,
            preferred_lifetime,
        }
    }

    /// The advertised network, or `None` for a length above 128.
    pub fn network(&self) -> Option<Ipv6Net> {
        Ipv6Net::new(self.prefix, self.prefix_len)
            .ok()
            .map(|net| net.trunc())
    }
}

/// A fully validated Router Advertisement as learned from one router.
#[derive(Debug, Clone)]
pub struct RouterAdvertisement {
    pub from: Ipv6Addr,
    pub received: DateTime<Utc>,
    pub uptime: Instant,
    pub curhoplimit: u8,
    pub managed: bool,
    pub other: bool,
    pub preference: RouterPreference,
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_time: u32,
    pub prefixes: Vec<Prefix>,
    pub rdns_lifetime: u32,
    pub rdns_servers: Vec<Ipv6Addr>,
    pub dnssl_lifetime: u32,
    pub search_domains: Vec<String>,
    /// 0 when not advertised or below the IPv6 minimum.
    pub mtu: u32,
    pub min_lifetime: u32,
    pub(crate) expiry_timer: Option<TimerId>,
}

fn decode_preference(flags: u8) -> RouterPreference {
    match flags & ND_RA_FLAG_RTPREF_MASK {
        ND_RA_FLAG_RTPREF_HIGH => RouterPreference::High,
        ND_RA_FLAG_RTPREF_LOW => RouterPreference::Low,
        // medium and the reserved pattern
        _ => RouterPreference::Medium,
    }
}

impl RouterAdvertisement {
    /// Decode an ICMPv6 payload captured from `from`.
    ///
    /// `received` and `uptime` are the wall clock and monotonic clock at
    /// receipt. Nothing is returned unless the whole packet validates.
    pub fn parse(
        packet: &[u8],
        from: Ipv6Addr,
        received: DateTime<Utc>,
        uptime: Instant,
    ) -> Result<Self, DecodeError> {
        if !is_link_local(&from) {
            return Err(DecodeError::NotLinkLocal(from));
        }

        let mut reader = Reader::new(packet);
        let mut hdr = reader
            .take(RA_HEADER_LEN)
            .ok_or(DecodeError::TooShort(packet.len()))?;

        let icmp_type = hdr.get_u8();
        if icmp_type != ND_ROUTER_ADVERT {
            return Err(DecodeError::WrongIcmpType(icmp_type));
        }
        let icmp_code = hdr.get_u8();
        if icmp_code != 0 {
            return Err(DecodeError::WrongIcmpCode(icmp_code));
        }
        let _checksum = hdr.get_u16();
        let curhoplimit = hdr.get_u8();
        let flags = hdr.get_u8();
        let router_lifetime = hdr.get_u16();
        let reachable_time = hdr.get_u32();
        let retrans_time = hdr.get_u32();

        let mut ra = Self {
            from,
            received,
            uptime,
            curhoplimit,
            managed: flags & ND_RA_FLAG_MANAGED != 0,
            other: flags & ND_RA_FLAG_OTHER != 0,
            preference: decode_preference(flags),
            router_lifetime,
            reachable_time,
            retrans_time,
            prefixes: Vec::new(),
            rdns_lifetime: 0,
            rdns_servers: Vec::new(),
            dnssl_lifetime: 0,
            search_domains: Vec::new(),
            mtu: 0,
            min_lifetime: u32::MAX,
            expiry_timer: None,
        };

        let mut min_lifetime = u32::MAX;
        if router_lifetime != 0 {
            min_lifetime = u32::from(router_lifetime);
        }

        for opt in Options::new(reader) {
            let opt = opt?;
            match opt.kind {
                ND_OPT_PREFIX_INFORMATION => {
                    if opt.len_units != 4 {
                        return Err(DecodeError::MalformedPrefixOption(opt.len_units));
                    }
                    let prefix = Prefix::parse(opt.body);
                    min_lifetime = min_lifetime.min(prefix.preferred_lifetime);
                    ra.prefixes.push(prefix);
                }
                ND_OPT_RDNSS => {
                    if opt.len_units < 3 {
                        return Err(DecodeError::MalformedRdnssOption(format!(
                            "length {} < 3",
                            opt.len_units
                        )));
                    }
                    if (opt.len_units - 1) % 2 != 0 {
                        return Err(DecodeError::MalformedRdnssOption(format!(
                            "length {} does not hold whole addresses",
                            opt.len_units
                        )));
                    }
                    let mut body = opt.body;
                    body.advance(2);
                    ra.rdns_lifetime = body.get_u32();
                    ra.rdns_servers = body
                        .chunks_exact(16)
                        .map(|chunk| {
                            let mut octets = [0u8; 16];
                            octets.copy_from_slice(chunk);
                            Ipv6Addr::from(octets)
                        })
                        .collect();
                    min_lifetime = min_lifetime.min(ra.rdns_lifetime);
                }
                ND_OPT_DNSSL => {
                    if opt.len_units < 2 {
                        return Err(DecodeError::MalformedDnsslOption(format!(
                            "length {} < 2",
                            opt.len_units
                        )));
                    }
                    let mut body = opt.body;
                    body.advance(2);
                    ra.dnssl_lifetime = body.get_u32();
                    ra.search_domains = parse_dnssl(body)?;
                    min_lifetime = min_lifetime.min(ra.dnssl_lifetime);
                }
                ND_OPT_MTU => {
                    if opt.len_units == 1 {
                        let mut body = opt.body;
                        body.advance(2);
                        let mtu = body.get_u32();
                        if mtu < IPV6_MMTU {
                            warn!(%from, mtu, "ignoring advertised MTU below minimum");
                            ra.mtu = 0;
                        } else {
                            ra.mtu = mtu;
                        }
                    } else {
                        debug!(%from, len = opt.len_units, "ignoring MTU option with bad length");
                    }
                }
                ND_OPT_SOURCE_LINKADDR
                | ND_OPT_TARGET_LINKADDR
                | ND_OPT_REDIRECTED_HEADER
                | ND_OPT_ROUTE_INFO => {
                    trace!(%from, kind = opt.kind, "option not handled");
                }
                other => {
                    debug!(%from, kind = other, "unknown option");
                }
            }
        }

        ra.min_lifetime = min_lifetime;
        Ok(ra)
    }

    pub fn age_secs(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.uptime).as_secs()
    }

    /// `lifetime` minus the time since receipt, floored at zero.
    pub fn remaining(&self, lifetime: u32, now: Instant) -> u32 {
        let age = u32::try_from(self.age_secs(now)).unwrap_or(u32::MAX);
        lifetime.saturating_sub(age)
    }

    pub fn expiry_timer(&self) -> Option<TimerId> {
        self.expiry_timer
    }

    pub fn log_details(&self) {
        trace!(from = %self.from, received = %self.received, "router advertisement");
        trace!(
            curhoplimit = self.curhoplimit,
            managed = self.managed,
            other = self.other,
            preference = %self.preference,
            router_lifetime = self.router_lifetime,
            reachable_time = self.reachable_time,
            retrans_time = self.retrans_time,
            mtu = self.mtu,
            min_lifetime = self.min_lifetime,
            "  header"
        );
        for p in &self.prefixes {
            trace!(
                prefix = %p.prefix,
                prefix_len = p.prefix_len,
                on_link = p.on_link,
                autonomous = p.autonomous,
                valid = p.valid_lifetime,
                preferred = p.preferred_lifetime,
                "  prefix"
            );
        }
        for server in &self.rdns_servers {
            trace!(%server, lifetime = self.rdns_lifetime, "  rdns");
        }
        if !self.search_domains.is_empty() {
            trace!(
                search = %self.search_domains.join(" "),
                lifetime = self.dnssl_lifetime,
                "  dnssl"
            );
        }
    }

    pub fn report(&self, now: Instant) -> RaReport {
        let lifetime = |advertised: u32| Lifetime {
            advertised,
            remaining: self.remaining(advertised, now),
        };

        RaReport {
            from: self.from,
            received: self.received,
            age_secs: self.age_secs(now),
            curhoplimit: self.curhoplimit,
            managed: self.managed,
            other: self.other,
            preference: self.preference,
            router_lifetime: lifetime(u32::from(self.router_lifetime)),
            reachable_time_ms: self.reachable_time,
            retrans_time_ms: self.retrans_time,
            mtu: self.mtu,
            min_lifetime: self.min_lifetime,
            prefixes: self
                .prefixes
                .iter()
                .map(|p| PrefixReport {
                    prefix: p.prefix,
                    prefix_len: p.prefix_len,
                    network: p.network(),
                    on_link: p.on_link,
                    autonomous: p.autonomous,
                    valid_lifetime: lifetime(p.valid_lifetime),
                    preferred_lifetime: lifetime(p.preferred_lifetime),
                })
                .collect(),
            rdns: self
                .rdns_servers
                .iter()
                .map(|addr| RdnsReport {
                    addr: *addr,
                    lifetime: lifetime(self.rdns_lifetime),
                })
                .collect(),
            dnssl: self
                .search_domains
                .iter()
                .map(|domain| DnsslReport {
                    domain: domain.clone(),
                    lifetime: lifetime(self.dnssl_lifetime),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{router, RaBuilder};
    use std::time::Duration;

    fn parse(pkt: &[u8]) -> Result<RouterAdvertisement, DecodeError> {
        RouterAdvertisement::parse(pkt, router(), Utc::now(), Instant::now())
    }

    #[test]
    fn test_parse_header() {
        let pkt = RaBuilder::new(1800)
            .flags(ND_RA_FLAG_MANAGED | ND_RA_FLAG_RTPREF_HIGH)
            .timers(30_000, 1_000)
            .build();
        let ra = parse(&pkt).unwrap();

        assert_eq!(ra.from, router());
        assert_eq!(ra.curhoplimit, 64);
        assert!(ra.managed);
        assert!(!ra.other);
        assert_eq!(ra.preference, RouterPreference::High);
        assert_eq!(ra.router_lifetime, 1800);
        assert_eq!(ra.reachable_time, 30_000);
        assert_eq!(ra.retrans_time, 1_000);
        assert_eq!(ra.min_lifetime, 1800);
        assert!(ra.prefixes.is_empty());
        assert!(ra.expiry_timer().is_none());
    }

    #[test]
    fn test_preference_bits() {
        let pref = |flags| parse(&RaBuilder::new(0).flags(flags).build()).unwrap().preference;
        assert_eq!(pref(ND_RA_FLAG_RTPREF_LOW), RouterPreference::Low);
        assert_eq!(pref(ND_RA_FLAG_RTPREF_MEDIUM), RouterPreference::Medium);
        assert_eq!(pref(ND_RA_FLAG_RTPREF_RSV), RouterPreference::Medium);
        assert_eq!(pref(ND_RA_FLAG_OTHER | ND_RA_FLAG_RTPREF_HIGH), RouterPreference::High);
    }

    #[test]
    fn test_rejects_non_link_local() {
        let pkt = RaBuilder::new(1800).build();
        let from: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(
            RouterAdvertisement::parse(&pkt, from, Utc::now(), Instant::now()).unwrap_err(),
            DecodeError::NotLinkLocal(from)
        );
    }

    #[test]
    fn test_rejects_bad_header() {
        let pkt = RaBuilder::new(1800).build();
        assert_eq!(parse(&pkt[..15]).unwrap_err(), DecodeError::TooShort(15));

        let mut wrong_type = pkt.clone();
        wrong_type[0] = 133;
        assert_eq!(parse(&wrong_type).unwrap_err(), DecodeError::WrongIcmpType(133));

        let mut wrong_code = pkt;
        wrong_code[1] = 1;
        assert_eq!(parse(&wrong_code).unwrap_err(), DecodeError::WrongIcmpCode(1));
    }

    #[test]
    fn test_min_lifetime_from_options() {
        let pkt = RaBuilder::new(9000)
            .prefix("2001:db8:1::", 64, ND_OPT_PI_FLAG_ONLINK | ND_OPT_PI_FLAG_AUTO, 86400, 14400)
            .rdnss(600, &["2001:db8::53"])
            .dnssl(1200, b"\x03lan\x00")
            .build();
        let ra = parse(&pkt).unwrap();
        assert_eq!(ra.min_lifetime, 600);

        let pkt = RaBuilder::new(300)
            .prefix("2001:db8:1::", 64, 0, 86400, 14400)
            .rdnss(600, &["2001:db8::53"])
            .build();
        assert_eq!(parse(&pkt).unwrap().min_lifetime, 300);
    }

    #[test]
    fn test_min_lifetime_ignores_zero_router_lifetime() {
        let pkt = RaBuilder::new(0)
            .prefix("2001:db8:1::", 64, ND_OPT_PI_FLAG_AUTO, 86400, 14400)
            .rdnss(7200, &["2001:db8::53"])
            .dnssl(3600, b"\x03lan\x00")
            .build();
        assert_eq!(parse(&pkt).unwrap().min_lifetime, 3600);
    }

    #[test]
    fn test_min_lifetime_unbounded() {
        let ra = parse(&RaBuilder::new(0).build()).unwrap();
        assert_eq!(ra.min_lifetime, u32::MAX);
    }

    #[test]
    fn test_prefix_option() {
        let pkt = RaBuilder::new(1800)
            .prefix("2001:db8:1::", 64, ND_OPT_PI_FLAG_ONLINK | ND_OPT_PI_FLAG_AUTO, 86400, 14400)
            .prefix("2001:db8:1::", 64, ND_OPT_PI_FLAG_ONLINK, 7200, 3600)
            .build();
        let ra = parse(&pkt).unwrap();

        // duplicates are kept in option order
        assert_eq!(ra.prefixes.len(), 2);
        let p = &ra.prefixes[0];
        assert_eq!(p.prefix, "2001:db8:1::".parse::<Ipv6Addr>().unwrap());
        assert_eq!(p.prefix_len, 64);
        assert!(p.on_link);
        assert!(p.autonomous);
        assert_eq!(p.valid_lifetime, 86400);
        assert_eq!(p.preferred_lifetime, 14400);
        assert_eq!(p.network(), Some("2001:db8:1::/64".parse().unwrap()));
        assert!(!ra.prefixes[1].autonomous);
        assert_eq!(ra.min_lifetime, 1800);
    }

    #[test]
    fn test_prefix_option_wrong_length() {
        let mut opt = vec![ND_OPT_PREFIX_INFORMATION, 3];
        opt.extend_from_slice(&[0; 22]);
        let pkt = RaBuilder::new(1800).raw_option(&opt).build();
        assert_eq!(parse(&pkt).unwrap_err(), DecodeError::MalformedPrefixOption(3));
    }

    #[test]
    fn test_rdnss_last_wins() {
        let pkt = RaBuilder::new(1800)
            .rdnss(900, &["2001:db8::53", "2001:db8::54"])
            .rdnss(1000, &["2001:db8::55"])
            .build();
        let ra = parse(&pkt).unwrap();
        assert_eq!(ra.rdns_servers, vec!["2001:db8::55".parse::<Ipv6Addr>().unwrap()]);
        assert_eq!(ra.rdns_lifetime, 1000);
        // the earlier option still bounded the refresh
        assert_eq!(ra.min_lifetime, 900);
    }

    #[test]
    fn test_rdnss_bad_lengths() {
        let pkt = RaBuilder::new(1800)
            .raw_option(&[ND_OPT_RDNSS, 2, 0, 0, 0, 0, 0, 60, 0, 0, 0, 0, 0, 0, 0, 0])
            .build();
        assert!(matches!(
            parse(&pkt).unwrap_err(),
            DecodeError::MalformedRdnssOption(_)
        ));

        let mut opt = vec![ND_OPT_RDNSS, 4];
        opt.extend_from_slice(&[0; 30]);
        let pkt = RaBuilder::new(1800).raw_option(&opt).build();
        assert!(matches!(
            parse(&pkt).unwrap_err(),
            DecodeError::MalformedRdnssOption(_)
        ));
    }

    #[test]
    fn test_dnssl_option() {
        let pkt = RaBuilder::new(1800)
            .dnssl(600, b"\x07example\x03com\x00\x03lan\x00")
            .build();
        let ra = parse(&pkt).unwrap();
        assert_eq!(ra.search_domains, vec!["example.com", "lan"]);
        assert_eq!(ra.dnssl_lifetime, 600);
    }

    #[test]
    fn test_dnssl_exact_eight_bytes() {
        let pkt = RaBuilder::new(1800).dnssl(600, b"\x03www\x03abc").build();
        let ra = parse(&pkt).unwrap();
        assert_eq!(ra.search_domains, vec!["www.abc"]);
    }

    #[test]
    fn test_dnssl_label_too_long_rejects_ra() {
        let mut labels = vec![64u8];
        labels.extend_from_slice(&[b'x'; 64]);
        labels.push(0);
        let pkt = RaBuilder::new(1800).dnssl(600, &labels).build();
        assert!(matches!(
            parse(&pkt).unwrap_err(),
            DecodeError::MalformedDnsslOption(_)
        ));
    }

    #[test]
    fn test_dnssl_too_short() {
        let pkt = RaBuilder::new(1800)
            .raw_option(&[ND_OPT_DNSSL, 1, 0, 0, 0, 0, 0, 60])
            .build();
        assert!(matches!(
            parse(&pkt).unwrap_err(),
            DecodeError::MalformedDnsslOption(_)
        ));
    }

    #[test]
    fn test_option_overrun() {
        let pkt = RaBuilder::new(1800)
            .prefix("2001:db8:1::", 64, 0, 86400, 14400)
            .raw_option(&[ND_OPT_RDNSS, 5, 0, 0, 0, 0, 0, 60])
            .build();
        assert_eq!(
            parse(&pkt).unwrap_err(),
            DecodeError::OptionOverrun {
                declared: 38,
                remaining: 6
            }
        );
    }

    #[test]
    fn test_ignored_options() {
        let pkt = RaBuilder::new(1800)
            .raw_option(&[ND_OPT_SOURCE_LINKADDR, 1, 0x02, 0, 0, 0, 0, 0x01])
            .raw_option(&[ND_OPT_ROUTE_INFO, 1, 0, 0, 0, 0, 0x0e, 0x10])
            .raw_option(&[250, 1, 0xde, 0xad, 0xbe, 0xef, 0, 0])
            .prefix("2001:db8:1::", 64, ND_OPT_PI_FLAG_AUTO, 86400, 14400)
            .build();
        let ra = parse(&pkt).unwrap();
        assert_eq!(ra.prefixes.len(), 1);
    }

    #[test]
    fn test_mtu_option() {
        let ra = parse(&RaBuilder::new(1800).mtu(1500).build()).unwrap();
        assert_eq!(ra.mtu, 1500);

        let ra = parse(&RaBuilder::new(1800).mtu(1000).build()).unwrap();
        assert_eq!(ra.mtu, 0);

        // Wrong shape is ignored, never a rejection
        let mut opt = vec![ND_OPT_MTU, 2];
        opt.extend_from_slice(&[0; 14]);
        let ra = parse(&RaBuilder::new(1800).raw_option(&opt).build()).unwrap();
        assert_eq!(ra.mtu, 0);
    }

    #[test]
    fn test_report_remaining_lifetimes() {
        let t0 = Instant::now();
        let pkt = RaBuilder::new(1800)
            .prefix("2001:db8:1::", 64, ND_OPT_PI_FLAG_AUTO, 86400, 100)
            .rdnss(600, &["2001:db8::53"])
            .build();
        let ra = RouterAdvertisement::parse(&pkt, router(), Utc::now(), t0).unwrap();

        let report = ra.report(t0 + Duration::from_secs(200));
        assert_eq!(report.age_secs, 200);
        assert_eq!(report.router_lifetime, Lifetime { advertised: 1800, remaining: 1600 });
        assert_eq!(report.prefixes[0].preferred_lifetime.remaining, 0);
        assert_eq!(report.prefixes[0].valid_lifetime.remaining, 86200);
        assert_eq!(report.rdns[0].lifetime.remaining, 400);
        assert_eq!(report.min_lifetime, 100);
    }
}
