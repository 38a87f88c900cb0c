use chrono::{DateTime, Utc};
use ipnet::Ipv6Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

/// Router solicitation state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfState {
    /// Link is not running; no timer armed.
    Down,
    /// Waiting out the random initial delay before the first solicitation.
    Delay,
    /// Solicitations are being sent.
    Probing,
    /// Probing episode finished or answered.
    Idle,
}

impl std::fmt::Display for IfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IfState::Down => write!(f, "down"),
            IfState::Delay => write!(f, "delay"),
            IfState::Probing => write!(f, "probing"),
            IfState::Idle => write!(f, "idle"),
        }
    }
}

impl std::str::FromStr for IfState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "down" => Ok(IfState::Down),
            "delay" => Ok(IfState::Delay),
            "probing" | "probe" => Ok(IfState::Probing),
            "idle" => Ok(IfState::Idle),
            _ => Err(crate::error::Error::InvalidState(s.to_string())),
        }
    }
}

/// Default router preference (RFC 4191).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterPreference {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for RouterPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterPreference::Low => write!(f, "Low"),
            RouterPreference::Medium => write!(f, "Medium"),
            RouterPreference::High => write!(f, "High"),
        }
    }
}

/// Ethernet hardware address. Carried through for reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HwAddr(pub [u8; 6]);

impl std::fmt::Display for HwAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl std::str::FromStr for HwAddr {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| crate::error::Error::InvalidHwAddr(s.to_string()))?;
            if part.len() != 2 {
                return Err(crate::error::Error::InvalidHwAddr(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| crate::error::Error::InvalidHwAddr(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(crate::error::Error::InvalidHwAddr(s.to_string()));
        }

        Ok(HwAddr(octets))
    }
}

impl TryFrom<String> for HwAddr {
    type Error = crate::error::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HwAddr> for String {
    fn from(addr: HwAddr) -> Self {
        addr.to_string()
    }
}

/// An advertised lifetime together with what is left of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifetime {
    /// Seconds, as carried in the advertisement.
    pub advertised: u32,
    /// Seconds left, measured on the monotonic clock from receipt.
    pub remaining: u32,
}

/// Snapshot of one interface and everything learned on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceReport {
    pub if_index: u32,
    pub state: IfState,
    pub probes: u32,
    pub running: bool,
    pub autoconf_privacy: bool,
    pub hw_address: HwAddr,
    #[serde(default)]
    pub link_local: Option<Ipv6Addr>,
    #[serde(default)]
    pub advertisements: Vec<RaReport>,
}

/// Snapshot of one router advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaReport {
    pub from: Ipv6Addr,
    pub received: DateTime<Utc>,
    /// Seconds since receipt on the monotonic clock.
    pub age_secs: u64,
    pub curhoplimit: u8,
    pub managed: bool,
    pub other: bool,
    pub preference: RouterPreference,
    pub router_lifetime: Lifetime,
    pub reachable_time_ms: u32,
    pub retrans_time_ms: u32,
    /// Advertised link MTU, 0 when absent or invalid.
    pub mtu: u32,
    pub min_lifetime: u32,
    #[serde(default)]
    pub prefixes: Vec<PrefixReport>,
    #[serde(default)]
    pub rdns: Vec<RdnsReport>,
    #[serde(default)]
    pub dnssl: Vec<DnsslReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixReport {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    /// `None` when the advertised length is not a valid IPv6 prefix length.
    pub network: Option<Ipv6Net>,
    pub on_link: bool,
    pub autonomous: bool,
    pub valid_lifetime: Lifetime,
    pub preferred_lifetime: Lifetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RdnsReport {
    pub addr: Ipv6Addr,
    pub lifetime: Lifetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsslReport {
    pub domain: String,
    pub lifetime: Lifetime,
}
