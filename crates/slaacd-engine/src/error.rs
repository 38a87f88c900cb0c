use std::net::Ipv6Addr;
use thiserror::Error;

/// Reasons a captured Router Advertisement is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("RA from non link local address {0}")]
    NotLinkLocal(Ipv6Addr),

    #[error("received too short message ({0} bytes)")]
    TooShort(usize),

    #[error("invalid ICMPv6 type ({0})")]
    WrongIcmpType(u8),

    #[error("invalid ICMPv6 code ({0})")]
    WrongIcmpCode(u8),

    #[error("invalid option len: {declared} > {remaining}")]
    OptionOverrun { declared: usize, remaining: usize },

    #[error("option {0} declares zero length")]
    ZeroLengthOption(u8),

    #[error("invalid prefix information option: len {0} != 4")]
    MalformedPrefixOption(u8),

    #[error("invalid RDNSS option: {0}")]
    MalformedRdnssOption(String),

    #[error("invalid DNSSL option: {0}")]
    MalformedDnsslOption(String),
}

/// Control requests that cannot be served.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown interface: {0}")]
    UnknownInterface(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
