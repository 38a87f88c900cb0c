use serde::{Deserialize, Serialize};
use slaacd_core::types::{HwAddr, InterfaceReport};
use std::net::Ipv6Addr;

/// Messages delivered to the engine by the frontend, the main process, and
/// control clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    /// Interface appeared or one of its attributes changed
    UpdateInterface {
        if_index: u32,
        running: bool,
        autoconf_privacy: bool,
        hw_address: HwAddr,
        #[serde(default)]
        link_local: Option<Ipv6Addr>,
    },

    /// Interface is gone
    RemoveInterface { if_index: u32 },

    /// Carrier change on a known interface
    LinkState { if_index: u32, up: bool },

    /// Raw ICMPv6 payload captured by the frontend
    RouterAdvertisement {
        if_index: u32,
        from: Ipv6Addr,
        packet: Vec<u8>,
    },

    /// Control request: solicit now
    SendSolicitation { if_index: u32 },

    /// Control request: dump state. `None` = all interfaces
    ShowInterfaceInfo {
        #[serde(default)]
        if_index: Option<u32>,
    },
}

/// Messages the engine emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outbound {
    /// Ask the frontend to transmit a Router Solicitation
    SendSolicitation { if_index: u32 },

    /// One interface worth of state, in reply to ShowInterfaceInfo
    InterfaceInfo { report: InterfaceReport },

    /// Terminates a ShowInterfaceInfo reply
    InterfaceInfoEnd,

    /// A control request could not be served
    ControlError { if_index: u32, error: String },
}

impl Inbound {
    pub fn if_index(&self) -> Option<u32> {
        match self {
            Inbound::UpdateInterface { if_index, .. }
            | Inbound::RemoveInterface { if_index }
            | Inbound::LinkState { if_index, .. }
            | Inbound::RouterAdvertisement { if_index, .. }
            | Inbound::SendSolicitation { if_index } => Some(*if_index),
            Inbound::ShowInterfaceInfo { if_index } => *if_index,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::UpdateInterface { .. } => "update_interface",
            Inbound::RemoveInterface { .. } => "remove_interface",
            Inbound::LinkState { .. } => "link_state",
            Inbound::RouterAdvertisement { .. } => "router_advertisement",
            Inbound::SendSolicitation { .. } => "send_solicitation",
            Inbound::ShowInterfaceInfo { .. } => "show_interface_info",
        }
    }
}

impl Outbound {
    pub fn topic_suffix(&self) -> &str {
        match self {
            Outbound::SendSolicitation { .. } => "solicit",
            Outbound::InterfaceInfo { .. } | Outbound::InterfaceInfoEnd => "info",
            Outbound::ControlError { .. } => "error",
        }
    }
}
