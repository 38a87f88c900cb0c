use crate::error::{self, EngineError, StateError};
use crate::iface::{IfUpdate, Interface};
use crate::ra::RouterAdvertisement;
use crate::timer::{TimerQueue, TimerTarget};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use slaacd_core::types::InterfaceReport;
use slaacd_msg::events::{Inbound, Outbound};
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Owns every interface and timer and turns inbound events into outbound ones.
///
/// The engine never reads a clock for scheduling; callers pass the current
/// monotonic time, and drive [`Engine::on_timers_expired`] at
/// [`Engine::next_deadline`].
pub struct Engine {
    interfaces: HashMap<u32, Interface>,
    timers: TimerQueue,
    rng: StdRng,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            interfaces: HashMap::new(),
            timers: TimerQueue::new(),
            rng,
        }
    }

    /// Dispatch one inbound event.
    pub fn handle(&mut self, event: Inbound, now: Instant) -> Vec<Outbound> {
        match event {
            Inbound::UpdateInterface {
                if_index,
                running,
                autoconf_privacy,
                hw_address,
                link_local,
            } => {
                self.on_interface_update(
                    IfUpdate {
                        if_index,
                        running,
                        autoconf_privacy,
                        hw_address,
                        link_local,
                    },
                    now,
                );
                Vec::new()
            }
            Inbound::RemoveInterface { if_index } => {
                self.on_interface_removed(if_index);
                Vec::new()
            }
            Inbound::LinkState { if_index, up } => {
                self.on_link_state(if_index, up, now);
                Vec::new()
            }
            Inbound::RouterAdvertisement {
                if_index,
                from,
                packet,
            } => {
                match self.on_ra_received(if_index, from, &packet, now) {
                    Ok(()) => {}
                    Err(EngineError::Decode(e)) => {
                        warn!(if_index, %from, "discarding router advertisement: {e}");
                    }
                    Err(EngineError::State(e)) => {
                        debug!(if_index, %from, "dropping router advertisement: {e}");
                    }
                }
                Vec::new()
            }
            Inbound::SendSolicitation { if_index } => {
                match self.on_send_solicitation_request(if_index) {
                    Ok(event) => vec![event],
                    Err(e) => {
                        warn!(if_index, "cannot send solicitation: {e}");
                        vec![Outbound::ControlError {
                            if_index,
                            error: e.to_string(),
                        }]
                    }
                }
            }
            Inbound::ShowInterfaceInfo { if_index } => {
                let mut out = match self.report_state(if_index, now) {
                    Ok(reports) => reports
                        .into_iter()
                        .map(|report| Outbound::InterfaceInfo { report })
                        .collect(),
                    Err(e) => {
                        warn!(?if_index, "cannot show interface info: {e}");
                        vec![Outbound::ControlError {
                            if_index: if_index.unwrap_or_default(),
                            error: e.to_string(),
                        }]
                    }
                };
                out.push(Outbound::InterfaceInfoEnd);
                out
            }
        }
    }

    pub fn on_interface_update(&mut self, update: IfUpdate, now: Instant) {
        match self.interfaces.get_mut(&update.if_index) {
            Some(iface) => {
                let before = iface.state();
                iface.update(&update, &mut self.timers, &mut self.rng, now);
                debug!(
                    if_index = update.if_index,
                    from = %before,
                    to = %iface.state(),
                    "interface updated"
                );
            }
            None => {
                let iface = Interface::new(&update, &mut self.timers, &mut self.rng, now);
                info!(
                    if_index = update.if_index,
                    running = update.running,
                    hw_address = %update.hw_address,
                    state = %iface.state(),
                    "new interface"
                );
                self.interfaces.insert(update.if_index, iface);
            }
        }
    }

    /// Returns false if the interface was not known.
    pub fn on_interface_removed(&mut self, if_index: u32) -> bool {
        match self.interfaces.remove(&if_index) {
            Some(mut iface) => {
                let dropped = iface.teardown(&mut self.timers);
                info!(if_index, advertisements = dropped, "interface removed");
                true
            }
            None => {
                debug!(if_index, "remove for unknown interface");
                false
            }
        }
    }

    pub fn on_link_state(&mut self, if_index: u32, up: bool, now: Instant) {
        let Some(iface) = self.interfaces.get_mut(&if_index) else {
            debug!(if_index, up, "link state for unknown interface");
            return;
        };
        if up {
            debug!(if_index, "link up");
            iface.link_up(&mut self.timers, &mut self.rng, now);
        } else {
            debug!(if_index, "link down");
        }
    }

    /// Decode and store an advertisement. On error nothing changes.
    pub fn on_ra_received(
        &mut self,
        if_index: u32,
        from: Ipv6Addr,
        packet: &[u8],
        now: Instant,
    ) -> error::Result<()> {
        let iface = self
            .interfaces
            .get_mut(&if_index)
            .ok_or(StateError::UnknownInterface(if_index))?;

        let ra = RouterAdvertisement::parse(packet, from, Utc::now(), now)?;
        ra.log_details();

        let min_lifetime = ra.min_lifetime;
        let replaced = iface.ra_received(ra, &mut self.timers);
        debug!(
            if_index,
            %from,
            min_lifetime,
            replaced = replaced.is_some(),
            "router advertisement accepted"
        );
        Ok(())
    }

    pub fn on_send_solicitation_request(&self, if_index: u32) -> Result<Outbound, StateError> {
        if !self.interfaces.contains_key(&if_index) {
            return Err(StateError::UnknownInterface(if_index));
        }
        debug!(if_index, "solicitation requested");
        Ok(Outbound::SendSolicitation { if_index })
    }

    /// Snapshot one interface, or all of them ordered by index.
    pub fn report_state(
        &self,
        if_index: Option<u32>,
        now: Instant,
    ) -> Result<Vec<InterfaceReport>, StateError> {
        match if_index {
            Some(if_index) => self
                .interfaces
                .get(&if_index)
                .map(|iface| vec![iface.report(now)])
                .ok_or(StateError::UnknownInterface(if_index)),
            None => {
                let mut reports: Vec<_> =
                    self.interfaces.values().map(|iface| iface.report(now)).collect();
                reports.sort_by_key(|r| r.if_index);
                Ok(reports)
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at `now`, in deadline order.
    pub fn on_timers_expired(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();

        while let Some((id, target)) = self.timers.pop_expired(now) {
            let Some(iface) = self.interfaces.get_mut(&target.if_index()) else {
                continue;
            };
            match target {
                TimerTarget::Interface(if_index) => {
                    if iface.on_timeout(id, &mut self.timers, &mut self.rng, now) {
                        debug!(if_index, probes = iface.probes(), state = %iface.state(), "soliciting");
                        out.push(Outbound::SendSolicitation { if_index });
                    }
                }
                TimerTarget::Advertisement { from, .. } => {
                    iface.advertisement_expiring(&from, id, &mut self.timers, &mut self.rng, now);
                }
            }
        }

        out
    }

    pub fn interface(&self, if_index: u32) -> Option<&Interface> {
        self.interfaces.get(&if_index)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    /// Armed timers acting on `if_index`, state machine and refresh alike.
    pub fn armed_timers(&self, if_index: u32) -> usize {
        self.timers.armed_for(if_index)
    }
}
