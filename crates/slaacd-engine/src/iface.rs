//! Per-interface router solicitation state machine.

use crate::ra::RouterAdvertisement;
use crate::store::AdvertisementStore;
use crate::timer::{TimerId, TimerQueue, TimerTarget};
use crate::{MAX_RTR_SOLICITATIONS, MAX_RTR_SOLICITATION_DELAY, RTR_SOLICITATION_INTERVAL};
use rand::Rng;
use slaacd_core::types::{HwAddr, IfState, InterfaceReport};
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Interface attributes carried by an update event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfUpdate {
    pub if_index: u32,
    pub running: bool,
    pub autoconf_privacy: bool,
    pub hw_address: HwAddr,
    pub link_local: Option<Ipv6Addr>,
}

#[derive(Debug)]
pub struct Interface {
    if_index: u32,
    state: IfState,
    probes: u32,
    running: bool,
    autoconf_privacy: bool,
    hw_address: HwAddr,
    link_local: Option<Ipv6Addr>,
    timer: Option<TimerId>,
    advertisements: AdvertisementStore,
}

fn jitter<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    let max = MAX_RTR_SOLICITATION_DELAY.as_micros() as u64;
    Duration::from_micros(rng.gen_range(0..max))
}

impl Interface {
    /// A new interface starts probing right away if its link is running.
    pub fn new<R: Rng + ?Sized>(
        update: &IfUpdate,
        timers: &mut TimerQueue,
        rng: &mut R,
        now: Instant,
    ) -> Self {
        let mut iface = Self {
            if_index: update.if_index,
            state: IfState::Down,
            probes: 0,
            running: update.running,
            autoconf_privacy: update.autoconf_privacy,
            hw_address: update.hw_address,
            link_local: update.link_local,
            timer: None,
            advertisements: AdvertisementStore::new(),
        };
        if iface.running {
            iface.start_probe(timers, rng, now);
        }
        iface
    }

    pub fn update<R: Rng + ?Sized>(
        &mut self,
        update: &IfUpdate,
        timers: &mut TimerQueue,
        rng: &mut R,
        now: Instant,
    ) {
        let need_refresh = self.autoconf_privacy != update.autoconf_privacy
            || self.hw_address != update.hw_address;
        let was_running = self.running;

        self.running = update.running;
        self.autoconf_privacy = update.autoconf_privacy;
        self.hw_address = update.hw_address;
        self.link_local = update.link_local;

        if !self.running {
            self.go_down(timers);
            return;
        }

        if !was_running || self.state == IfState::Down {
            debug!(if_index = self.if_index, "link running");
            self.start_probe(timers, rng, now);
            return;
        }

        match self.state {
            IfState::Idle if need_refresh => {
                debug!(if_index = self.if_index, "interface attributes changed");
                self.start_probe(timers, rng, now)
            }
            IfState::Down | IfState::Idle | IfState::Delay | IfState::Probing => {}
        }
    }

    /// Begin a probing episode: enter Delay and wait a random fraction of a second.
    pub fn start_probe<R: Rng + ?Sized>(
        &mut self,
        timers: &mut TimerQueue,
        rng: &mut R,
        now: Instant,
    ) {
        self.cancel_timer(timers);
        self.state = IfState::Delay;
        self.probes = 0;

        let delay = jitter(rng);
        debug!(
            if_index = self.if_index,
            delay_us = delay.as_micros() as u64,
            "delaying first solicitation"
        );
        self.arm(timers, now, delay);
    }

    fn go_down(&mut self, timers: &mut TimerQueue) {
        if self.state != IfState::Down {
            debug!(if_index = self.if_index, from = %self.state, "interface down");
        }
        self.state = IfState::Down;
        self.cancel_timer(timers);
    }

    /// Handle the state machine timer `id` firing. Returns true when a
    /// solicitation has to be sent.
    pub fn on_timeout<R: Rng + ?Sized>(
        &mut self,
        id: TimerId,
        timers: &mut TimerQueue,
        rng: &mut R,
        now: Instant,
    ) -> bool {
        if self.timer != Some(id) {
            return false;
        }
        self.timer = None;

        match self.state {
            IfState::Delay | IfState::Probing => {
                self.state = IfState::Probing;
                self.probes += 1;
                if self.probes >= MAX_RTR_SOLICITATIONS {
                    debug!(
                        if_index = self.if_index,
                        probes = self.probes,
                        "no advertisement received, giving up"
                    );
                    self.state = IfState::Idle;
                } else {
                    let delay = RTR_SOLICITATION_INTERVAL + jitter(rng);
                    self.arm(timers, now, delay);
                }
                true
            }
            IfState::Down | IfState::Idle => false,
        }
    }

    /// Store a validated advertisement and stop probing.
    pub fn ra_received(
        &mut self,
        ra: RouterAdvertisement,
        timers: &mut TimerQueue,
    ) -> Option<RouterAdvertisement> {
        let replaced = self.advertisements.upsert(self.if_index, ra, timers);
        self.cancel_timer(timers);
        self.state = IfState::Idle;
        replaced
    }

    /// The refresh timer `id` of the advertisement from `from` fired.
    pub fn advertisement_expiring<R: Rng + ?Sized>(
        &mut self,
        from: &Ipv6Addr,
        id: TimerId,
        timers: &mut TimerQueue,
        rng: &mut R,
        now: Instant,
    ) {
        if !self.advertisements.expired(from, id) {
            return;
        }
        if !self.running {
            debug!(if_index = self.if_index, %from, "advertisement aging on a down link");
            return;
        }
        debug!(if_index = self.if_index, %from, "advertisement aging, soliciting");
        self.start_probe(timers, rng, now);
    }

    /// Carrier came back: solicit.
    pub fn link_up<R: Rng + ?Sized>(&mut self, timers: &mut TimerQueue, rng: &mut R, now: Instant) {
        if self.running {
            self.start_probe(timers, rng, now);
        }
    }

    /// Release every timer the interface owns.
    pub fn teardown(&mut self, timers: &mut TimerQueue) -> usize {
        self.cancel_timer(timers);
        self.advertisements.remove_all(timers)
    }

    fn arm(&mut self, timers: &mut TimerQueue, now: Instant, delay: Duration) {
        self.timer = now
            .checked_add(delay)
            .map(|deadline| timers.schedule(deadline, TimerTarget::Interface(self.if_index)));
    }

    fn cancel_timer(&mut self, timers: &mut TimerQueue) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
    }

    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    pub fn state(&self) -> IfState {
        self.state
    }

    pub fn probes(&self) -> u32 {
        self.probes
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn advertisements(&self) -> &AdvertisementStore {
        &self.advertisements
    }

    pub fn report(&self, now: Instant) -> InterfaceReport {
        let mut advertisements: Vec<_> = self
            .advertisements
            .iter()
            .map(|ra| ra.report(now))
            .collect();
        advertisements.sort_by_key(|ra| ra.from);

        InterfaceReport {
            if_index: self.if_index,
            state: self.state,
            probes: self.probes,
            running: self.running,
            autoconf_privacy: self.autoconf_privacy,
            hw_address: self.hw_address,
            link_local: self.link_local,
            advertisements,
        }
    }
}
