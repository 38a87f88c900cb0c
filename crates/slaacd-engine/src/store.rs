use crate::ra::RouterAdvertisement;
use crate::timer::{TimerId, TimerQueue, TimerTarget};
use crate::{MAX_RTR_SOLICITATIONS, RTR_SOLICITATION_INTERVAL};
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::Duration;
use tracing::debug;

/// Time reserved before `min_lifetime` runs out for a full solicitation cycle.
pub const REFRESH_HEADROOM: Duration = Duration::from_secs(
    MAX_RTR_SOLICITATIONS as u64 * (RTR_SOLICITATION_INTERVAL.as_secs() + 1),
);

/// Delay after receipt at which an advertisement is refreshed. Zero when
/// `min_lifetime` is shorter than the headroom.
pub fn refresh_delay(min_lifetime: u32) -> Duration {
    Duration::from_secs(u64::from(min_lifetime)).saturating_sub(REFRESH_HEADROOM)
}

/// The advertisements of one interface, at most one per router.
#[derive(Debug, Default)]
pub struct AdvertisementStore {
    entries: HashMap<Ipv6Addr, RouterAdvertisement>,
}

impl AdvertisementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `ra`, replacing and returning any entry from the same router,
    /// and arm its refresh timer relative to its receive time.
    pub fn upsert(
        &mut self,
        if_index: u32,
        mut ra: RouterAdvertisement,
        timers: &mut TimerQueue,
    ) -> Option<RouterAdvertisement> {
        let replaced = self.entries.remove(&ra.from).map(|mut old| {
            if let Some(id) = old.expiry_timer.take() {
                timers.cancel(id);
            }
            old
        });

        let delay = refresh_delay(ra.min_lifetime);
        ra.expiry_timer = match ra.uptime.checked_add(delay) {
            Some(deadline) => Some(timers.schedule(
                deadline,
                TimerTarget::Advertisement {
                    if_index,
                    from: ra.from,
                },
            )),
            None => {
                debug!(if_index, from = %ra.from, "lifetime unbounded, no refresh scheduled");
                None
            }
        };
        debug!(
            if_index,
            from = %ra.from,
            refresh_in = delay.as_secs(),
            replaced = replaced.is_some(),
            "advertisement stored"
        );

        self.entries.insert(ra.from, ra);
        replaced
    }

    /// Clear the handle of a fired refresh timer. False if `id` is not the
    /// live timer of the entry from `from`.
    pub fn expired(&mut self, from: &Ipv6Addr, id: TimerId) -> bool {
        match self.entries.get_mut(from) {
            Some(ra) if ra.expiry_timer == Some(id) => {
                ra.expiry_timer = None;
                true
            }
            _ => false,
        }
    }

    /// Drop every advertisement and cancel its timer. Returns how many were held.
    pub fn remove_all(&mut self, timers: &mut TimerQueue) -> usize {
        let count = self.entries.len();
        for (_, mut ra) in self.entries.drain() {
            if let Some(id) = ra.expiry_timer.take() {
                timers.cancel(id);
            }
        }
        count
    }

    pub fn get(&self, from: &Ipv6Addr) -> Option<&RouterAdvertisement> {
        self.entries.get(from)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouterAdvertisement> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{router, RaBuilder};
    use chrono::Utc;
    use std::time::Instant;

    fn ra_at(from: Ipv6Addr, router_lifetime: u16, uptime: Instant) -> RouterAdvertisement {
        let pkt = RaBuilder::new(router_lifetime).build();
        RouterAdvertisement::parse(&pkt, from, Utc::now(), uptime).unwrap()
    }

    #[test]
    fn test_refresh_delay() {
        assert_eq!(REFRESH_HEADROOM, Duration::from_secs(15));
        assert_eq!(refresh_delay(1800), Duration::from_secs(1785));
        assert_eq!(refresh_delay(15), Duration::ZERO);
        assert_eq!(refresh_delay(10), Duration::ZERO);
        assert_eq!(refresh_delay(0), Duration::ZERO);
    }

    #[test]
    fn test_upsert_arms_refresh() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut store = AdvertisementStore::new();

        assert!(store.upsert(5, ra_at(router(), 1800, t0), &mut timers).is_none());

        let id = store.get(&router()).unwrap().expiry_timer().unwrap();
        assert_eq!(timers.deadline(id), Some(t0 + Duration::from_secs(1785)));
    }

    #[test]
    fn test_upsert_replaces_same_router() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut store = AdvertisementStore::new();

        store.upsert(1, ra_at(router(), 1800, t0), &mut timers);
        let first = store.get(&router()).unwrap().expiry_timer().unwrap();

        let t1 = t0 + Duration::from_secs(60);
        let replaced = store.upsert(1, ra_at(router(), 600, t1), &mut timers).unwrap();
        assert_eq!(replaced.router_lifetime, 1800);

        assert_eq!(store.len(), 1);
        let current = store.get(&router()).unwrap();
        assert_eq!(current.router_lifetime, 600);
        assert!(!timers.is_armed(first));
        assert_eq!(timers.len(), 1);
        assert_eq!(
            timers.deadline(current.expiry_timer().unwrap()),
            Some(t1 + Duration::from_secs(585))
        );
    }

    #[test]
    fn test_distinct_routers_coexist() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut store = AdvertisementStore::new();

        store.upsert(1, ra_at(router(), 1800, t0), &mut timers);
        store.upsert(1, ra_at("fe80::2".parse().unwrap(), 1800, t0), &mut timers);
        assert_eq!(store.len(), 2);
        assert_eq!(timers.armed_for(1), 2);
    }

    #[test]
    fn test_short_lifetime_fires_immediately() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut store = AdvertisementStore::new();

        store.upsert(1, ra_at(router(), 10, t0), &mut timers);
        let id = store.get(&router()).unwrap().expiry_timer().unwrap();
        assert_eq!(timers.deadline(id), Some(t0));
        assert_eq!(timers.pop_expired(t0).map(|(fired, _)| fired), Some(id));
    }

    #[test]
    fn test_expired_matches_live_timer_only() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut store = AdvertisementStore::new();

        store.upsert(1, ra_at(router(), 1800, t0), &mut timers);
        let stale = store.get(&router()).unwrap().expiry_timer().unwrap();
        store.upsert(1, ra_at(router(), 1800, t0), &mut timers);
        let live = store.get(&router()).unwrap().expiry_timer().unwrap();

        assert!(!store.expired(&router(), stale));
        assert!(store.expired(&router(), live));
        assert!(!store.expired(&router(), live));
        // Firing does not remove the advertisement
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_all_cancels_timers() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let mut store = AdvertisementStore::new();

        store.upsert(1, ra_at(router(), 1800, t0), &mut timers);
        store.upsert(1, ra_at("fe80::2".parse().unwrap(), 900, t0), &mut timers);

        assert_eq!(store.remove_all(&mut timers), 2);
        assert!(store.is_empty());
        assert!(timers.is_empty());
    }
}
