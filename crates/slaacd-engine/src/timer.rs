use std::collections::{BTreeMap, HashMap};
use std::net::Ipv6Addr;
use std::time::Instant;

/// Handle to a scheduled timer. Never reused within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer acts on when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTarget {
    /// The solicitation state machine of an interface
    Interface(u32),
    /// Refresh of the advertisement learned from `from`
    Advertisement { if_index: u32, from: Ipv6Addr },
}

impl TimerTarget {
    pub fn if_index(&self) -> u32 {
        match self {
            TimerTarget::Interface(if_index) => *if_index,
            TimerTarget::Advertisement { if_index, .. } => *if_index,
        }
    }
}

/// One-shot timers ordered by deadline.
///
/// Owners keep the returned [`TimerId`]; a fired timer whose id the owner no
/// longer holds is stale and must be ignored by the caller.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    queue: BTreeMap<(Instant, TimerId), TimerTarget>,
    deadlines: HashMap<TimerId, Instant>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, target: TimerTarget) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((deadline, id), target);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => {
                self.queue.remove(&(deadline, id));
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.deadlines.get(&id).copied()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<(TimerId, TimerTarget)> {
        let (&(deadline, id), _) = self.queue.first_key_value()?;
        if deadline > now {
            return None;
        }
        let target = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((id, target))
    }

    /// Number of armed timers acting on `if_index`.
    pub fn armed_for(&self, if_index: u32) -> usize {
        self.queue
            .values()
            .filter(|target| target.if_index() == if_index)
            .count()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
