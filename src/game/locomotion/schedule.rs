//! Tick-keyed deferred events (replaces suspended timers)

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::body::Side;
use crate::game::clock::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduledEvent {
    /// Return an arm to its rest pose after a punch
    RestoreArm(Side),
}

/// Pending events, fired once their tick is reached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventQueue {
    pending: SmallVec<[(Tick, ScheduledEvent); 4]>,
}

impl EventQueue {
    /// Schedule `event` at `due`, replacing any pending copy of the same event
    pub fn schedule(&mut self, due: Tick, event: ScheduledEvent) {
        self.pending.retain(|(_, e)| *e != event);
        self.pending.push((due, event));
    }

    /// Remove and return events due at or before `now`, in due order
    pub fn take_due(&mut self, now: Tick) -> SmallVec<[ScheduledEvent; 4]> {
        let mut due: SmallVec<[(Tick, ScheduledEvent); 4]> = SmallVec::new();
        self.pending.retain(|entry| {
            if entry.0 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(tick, _)| *tick);
        due.into_iter().map(|(_, event)| event).collect()
    }

    pub fn due_tick(&self, event: ScheduledEvent) -> Option<Tick> {
        self.pending
            .iter()
            .find(|(_, e)| *e == event)
            .map(|(tick, _)| *tick)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
