//! Tick-indexed ring history
//!
//! Fixed-capacity storage where tick `T` lives in slot `T % capacity`.
//! Writing `T` silently overwrites whatever held `T - capacity`.

use crate::game::clock::Tick;

/// Fixed-capacity ring of per-tick records
#[derive(Debug, Clone)]
pub struct RingHistory<T> {
    slots: Vec<Option<(Tick, T)>>,
}

impl<T> RingHistory<T> {
    /// Create an empty history. Capacity is fixed for the buffer's lifetime.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn index(&self, tick: Tick) -> usize {
        (tick % self.slots.len() as u64) as usize
    }

    /// Store `payload` at `tick`'s slot, unconditionally overwriting
    pub fn write(&mut self, tick: Tick, payload: T) {
        let idx = self.index(tick);
        self.slots[idx] = Some((tick, payload));
    }

    /// Whatever currently occupies `tick`'s slot, regardless of which tick wrote it.
    ///
    /// Reading a tick older than `capacity` returns the overwriting payload.
    pub fn read(&self, tick: Tick) -> Option<&T> {
        self.slots[self.index(tick)].as_ref().map(|(_, payload)| payload)
    }

    /// The payload written for exactly `tick`, or `None` if the slot is empty or stale
    pub fn get(&self, tick: Tick) -> Option<&T> {
        match &self.slots[self.index(tick)] {
            Some((written, payload)) if *written == tick => Some(payload),
            _ => None,
        }
    }

    /// Tick that last wrote `tick`'s slot
    pub fn written_tick(&self, tick: Tick) -> Option<Tick> {
        self.slots[self.index(tick)].as_ref().map(|(written, _)| *written)
    }

    /// True if `tick` is still retained
    #[inline]
    pub fn contains(&self, tick: Tick) -> bool {
        self.get(tick).is_some()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
