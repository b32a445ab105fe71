//! Fixed-tick clock
//!
//! Converts variable frame deltas into a monotonically increasing tick
//! counter. Callers drain due ticks in a loop:
//!
//! ```ignore
//! clock.advance(frame_dt);
//! while clock.should_tick() {
//!     simulate(clock.current_tick());
//! }
//! ```

use std::time::Duration;

/// Simulation time unit
pub type Tick = u64;

/// Fixed-rate tick accumulator
#[derive(Debug, Clone)]
pub struct FixedTickClock {
    tick_duration: Duration,
    accumulated: Duration,
    current_tick: Tick,
    /// Optional clamp on accumulated time, in ticks
    max_catch_up: Option<u32>,
}

impl FixedTickClock {
    /// Create a clock ticking at `tick_rate` Hz
    pub fn new(tick_rate: u32) -> Self {
        let rate = tick_rate.max(1);
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / rate as f64),
            accumulated: Duration::ZERO,
            current_tick: 0,
            max_catch_up: None,
        }
    }

    /// Clamp catch-up after long stalls to at most `ticks` per frame
    pub fn with_max_catch_up(mut self, ticks: u32) -> Self {
        self.max_catch_up = Some(ticks.max(1));
        self
    }

    /// Accumulate elapsed wall-clock time
    pub fn advance(&mut self, elapsed: Duration) {
        self.accumulated += elapsed;

        if let Some(max) = self.max_catch_up {
            let cap = self.tick_duration * max;
            if self.accumulated > cap {
                tracing::debug!(
                    "Clock stalled for {:?}, dropping {:?} of catch-up",
                    self.accumulated,
                    self.accumulated - cap
                );
                self.accumulated = cap;
            }
        }
    }

    /// Accumulate elapsed seconds (convenience for float frame deltas)
    pub fn advance_secs(&mut self, seconds: f32) {
        if seconds.is_finite() && seconds > 0.0 {
            self.advance(Duration::from_secs_f32(seconds));
        }
    }

    /// If a tick is due, consume one tick of accumulated time and advance the counter
    pub fn should_tick(&mut self) -> bool {
        if self.accumulated >= self.tick_duration {
            self.accumulated -= self.tick_duration;
            self.current_tick += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    #[inline]
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Fixed delta time in seconds
    #[inline]
    pub fn dt(&self) -> f32 {
        self.tick_duration.as_secs_f32()
    }
}
