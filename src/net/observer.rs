//! Observer role: dead reckoning
//!
//! A remote actor is never snapped to broadcast positions. The observer keeps
//! the newest command it has seen and re-simulates it locally every tick
//! until a newer one arrives.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::SimConfig;
use crate::game::body::PhysicsBody;
use crate::game::clock::{FixedTickClock, Tick};
use crate::game::locomotion::{LocomotionController, LocomotionState};
use crate::metrics::Metrics;
use crate::net::protocol::{decode, ActorId, BodyState, InputCommand, ServerMessage, StateUpdate};

pub struct ObserverReplica<B: PhysicsBody> {
    actor: ActorId,
    controller: LocomotionController,
    state: LocomotionState,
    body: B,
    clock: FixedTickClock,
    last_command: Option<InputCommand>,
    last_authoritative: Option<BodyState>,
    last_state: Option<BodyState>,
    metrics: Arc<Metrics>,
}

impl<B: PhysicsBody> ObserverReplica<B> {
    pub fn new(actor: ActorId, config: &SimConfig, body: B, metrics: Arc<Metrics>) -> Self {
        let controller = LocomotionController::new(config.movement.clone(), config.tick_rate);
        let mut clock = FixedTickClock::new(config.tick_rate);
        if let Some(max) = config.max_catch_up_ticks {
            clock = clock.with_max_catch_up(max);
        }

        Self {
            actor,
            state: controller.spawn_state(),
            controller,
            body,
            clock,
            last_command: None,
            last_authoritative: None,
            last_state: None,
            metrics,
        }
    }

    /// Decode and handle one datagram from the authority
    pub fn handle_message(&mut self, bytes: &[u8]) -> bool {
        match decode::<ServerMessage>(bytes) {
            Ok(ServerMessage::State(update)) => self.on_state(&update),
            Err(e) => {
                Metrics::incr(&self.metrics.decode_errors);
                warn!("Observer dropped malformed message: {}", e);
                false
            }
        }
    }

    /// Adopt the broadcast command if it is newer than the one held.
    /// Returns true if it was adopted.
    pub fn on_state(&mut self, update: &StateUpdate) -> bool {
        if update.actor != self.actor {
            return false;
        }
        Metrics::incr(&self.metrics.states_received);

        if let Some(held) = &self.last_command {
            if update.command.tick <= held.tick {
                debug!(
                    held = held.tick,
                    received = update.command.tick,
                    "Ignoring stale remote command"
                );
                return false;
            }
        }
        self.last_command = Some(update.command);
        self.last_authoritative = Some(update.state);
        true
    }

    /// Advance the clock by a frame delta and dead-reckon every due tick
    pub fn frame(&mut self, elapsed: Duration) -> usize {
        self.clock.advance(elapsed);
        let mut ticks = 0;
        while self.clock.should_tick() {
            self.run_tick(self.clock.current_tick());
            ticks += 1;
        }
        ticks
    }

    fn run_tick(&mut self, tick: Tick) {
        // Idle until the first broadcast
        let input = match self.last_command {
            Some(command) => InputCommand { tick, ..command },
            None => InputCommand::new(tick),
        };

        let was_ragdoll = self.state.is_ragdoll();
        let result = self.controller.tick(&mut self.state, &mut self.body, &input);
        if was_ragdoll != self.state.is_ragdoll() {
            Metrics::incr(&self.metrics.ragdoll_transitions);
        }
        self.last_state = Some(result);
        Metrics::incr(&self.metrics.observer_ticks);
        trace!(tick, position = ?result.position, "Observer dead-reckoned");
    }

    #[inline]
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick()
    }

    /// Command currently being replayed
    pub fn last_command(&self) -> Option<&InputCommand> {
        self.last_command.as_ref()
    }

    /// Authoritative state that arrived with the replayed command
    pub fn last_authoritative(&self) -> Option<&BodyState> {
        self.last_authoritative.as_ref()
    }

    /// Locally simulated state of the latest tick
    pub fn last_state(&self) -> Option<&BodyState> {
        self.last_state.as_ref()
    }

    pub fn controller(&self) -> &LocomotionController {
        &self.controller
    }

    pub fn state(&self) -> &LocomotionState {
        &self.state
    }

    pub fn body(&self) -> &B {
        &self.body
    }
}
