//! Owner role: client-side prediction
//!
//! Every due tick the owner samples input, sanitizes it, records it, sends it
//! to the authority and simulates it locally without waiting for confirmation.
//! Authoritative broadcasts are compared against the prediction for the same
//! tick; under [`ReconcilePolicy::Resimulate`] a mismatch rewinds and replays.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::{ReconcilePolicy, SimConfig};
use crate::game::body::PhysicsBody;
use crate::game::clock::{FixedTickClock, Tick};
use crate::game::history::RingHistory;
use crate::game::locomotion::{LocomotionController, LocomotionState};
use crate::metrics::Metrics;
use crate::net::protocol::{decode, ActorId, BodyState, InputCommand, ServerMessage, StateUpdate};
use crate::net::reconcile::{resimulate, DriftReport, ReplayBuffers};
use crate::net::transport::CommandSink;

/// Where the owner's per-tick command comes from
pub trait InputSource {
    /// Command for `tick`. The owner overwrites the tick field and clamps the rest.
    fn sample(&mut self, tick: Tick) -> InputCommand;
}

impl<F> InputSource for F
where
    F: FnMut(Tick) -> InputCommand,
{
    fn sample(&mut self, tick: Tick) -> InputCommand {
        self(tick)
    }
}

pub struct OwnerClient<B: PhysicsBody> {
    actor: ActorId,
    controller: LocomotionController,
    state: LocomotionState,
    body: B,
    clock: FixedTickClock,
    inputs: RingHistory<InputCommand>,
    predicted: RingHistory<BodyState>,
    locomotion: RingHistory<LocomotionState>,
    checkpoints: RingHistory<B::Checkpoint>,
    last_authoritative: Option<StateUpdate>,
    last_drift: Option<DriftReport>,
    policy: ReconcilePolicy,
    tolerance: f32,
    metrics: Arc<Metrics>,
}

impl<B: PhysicsBody> OwnerClient<B> {
    pub fn new(actor: ActorId, config: &SimConfig, body: B, metrics: Arc<Metrics>) -> Self {
        let controller = LocomotionController::new(config.movement.clone(), config.tick_rate);
        let mut clock = FixedTickClock::new(config.tick_rate);
        if let Some(max) = config.max_catch_up_ticks {
            clock = clock.with_max_catch_up(max);
        }
        let state = controller.spawn_state();

        Self {
            actor,
            controller,
            state,
            body,
            clock,
            inputs: RingHistory::new(config.history_capacity),
            predicted: RingHistory::new(config.history_capacity),
            locomotion: RingHistory::new(config.history_capacity),
            checkpoints: RingHistory::new(config.history_capacity),
            last_authoritative: None,
            last_drift: None,
            policy: config.reconcile_policy,
            tolerance: config.drift_tolerance,
            metrics,
        }
    }

    /// Advance the clock by a frame delta and run every due tick.
    /// Returns the number of ticks simulated.
    pub fn frame<S, K>(&mut self, elapsed: Duration, source: &mut S, sink: &K) -> usize
    where
        S: InputSource + ?Sized,
        K: CommandSink + ?Sized,
    {
        self.clock.advance(elapsed);
        let mut ticks = 0;
        while self.clock.should_tick() {
            self.run_tick(self.clock.current_tick(), source, sink);
            ticks += 1;
        }
        ticks
    }

    fn run_tick<S, K>(&mut self, tick: Tick, source: &mut S, sink: &K)
    where
        S: InputSource + ?Sized,
        K: CommandSink + ?Sized,
    {
        // predict, record and send the same clamped command the authority simulates
        let command = InputCommand {
            tick,
            ..source.sample(tick)
        }
        .sanitized();
        self.inputs.write(tick, command);

        match sink.send_command(self.actor, &command) {
            Ok(()) => Metrics::incr(&self.metrics.commands_sent),
            Err(e) => warn!(tick, "Failed to send command: {}", e),
        }

        let was_ragdoll = self.state.is_ragdoll();
        let result = self.controller.tick(&mut self.state, &mut self.body, &command);
        if was_ragdoll != self.state.is_ragdoll() {
            Metrics::incr(&self.metrics.ragdoll_transitions);
        }

        self.predicted.write(tick, result);
        self.locomotion.write(tick, self.state.clone());
        self.checkpoints.write(tick, self.body.checkpoint());
        Metrics::incr(&self.metrics.owner_ticks);
        trace!(tick, position = ?result.position, "Owner predicted");
    }

    /// Decode and handle one datagram from the authority
    pub fn handle_message(&mut self, bytes: &[u8]) -> Option<DriftReport> {
        match decode::<ServerMessage>(bytes) {
            Ok(ServerMessage::State(update)) => self.on_state(&update),
            Err(e) => {
                Metrics::incr(&self.metrics.decode_errors);
                warn!("Owner dropped malformed message: {}", e);
                None
            }
        }
    }

    /// Store an authoritative broadcast and measure drift against the prediction.
    ///
    /// Returns `None` for other actors' updates and when the predicted state
    /// for that tick is no longer buffered.
    pub fn on_state(&mut self, update: &StateUpdate) -> Option<DriftReport> {
        if update.actor != self.actor {
            return None;
        }
        Metrics::incr(&self.metrics.states_received);
        self.last_authoritative = Some(*update);

        let Some(predicted) = self.predicted.get(update.state.tick) else {
            debug!(tick = update.state.tick, "No prediction left for authoritative tick");
            return None;
        };
        let report = DriftReport::compare(predicted, &update.state);
        let mismatch = report.exceeds(self.tolerance);
        self.metrics.record_drift(report.position_error, mismatch);
        self.last_drift = Some(report);

        if mismatch {
            debug!(
                tick = report.tick,
                error = report.position_error,
                "Prediction drifted past tolerance"
            );
            if self.policy == ReconcilePolicy::Resimulate {
                self.correct(&update.state);
            }
        }
        Some(report)
    }

    fn correct(&mut self, authoritative: &BodyState) {
        let result = resimulate(
            &self.controller,
            &mut self.body,
            authoritative,
            self.clock.current_tick(),
            ReplayBuffers {
                inputs: &self.inputs,
                locomotion: &mut self.locomotion,
                predicted: &mut self.predicted,
                checkpoints: &mut self.checkpoints,
            },
        );
        match result {
            Ok((state, replayed)) => {
                self.state = state;
                self.metrics
                    .resimulated_ticks
                    .fetch_add(replayed, Ordering::Relaxed);
            }
            Err(e) => warn!("Cannot correct prediction: {}", e),
        }
    }

    /// Report a collision on the owned body
    pub fn register_impact(&mut self, magnitude: f32) -> bool {
        let knocked = self.controller.register_impact(&mut self.state, magnitude);
        if knocked {
            Metrics::incr(&self.metrics.ragdoll_transitions);
        }
        knocked
    }

    #[inline]
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick()
    }

    pub fn state(&self) -> &LocomotionState {
        &self.state
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn controller(&self) -> &LocomotionController {
        &self.controller
    }

    /// Input sent for exactly `tick`, if still buffered
    pub fn input(&self, tick: Tick) -> Option<&InputCommand> {
        self.inputs.get(tick)
    }

    /// Predicted state for exactly `tick`, if still buffered
    pub fn predicted(&self, tick: Tick) -> Option<&BodyState> {
        self.predicted.get(tick)
    }

    pub fn last_authoritative(&self) -> Option<&StateUpdate> {
        self.last_authoritative.as_ref()
    }

    pub fn last_drift(&self) -> Option<&DriftReport> {
        self.last_drift.as_ref()
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }
}
