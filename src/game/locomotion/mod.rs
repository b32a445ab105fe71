//! Deterministic per-tick locomotion controller
//!
//! [`LocomotionController::step`] is a pure function of the carried
//! [`LocomotionState`], a [`BodySnapshot`] and one [`InputCommand`]. It returns
//! an [`ActuatorFrame`] for the caller to apply; it never touches physics.
//!
//! Sub-behaviours run in a fixed order each tick:
//! grounding, gait prediction, movement, step cycle, reach, punch
//! (plus due scheduled events), jump, turning, pose reset, center of mass.

pub mod pose;
pub mod schedule;
pub mod state;

mod airborne;
mod balance;
mod gait;
mod limbs;
mod turning;

use glam::Vec3;
use smallvec::SmallVec;
use tracing::{info, trace};

use crate::config::MovementConfig;
use crate::game::body::{ActuatorFrame, BodyPart, BodySnapshot, Impulse, PhysicsBody, Segment};
use crate::game::constants::seconds_to_ticks;
use crate::net::protocol::{BodyState, InputCommand};

pub use pose::{DriveProfile, DriveTable, JointTargets};
pub use schedule::{EventQueue, ScheduledEvent};
pub use state::{ArmState, BalanceState, Gait, LocomotionState, Stance, Vertical};

/// Scratch outputs accumulated while stepping one tick
pub(crate) struct TickContext {
    root_velocity: Vec3,
    velocity_command: Option<Vec3>,
    impulses: SmallVec<[Impulse; 6]>,
}

impl TickContext {
    fn new(body: &BodySnapshot) -> Self {
        Self {
            root_velocity: body.root().velocity,
            velocity_command: None,
            impulses: SmallVec::new(),
        }
    }

    /// Root velocity as commanded so far this tick
    pub(crate) fn velocity(&self) -> Vec3 {
        self.velocity_command.unwrap_or(self.root_velocity)
    }

    pub(crate) fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity_command = Some(velocity);
    }

    pub(crate) fn push_impulse(&mut self, part: BodyPart, impulse: Vec3) {
        self.impulses.push(Impulse { part, impulse });
    }
}

/// Movement tunables plus the fixed tick delta
#[derive(Debug, Clone)]
pub struct LocomotionController {
    config: MovementConfig,
    dt: f32,
    restore_delay_ticks: u64,
}

impl LocomotionController {
    pub fn new(config: MovementConfig, tick_rate: u32) -> Self {
        let restore_delay_ticks = seconds_to_ticks(config.punch_restore_delay, tick_rate);
        Self {
            config,
            dt: 1.0 / tick_rate.max(1) as f32,
            restore_delay_ticks,
        }
    }

    #[inline]
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    #[inline]
    pub fn neutral(&self) -> &JointTargets {
        &self.config.neutral_pose
    }

    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    #[inline]
    pub fn restore_delay_ticks(&self) -> u64 {
        self.restore_delay_ticks
    }

    /// Standing state for a freshly spawned actor
    pub fn spawn_state(&self) -> LocomotionState {
        LocomotionState::standing(self.config.neutral_pose)
    }

    /// Advance `state` by one tick and produce the actuator frame
    pub fn step(
        &self,
        state: &mut LocomotionState,
        body: &BodySnapshot,
        input: &InputCommand,
    ) -> ActuatorFrame {
        let config = &self.config;
        let mut ctx = TickContext::new(body);
        state.steps += 1;

        balance::ground_check(self, state, body);

        if config.use_step_prediction {
            if state.is_balanced() {
                gait::predict(state, body);
            }
        } else {
            gait::reset_cycle(state);
        }

        if config.use_controls && !state.is_airborne() {
            gait::movement(self, state, body, input, &mut ctx);
        }

        if !state.is_airborne() {
            gait::step_cycle(self, state, body, &mut ctx);
        }

        if config.use_controls {
            limbs::reach(self, state, input);
            if config.can_punch && !state.is_airborne() {
                limbs::punch(self, state, body, input, &mut ctx);
            }
        }
        limbs::run_scheduled(self, state);

        if config.use_controls {
            airborne::jump(self, state, body, input, &mut ctx);
            turning::turn(self, state, input);
            self.apply_pending_reset(state);
        }

        state.center_of_mass = Some(body.center_of_mass());

        trace!(
            step = state.steps,
            tick = input.tick,
            balance = ?state.balance,
            gait = ?state.gait,
            stance = ?state.stance,
            "Locomotion step"
        );

        ActuatorFrame {
            targets: state.targets.0,
            stiffness: state.drives.0.map(|profile| profile.stiffness(config)),
            root_velocity: ctx.velocity_command,
            impulses: ctx.impulses,
        }
    }

    /// Run one full tick against a physics body and sample the resulting root state
    pub fn tick<B: PhysicsBody + ?Sized>(
        &self,
        state: &mut LocomotionState,
        body: &mut B,
        input: &InputCommand,
    ) -> BodyState {
        let snapshot = body.snapshot(self.config.balance_height);
        let frame = self.step(state, &snapshot, input);
        body.apply(&frame);
        body.simulate(self.dt);
        if body.take_landed() {
            self.landed(state);
        }
        body.snapshot(self.config.balance_height).body_state(input.tick)
    }

    /// Landing signal from the physics collaborator. Returns true if it ended an airborne phase.
    pub fn landed(&self, state: &mut LocomotionState) -> bool {
        airborne::landed(state)
    }

    /// Report a collision impulse. Returns true if it knocked the actor out.
    pub fn register_impact(&self, state: &mut LocomotionState, magnitude: f32) -> bool {
        if !self.config.can_be_knocked_out
            || !state.is_balanced()
            || magnitude <= self.config.knockout_force
        {
            return false;
        }
        info!(magnitude, "Knocked out by impact");
        balance::enter_ragdoll(state);
        true
    }

    fn apply_pending_reset(&self, state: &mut LocomotionState) {
        if !state.pending_reset || state.is_jumping() {
            return;
        }
        for segment in [
            Segment::Body,
            Segment::UpperRightArm,
            Segment::LowerRightArm,
            Segment::UpperLeftArm,
            Segment::LowerLeftArm,
        ] {
            state.targets.set(segment, self.config.neutral_pose.get(segment));
        }
        state.arm_aim = 0.0;
        state.pending_reset = false;
    }
}
