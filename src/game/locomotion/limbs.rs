//! Arm channels: reach with aim, punch wind-up/release, delayed restore

use tracing::trace;

use super::pose::{self, DriveProfile};
use super::schedule::ScheduledEvent;
use super::state::{ArmState, LocomotionState};
use super::{LocomotionController, TickContext};
use crate::game::body::{BodyPart, BodySnapshot, Segment, Side};
use crate::net::protocol::InputCommand;

fn reach_axis(input: &InputCommand, side: Side) -> f32 {
    match side {
        Side::Left => input.reach_left,
        Side::Right => input.reach_right,
    }
}

fn punch_pressed(input: &InputCommand, side: Side) -> bool {
    match side {
        Side::Left => input.punch_left,
        Side::Right => input.punch_right,
    }
}

/// Body bend, then both reach channels. A punching arm skips reach handling.
pub(super) fn reach(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    input: &InputCommand,
) {
    let config = controller.config();
    let delta = input.mouse_y / config.reach_sensitivity;

    state.body_bend =
        (state.body_bend + delta).clamp(-config.body_bend_limit, config.body_bend_limit);
    state.targets.set(Segment::Body, pose::body_bend(state.body_bend));

    let mut aiming = false;
    for side in Side::BOTH {
        let arm = state.arm(side);
        if arm.is_punching() {
            continue;
        }

        if reach_axis(input, side) != 0.0 {
            if arm == ArmState::Neutral {
                state.drives.set_arm(side, DriveProfile::Reach);
                state.drives.set(Segment::Body, DriveProfile::Core);
                *state.arm_mut(side) = ArmState::Reaching;
                trace!(?side, "Reach start");
            }
            aiming = true;
        } else if arm == ArmState::Reaching {
            release_reach(state, side);
        }
    }

    if !aiming {
        return;
    }

    state.arm_aim = (state.arm_aim + delta).clamp(-config.arm_aim_limit, config.arm_aim_limit);
    for side in Side::BOTH {
        if state.is_reaching(side) {
            state
                .targets
                .set(side.upper_arm(), pose::reach_upper_arm(side, state.arm_aim));
        }
    }
}

fn release_reach(state: &mut LocomotionState, side: Side) {
    if state.is_balanced() {
        state.drives.set_arm(side, DriveProfile::Pose);
        state.drives.set(Segment::Body, DriveProfile::Pose);
    } else {
        state.drives.set_arm(side, DriveProfile::Off);
    }
    *state.arm_mut(side) = ArmState::Neutral;
    state.pending_reset = true;
    trace!(?side, "Reach release");
}

/// Rising edge winds up, falling edge releases with an impulse along body forward
pub(super) fn punch(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
    input: &InputCommand,
    ctx: &mut TickContext,
) {
    let config = controller.config();

    for side in Side::BOTH {
        let pressed = punch_pressed(input, side);
        match state.arm(side) {
            ArmState::Punching { interrupted_reach } if !pressed => {
                *state.arm_mut(side) = if interrupted_reach {
                    ArmState::Reaching
                } else {
                    ArmState::Neutral
                };

                let release = pose::punch_release(side);
                state.targets.set(Segment::Body, release.body);
                state.targets.set(side.upper_arm(), release.upper_arm);
                state.targets.set(side.lower_arm(), release.lower_arm);

                let impulse = body.forward() * config.punch_force;
                ctx.push_impulse(BodyPart::Hand(side), impulse);
                ctx.push_impulse(BodyPart::Segment(Segment::Body), impulse);

                let due = state.steps + controller.restore_delay_ticks();
                state.events.schedule(due, ScheduledEvent::RestoreArm(side));
                trace!(?side, due, "Punch release");
            }
            arm if pressed && !arm.is_punching() => {
                *state.arm_mut(side) = ArmState::Punching {
                    interrupted_reach: arm == ArmState::Reaching,
                };

                let wind_up = pose::punch_wind_up(side);
                state.targets.set(Segment::Body, wind_up.body);
                state.targets.set(side.upper_arm(), wind_up.upper_arm);
                state.targets.set(side.lower_arm(), wind_up.lower_arm);
                trace!(?side, "Punch wind-up");
            }
            _ => {}
        }
    }
}

/// Fire events due at the controller's current step
pub(super) fn run_scheduled(controller: &LocomotionController, state: &mut LocomotionState) {
    for event in state.events.take_due(state.steps) {
        match event {
            ScheduledEvent::RestoreArm(side) => {
                // a new wind-up owns the arm now
                if state.is_punching(side) {
                    continue;
                }
                let neutral = controller.neutral();
                for segment in [side.upper_arm(), side.lower_arm()] {
                    state.targets.set(segment, neutral.get(segment));
                }
                trace!(?side, "Arm restored");
            }
        }
    }
}
