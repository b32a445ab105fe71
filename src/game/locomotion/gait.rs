//! Gait prediction, planar movement and the alternating step cycle

use glam::Vec3;

use super::pose::DriveProfile;
use super::state::{Gait, LocomotionState, Stance};
use super::{LocomotionController, TickContext};
use crate::game::body::{BodyPart, BodySnapshot, Side};
use crate::game::constants::gait::{
    BACKWARD_COUNTER, BACKWARD_LOWER, BACKWARD_UPPER, FORWARD_COUNTER, FORWARD_LOWER,
    FORWARD_UPPER, LEFT_RELAX, RIGHT_RELAX,
};
use crate::net::protocol::InputCommand;
use crate::util::quat::nlerp;

/// Ground-plane heading of the root, +Z if degenerate
fn heading(body: &BodySnapshot) -> Vec3 {
    let forward = body.forward();
    Vec3::new(forward.x, 0.0, forward.z)
        .try_normalize()
        .unwrap_or(Vec3::Z)
}

/// Position of each foot along the heading
fn feet_along(body: &BodySnapshot, axis: Vec3) -> (f32, f32) {
    (
        axis.dot(body.segment(Side::Right.foot()).position),
        axis.dot(body.segment(Side::Left.foot()).position),
    )
}

/// Forget the step cycle once the body stops walking
pub(super) fn reset_cycle(state: &mut LocomotionState) {
    if state.gait == Gait::Idle {
        state.stance = Stance::Planted;
        state.cycle_started = false;
    }
}

/// Walk toward wherever the center of mass has moved past both feet
pub(super) fn predict(state: &mut LocomotionState, body: &BodySnapshot) {
    reset_cycle(state);

    let Some(center) = state.center_of_mass else {
        return;
    };
    let axis = heading(body);
    let com = axis.dot(center);
    let (right, left) = feet_along(body, axis);

    if com < right && com < left {
        state.gait = Gait::WalkBackward;
    } else if !state.move_held && state.gait == Gait::WalkBackward {
        state.gait = Gait::Idle;
    }

    if com > right && com > left {
        state.gait = Gait::WalkForward;
    } else if !state.move_held && state.gait == Gait::WalkForward {
        state.gait = Gait::Idle;
    }
}

pub(super) fn movement(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
    input: &InputCommand,
    ctx: &mut TickContext,
) {
    if controller.config().forward_is_camera_direction {
        camera_relative(controller, state, body, input, ctx);
    } else {
        body_relative(controller, state, body, input, ctx);
    }
}

/// Blend toward the input direction in root space, keeping vertical velocity
fn camera_relative(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
    input: &InputCommand,
    ctx: &mut TickContext,
) {
    let config = controller.config();
    let mut direction =
        body.root().rotation * Vec3::new(input.move_axis.x, 0.0, input.move_axis.y);
    direction.y = 0.0;

    let velocity = ctx.velocity();
    let target = direction * config.move_speed + Vec3::new(0.0, velocity.y, 0.0);
    ctx.set_velocity(velocity.lerp(target, config.velocity_blend));

    if input.has_move() {
        if state.is_balanced() && !state.move_held {
            state.move_held = true;
            state.gait = Gait::WalkForward;
        }
    } else if state.move_held {
        state.move_held = false;
        if state.gait == Gait::WalkForward {
            state.gait = Gait::Idle;
        }
    }
}

/// Forward axis drives speed along the body; legs stiffen while ragdolled
fn body_relative(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
    input: &InputCommand,
    ctx: &mut TickContext,
) {
    let config = controller.config();
    let forward = input.move_axis.y;

    if forward != 0.0 {
        let vertical = ctx.velocity().y;
        let mut velocity = body.forward() * (forward * config.move_speed);
        velocity.y = vertical;
        ctx.set_velocity(velocity);

        if !state.move_held {
            state.move_held = true;
            state.gait = if forward > 0.0 {
                Gait::WalkForward
            } else {
                Gait::WalkBackward
            };
            if state.is_ragdoll() {
                state.drives.set_lower_body(DriveProfile::Pose);
            }
        }
    } else if state.move_held {
        state.move_held = false;
        state.gait = Gait::Idle;
        if state.is_ragdoll() {
            state.drives.set_lower_body(DriveProfile::Off);
        }
    }
}

/// Pick the first leg, then swing whichever leg holds the step
pub(super) fn step_cycle(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
    ctx: &mut TickContext,
) {
    if !state.cycle_started && state.stance == Stance::Planted {
        let (right, left) = feet_along(body, heading(body));
        // the trailing foot leads off; ties go to the right
        let first = match state.gait {
            Gait::WalkForward => Some(if right <= left { Side::Right } else { Side::Left }),
            Gait::WalkBackward => Some(if right >= left { Side::Right } else { Side::Left }),
            Gait::Idle => None,
        };
        if let Some(side) = first {
            state.stance = start_step(side);
            state.cycle_started = true;
        }
    }

    leg_phase(controller, state, ctx, Side::Right);
    leg_phase(controller, state, ctx, Side::Left);
}

fn start_step(side: Side) -> Stance {
    match side {
        Side::Right => Stance::StepRight { elapsed: 0.0 },
        Side::Left => Stance::StepLeft { elapsed: 0.0 },
    }
}

fn leg_phase(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    ctx: &mut TickContext,
    side: Side,
) {
    let config = controller.config();
    let dt = controller.dt();
    let mount = Vec3::NEG_Y * config.feet_mount_force * dt;

    let elapsed = match (state.stance, side) {
        (Stance::StepRight { elapsed }, Side::Right) | (Stance::StepLeft { elapsed }, Side::Left) => {
            elapsed + dt
        }
        _ => {
            relax_leg(controller, state, side);
            for foot in Side::BOTH {
                ctx.push_impulse(BodyPart::Segment(foot.foot()), mount);
            }
            return;
        }
    };

    ctx.push_impulse(BodyPart::Segment(side.foot()), mount);
    swing_leg(state, side, config.step_height);

    state.stance = if elapsed > config.step_duration {
        if state.is_walking() {
            start_step(side.other())
        } else {
            Stance::Planted
        }
    } else {
        match side {
            Side::Right => Stance::StepRight { elapsed },
            Side::Left => Stance::StepLeft { elapsed },
        }
    };
}

/// Open-loop swing offsets for the stepping leg and counter-swing on the other
fn swing_leg(state: &mut LocomotionState, side: Side, height: f32) {
    let other = side.other();
    match state.gait {
        Gait::WalkForward => {
            state.targets.offset_x(side.upper_leg(), FORWARD_UPPER * height);
            state.targets.offset_x(side.lower_leg(), -FORWARD_LOWER * height * 2.0);
            state.targets.offset_x(other.upper_leg(), -FORWARD_COUNTER * height / 2.0);
        }
        Gait::WalkBackward => {
            state.targets.offset_x(side.upper_leg(), -BACKWARD_UPPER * height);
            state.targets.offset_x(side.lower_leg(), -BACKWARD_LOWER * height * 2.0);
            state.targets.offset_x(other.upper_leg(), BACKWARD_COUNTER * height / 2.0);
        }
        Gait::Idle => {}
    }
}

fn relax_leg(controller: &LocomotionController, state: &mut LocomotionState, side: Side) {
    let (upper_rate, lower_rate) = match side {
        Side::Right => RIGHT_RELAX,
        Side::Left => LEFT_RELAX,
    };
    let dt = controller.dt();
    let neutral = controller.neutral();

    for (segment, rate) in [(side.upper_leg(), upper_rate), (side.lower_leg(), lower_rate)] {
        let current = state.targets.get(segment);
        state
            .targets
            .set(segment, nlerp(current, neutral.get(segment), rate * dt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;
    use crate::game::body::Segment;
    use crate::game::locomotion::test_support::standing_body;
    use glam::Vec2;

    fn controller() -> LocomotionController {
        LocomotionController::new(MovementConfig::default(), 60)
    }

    fn forward_input() -> InputCommand {
        InputCommand {
            move_axis: Vec2::new(0.0, 1.0),
            ..InputCommand::new(1)
        }
    }

    #[test]
    fn test_camera_move_edges_trigger_once() {
        let controller = controller();
        let mut state = controller.spawn_state();
        let body = standing_body();
        let mut ctx = TickContext::new(&body);

        let idle = InputCommand::new(1);
        movement(&controller, &mut state, &body, &idle, &mut ctx);
        assert_eq!(state.gait, Gait::Idle);

        movement(&controller, &mut state, &body, &forward_input(), &mut ctx);
        assert_eq!(state.gait, Gait::WalkForward);
        assert!(state.move_held());

        // held: a cleared gait is not re-triggered
        state.gait = Gait::Idle;
        movement(&controller, &mut state, &body, &forward_input(), &mut ctx);
        assert_eq!(state.gait, Gait::Idle);

        state.gait = Gait::WalkForward;
        movement(&controller, &mut state, &body, &idle, &mut ctx);
        assert_eq!(state.gait, Gait::Idle);
        assert!(!state.move_held());
    }

    #[test]
    fn test_camera_velocity_blend() {
        let controller = controller();
        let mut state = controller.spawn_state();
        let mut body = standing_body();
        body.segment_mut(Segment::Root).velocity = Vec3::new(0.0, -2.0, 0.0);
        let mut ctx = TickContext::new(&body);

        movement(&controller, &mut state, &body, &forward_input(), &mut ctx);

        let velocity = ctx.velocity();
        assert!((velocity.z - 8.0).abs() < 1e-5);
        assert!((velocity.y + 2.0).abs() < 1e-5);
        assert!(velocity.x.abs() < 1e-6);
    }

    #[test]
    fn test_camera_move_ignored_while_ragdolled() {
        let controller = controller();
        let mut state = controller.spawn_state();
        state.balance = crate::game::locomotion::state::BalanceState::Ragdoll;
        let body = standing_body();
        let mut ctx = TickContext::new(&body);

        movement(&controller, &mut state, &body, &forward_input(), &mut ctx);
        assert_eq!(state.gait, Gait::Idle);
        assert!(!state.move_held());
    }

    #[test]
    fn test_body_relative_directions() {
        let config = MovementConfig {
            forward_is_camera_direction: false,
            ..MovementConfig::default()
        };
        let controller = LocomotionController::new(config, 60);
        let mut state = controller.spawn_state();
        let body = standing_body();
        let mut ctx = TickContext::new(&body);

        let back = InputCommand {
            move_axis: Vec2::new(0.0, -0.5),
            ..InputCommand::new(1)
        };
        movement(&controller, &mut state, &body, &back, &mut ctx);
        assert_eq!(state.gait, Gait::WalkBackward);
        assert!((ctx.velocity().z + 5.0).abs() < 1e-5);

        movement(&controller, &mut state, &body, &InputCommand::new(2), &mut ctx);
        assert_eq!(state.gait, Gait::Idle);
    }

    #[test]
    fn test_body_relative_stiffens_legs_when_ragdolled() {
        let config = MovementConfig {
            forward_is_camera_direction: false,
            ..MovementConfig::default()
        };
        let controller = LocomotionController::new(config, 60);
        let mut state = controller.spawn_state();
        super::super::balance::enter_ragdoll(&mut state);
        let body = standing_body();
        let mut ctx = TickContext::new(&body);

        movement(&controller, &mut state, &body, &forward_input(), &mut ctx);
        assert_eq!(state.drives.get(Segment::UpperLeftLeg), DriveProfile::Pose);

        movement(&controller, &mut state, &body, &InputCommand::new(2), &mut ctx);
        assert_eq!(state.drives.get(Segment::UpperLeftLeg), DriveProfile::Off);
    }

    #[test]
    fn test_prediction_follows_center_of_mass() {
        let mut state = LocomotionState::default();
        let body = standing_body();

        state.center_of_mass = Some(Vec3::new(0.0, 1.0, 0.5));
        predict(&mut state, &body);
        assert_eq!(state.gait, Gait::WalkForward);

        state.center_of_mass = Some(Vec3::new(0.0, 1.0, -0.5));
        predict(&mut state, &body);
        assert_eq!(state.gait, Gait::WalkBackward);

        state.center_of_mass = Some(Vec3::new(0.0, 1.0, 0.0));
        predict(&mut state, &body);
        assert_eq!(state.gait, Gait::Idle);
    }

    #[test]
    fn test_prediction_waits_for_first_sample() {
        let mut state = LocomotionState::default();
        predict(&mut state, &standing_body());
        assert_eq!(state.gait, Gait::Idle);
    }

    #[test]
    fn test_step_cycle_alternates_exclusively() {
        let controller = controller();
        let mut state = controller.spawn_state();
        state.gait = Gait::WalkForward;
        let body = standing_body();

        let mut saw_right = false;
        let mut saw_left = false;
        for _ in 0..120 {
            let mut ctx = TickContext::new(&body);
            step_cycle(&controller, &mut state, &body, &mut ctx);
            match state.stance {
                Stance::StepRight { elapsed } | Stance::StepLeft { elapsed } => {
                    assert!(elapsed <= controller.config().step_duration + controller.dt());
                }
                Stance::Planted => panic!("walking body planted both feet"),
            }
            saw_right |= state.stance.stepping() == Some(Side::Right);
            saw_left |= state.stance.stepping() == Some(Side::Left);
        }
        assert!(saw_right && saw_left);
    }

    #[test]
    fn test_trailing_foot_steps_first() {
        let controller = controller();
        let mut state = controller.spawn_state();
        state.gait = Gait::WalkForward;
        let mut body = standing_body();
        body.segment_mut(Segment::LeftFoot).position.z = -0.3;

        let mut ctx = TickContext::new(&body);
        step_cycle(&controller, &mut state, &body, &mut ctx);
        assert_eq!(state.stance.stepping(), Some(Side::Left));
        assert!(state.cycle_started);
    }

    #[test]
    fn test_step_expires_to_planted_when_stopped() {
        let controller = controller();
        let mut state = controller.spawn_state();
        state.stance = Stance::StepRight { elapsed: 0.195 };
        let body = standing_body();

        let mut ctx = TickContext::new(&body);
        step_cycle(&controller, &mut state, &body, &mut ctx);
        assert_eq!(state.stance, Stance::Planted);
    }

    #[test]
    fn test_forward_swing_offsets() {
        let controller = controller();
        let mut state = controller.spawn_state();
        state.gait = Gait::WalkForward;
        state.cycle_started = true;
        state.stance = Stance::StepRight { elapsed: 0.0 };
        let body = standing_body();

        let mut ctx = TickContext::new(&body);
        step_cycle(&controller, &mut state, &body, &mut ctx);

        let height = controller.config().step_height;
        let upper = state.targets.get(Segment::UpperRightLeg);
        let lower = state.targets.get(Segment::LowerRightLeg);
        assert!((upper.x - 0.09 * height).abs() < 1e-6);
        assert!((lower.x + 0.09 * height * 2.0).abs() < 1e-6);

        // stepping foot pressed down once, planted side gets the idle pair
        let mount = controller.config().feet_mount_force * controller.dt();
        let right = ctx
            .impulses
            .iter()
            .filter(|i| i.part == BodyPart::Segment(Segment::RightFoot))
            .count();
        assert_eq!(right, 2);
        assert!(ctx.impulses.iter().all(|i| (i.impulse.y + mount).abs() < 1e-6));
    }

    #[test]
    fn test_idle_leg_relaxes_toward_neutral() {
        let controller = controller();
        let mut state = controller.spawn_state();
        state
            .targets
            .set(Segment::UpperLeftLeg, glam::Quat::from_rotation_x(1.0));
        let before = crate::util::quat::angle_between(
            state.targets.get(Segment::UpperLeftLeg),
            glam::Quat::IDENTITY,
        );

        relax_leg(&controller, &mut state, Side::Left);
        let after = crate::util::quat::angle_between(
            state.targets.get(Segment::UpperLeftLeg),
            glam::Quat::IDENTITY,
        );
        assert!(after < before);
    }

    #[test]
    fn test_idle_leg_settles_on_configured_neutral() {
        use crate::game::locomotion::test_support::{bent_controller, bent_neutral};

        let controller = bent_controller();
        let neutral = bent_neutral();
        let mut state = controller.spawn_state();
        state
            .targets
            .set(Segment::UpperRightLeg, glam::Quat::from_rotation_x(-1.0));
        state
            .targets
            .set(Segment::LowerRightLeg, glam::Quat::from_rotation_x(0.8));

        for _ in 0..300 {
            relax_leg(&controller, &mut state, Side::Right);
        }
        for segment in [Segment::UpperRightLeg, Segment::LowerRightLeg] {
            assert!(crate::util::quat::approx_eq(
                state.targets.get(segment),
                neutral.get(segment),
                1e-4
            ));
        }
    }
}
