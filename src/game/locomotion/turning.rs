//! Root heading target

use super::state::LocomotionState;
use super::LocomotionController;
use crate::game::body::Segment;
use crate::net::protocol::InputCommand;
use crate::util::quat::{look_rotation_flat, nlerp, raw, slerp};

pub(super) fn turn(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    input: &InputCommand,
) {
    let config = controller.config();
    let dt = controller.dt();
    let current = state.targets.get(Segment::Root);

    if config.forward_is_camera_direction {
        // joint targets are expressed in the joint's inverted frame
        let goal = look_rotation_flat(input.cam_forward).inverse();
        state
            .targets
            .set(Segment::Root, slerp(current, goal, dt * config.turn_speed));
        return;
    }

    let mut target = current;
    if input.move_axis.x != 0.0 {
        let goal = raw(
            current.x,
            current.y - input.move_axis.x * config.turn_speed,
            current.z,
            current.w,
        );
        target = nlerp(current, goal, config.yaw_blend_rate * dt);
    }

    let limit = config.yaw_wrap_limit;
    if target.y < -limit {
        target = raw(target.x, limit, target.z, target.w);
    } else if target.y > limit {
        target = raw(target.x, -limit, target.z, target.w);
    }
    state.targets.set(Segment::Root, target);
}
