//! Jump launch, airborne phase and landing

use glam::Vec3;
use tracing::debug;

use super::balance;
use super::state::{LocomotionState, Vertical};
use super::{LocomotionController, TickContext};
use crate::game::body::BodySnapshot;
use crate::net::protocol::InputCommand;

pub(super) fn jump(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
    input: &InputCommand,
    ctx: &mut TickContext,
) {
    let config = controller.config();

    if input.jump > 0.0 {
        if !state.jump_held {
            if state.is_ragdoll() {
                // jump doubles as get-up
                balance::leave_ragdoll(state);
            } else if state.vertical == Vertical::Grounded {
                state.vertical = Vertical::Jumping { elapsed: 0.0 };
                debug!("Jump");
            }
        }
        state.jump_held = true;
    } else {
        state.jump_held = false;
    }

    if let Vertical::Jumping { elapsed } = state.vertical {
        let current = ctx.velocity();
        let launch = body.up() * config.jump_force;
        ctx.set_velocity(Vec3::new(current.x, launch.y, current.z));

        let elapsed = elapsed + controller.dt();
        state.vertical = if elapsed > config.jump_duration {
            Vertical::Airborne
        } else {
            Vertical::Jumping { elapsed }
        };
    }
}

pub(super) fn landed(state: &mut LocomotionState) -> bool {
    if state.vertical != Vertical::Airborne {
        return false;
    }
    state.vertical = Vertical::Grounded;
    state.pending_reset = true;
    debug!("Landed");
    true
}
