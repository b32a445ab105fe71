//! Grounding and ragdoll transitions

use tracing::debug;

use super::pose::DriveProfile;
use super::state::{BalanceState, LocomotionState, Vertical};
use super::LocomotionController;
use crate::game::body::{BodySnapshot, Segment, Side};

/// Edge-triggered: only a change in ground contact flips the balance state.
/// Suppressed entirely while jumping or airborne.
pub(super) fn ground_check(
    controller: &LocomotionController,
    state: &mut LocomotionState,
    body: &BodySnapshot,
) {
    if state.vertical != Vertical::Grounded {
        return;
    }

    let config = controller.config();
    match (body.is_grounded(), state.balance) {
        (true, BalanceState::Ragdoll) => {
            let reaching = Side::BOTH.iter().any(|&side| state.arm(side).holds_reach());
            let settled = body.root().velocity.length() < config.settle_velocity;
            if config.auto_get_up && settled && !reaching {
                leave_ragdoll(state);
            }
        }
        (false, BalanceState::Balanced) => enter_ragdoll(state),
        _ => {}
    }
}

/// Relax everything except reaching arms and the torso
pub(super) fn enter_ragdoll(state: &mut LocomotionState) {
    state.balance = BalanceState::Ragdoll;
    state.drives.set(Segment::Root, DriveProfile::Off);
    state.drives.set(Segment::Head, DriveProfile::Off);
    for side in Side::BOTH {
        if !state.arm(side).holds_reach() {
            state.drives.set_arm(side, DriveProfile::Off);
        }
    }
    state.drives.set_lower_body(DriveProfile::Off);
    debug!("Ragdoll on");
}

pub(super) fn leave_ragdoll(state: &mut LocomotionState) {
    state.balance = BalanceState::Balanced;
    state.drives.set(Segment::Root, DriveProfile::Balance);
    state.drives.set(Segment::Head, DriveProfile::Pose);
    for side in Side::BOTH {
        if !state.arm(side).holds_reach() {
            state.drives.set_arm(side, DriveProfile::Pose);
        }
    }
    state.drives.set_lower_body(DriveProfile::Pose);
    state.pending_reset = true;
    debug!("Ragdoll off");
}
