/// Tick/clock constants
pub mod tick {
    /// Default simulation tick rate in Hz
    pub const RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / RATE as f32;
    /// Maximum ticks processed in a single frame before the accumulator is clamped
    pub const MAX_CATCH_UP: u32 = 8;
}

/// History buffer constants
pub mod history {
    /// Default ring capacity (~17 seconds at 60 Hz, far above any sane RTT)
    pub const CAPACITY: usize = 1024;
}

/// Balance / grounding constants
pub mod balance {
    /// Ground check length along root-down
    pub const HEIGHT: f32 = 2.5;
    /// Root drive stiffness while balanced
    pub const STRENGTH: f32 = 5000.0;
    /// Torso drive stiffness while reaching
    pub const CORE_STRENGTH: f32 = 1500.0;
    /// Limb drive stiffness while posing
    pub const LIMB_STRENGTH: f32 = 500.0;
    /// Drive stiffness while ragdolled
    pub const DRIVE_OFF: f32 = 25.0;
    /// Root speed below which an unbalanced body may get back up
    pub const SETTLE_VELOCITY: f32 = 1.0;
}

/// Walking / step cycle constants
pub mod gait {
    /// Seconds a leg stays in swing before handing stance over
    pub const STEP_DURATION: f32 = 0.2;
    /// Swing amplitude multiplier
    pub const STEP_HEIGHT: f32 = 1.7;
    /// Downward force keeping planted feet on the ground
    pub const FEET_MOUNT_FORCE: f32 = 25.0;

    /// Per-tick upper-leg swing offset walking forward (scaled by step height)
    pub const FORWARD_UPPER: f32 = 0.09;
    /// Per-tick lower-leg swing offset walking forward (scaled by 2 * step height)
    pub const FORWARD_LOWER: f32 = 0.09;
    /// Per-tick counter-swing of the opposite upper leg walking forward (scaled by step height / 2)
    pub const FORWARD_COUNTER: f32 = 0.12;
    /// Per-tick upper-leg swing offset walking backward
    pub const BACKWARD_UPPER: f32 = 0.0;
    /// Per-tick lower-leg swing offset walking backward
    pub const BACKWARD_LOWER: f32 = 0.07;
    /// Per-tick counter-swing of the opposite upper leg walking backward
    pub const BACKWARD_COUNTER: f32 = 0.02;

    /// Idle relax rates (per second) for (upper, lower) right leg
    pub const RIGHT_RELAX: (f32, f32) = (8.0, 17.0);
    /// Idle relax rates (per second) for (upper, lower) left leg
    pub const LEFT_RELAX: (f32, f32) = (7.0, 18.0);
}

/// Movement / turning constants
pub mod movement {
    /// Planar target speed
    pub const SPEED: f32 = 10.0;
    /// Turn rate multiplier
    pub const TURN_SPEED: f32 = 6.0;
    /// Blend factor from current toward target velocity (per tick)
    pub const VELOCITY_BLEND: f32 = 0.8;
    /// Body-relative yaw blend rate (per second)
    pub const YAW_BLEND_RATE: f32 = 6.0;
    /// Raw yaw component wrap limit for body-relative turning
    pub const YAW_WRAP_LIMIT: f32 = 0.98;
}

/// Reach constants
pub mod reach {
    /// Divisor applied to the aim axis before accumulation
    pub const SENSITIVITY: f32 = 25.0;
    /// Arm drive stiffness while reaching
    pub const ARM_STIFFNESS: f32 = 2000.0;
    /// Arm aim accumulator limit
    pub const ARM_AIM_LIMIT: f32 = 1.2;
    /// Torso bend accumulator limit
    pub const BODY_BEND_LIMIT: f32 = 0.9;
}

/// Punch constants
pub mod punch {
    /// Impulse applied to hand and torso on release
    pub const FORCE: f32 = 15.0;
    /// Seconds after release before the arm returns to rest
    pub const RESTORE_DELAY: f32 = 0.3;
}

/// Jump constants
pub mod jump {
    /// Upward launch speed
    pub const FORCE: f32 = 18.0;
    /// Seconds the launch is held before the body counts as airborne
    pub const DURATION: f32 = 0.2;
}

/// Impact knockout constants
pub mod impact {
    /// Impact magnitude above which the body is knocked into ragdoll
    pub const KNOCKOUT_FORCE: f32 = 20.0;
}

/// Reference rig constants
pub mod rig {
    /// Downward acceleration
    pub const GRAVITY: f32 = 9.81;
    /// Root height above the ground plane when standing
    pub const STAND_HEIGHT: f32 = 1.0;
    /// Root height when collapsed
    pub const COLLAPSED_HEIGHT: f32 = 0.3;
    /// Hip-to-foot length used for the foot swing
    pub const LEG_LENGTH: f32 = 0.9;
    /// Root stiffness below which the rig collapses
    pub const COLLAPSE_STIFFNESS: f32 = 100.0;
    /// Per-segment mass
    pub const SEGMENT_MASS: f32 = 1.0;
}

/// Reconciliation constants
pub mod reconcile {
    /// Position error (world units) tolerated before a drift counts as a mismatch
    pub const DRIFT_TOLERANCE: f32 = 0.25;
}

/// Loopback transport constants
pub mod net {
    /// Capacity of each bounded message queue
    pub const QUEUE_CAPACITY: usize = 1024;
}

/// Convert a duration in seconds to a whole number of ticks (at least one)
pub fn seconds_to_ticks(seconds: f32, tick_rate: u32) -> u64 {
    let ticks = (seconds * tick_rate as f32).round();
    if ticks.is_finite() && ticks >= 1.0 {
        ticks as u64
    } else {
        1
    }
}
