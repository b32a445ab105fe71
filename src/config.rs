use serde::{Deserialize, Serialize};

use crate::game::constants::{
    balance, gait, history, impact, jump, movement, punch, reach, reconcile, tick,
};
use crate::game::locomotion::JointTargets;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("{0} must be finite and non-negative, got {1}")]
    InvalidValue(&'static str, f32),
    #[error("history capacity {0} is too small (minimum 2)")]
    HistoryTooSmall(usize),
    #[error("neutral pose contains non-finite joint targets")]
    NonFinitePose,
    #[error("failed to read movement config {path}: {reason}")]
    MovementFile { path: String, reason: String },
}

/// What the owner does when predicted and authoritative states disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconcilePolicy {
    /// Record drift, never correct it
    #[default]
    ObserveOnly,
    /// Rewind to the authoritative state and replay buffered inputs
    Resimulate,
}

impl std::str::FromStr for ReconcilePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "observe" | "observe_only" | "observeonly" => Ok(Self::ObserveOnly),
            "resimulate" | "resim" => Ok(Self::Resimulate),
            _ => Err(()),
        }
    }
}

/// Simulation / netcode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed tick rate in Hz
    pub tick_rate: u32,
    /// Ring history capacity in ticks
    pub history_capacity: usize,
    /// Clamp on ticks processed per frame after a stall (None = unbounded catch-up)
    pub max_catch_up_ticks: Option<u32>,
    /// Position error tolerated before drift counts as a mismatch
    pub drift_tolerance: f32,
    /// Owner drift handling
    pub reconcile_policy: ReconcilePolicy,
    /// Authority clamps non-finite and out-of-range command fields on receipt.
    /// Owners always sanitize before predicting.
    pub sanitize_inputs: bool,
    /// Loopback latency in ticks (demo and tests only)
    pub loopback_latency_ticks: u32,
    /// Loopback reordering: swap each pair of in-flight client messages
    pub loopback_reorder: bool,
    /// Locomotion tunables
    pub movement: MovementConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: tick::RATE,
            history_capacity: history::CAPACITY,
            max_catch_up_ticks: Some(tick::MAX_CATCH_UP),
            drift_tolerance: reconcile::DRIFT_TOLERANCE,
            reconcile_policy: ReconcilePolicy::ObserveOnly,
            sanitize_inputs: true,
            loopback_latency_ticks: 0,
            loopback_reorder: false,
            movement: MovementConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if parsed > 0 && parsed <= 1000 => config.tick_rate = parsed,
                _ => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Ok(capacity) = std::env::var("HISTORY_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(parsed) if parsed >= 2 => config.history_capacity = parsed,
                _ => tracing::warn!("Invalid HISTORY_CAPACITY '{}', using default", capacity),
            }
        }

        if let Ok(max) = std::env::var("MAX_CATCH_UP_TICKS") {
            match max.parse::<u32>() {
                Ok(0) => config.max_catch_up_ticks = None,
                Ok(parsed) => config.max_catch_up_ticks = Some(parsed),
                Err(_) => tracing::warn!("Invalid MAX_CATCH_UP_TICKS '{}', using default", max),
            }
        }

        if let Ok(tolerance) = std::env::var("DRIFT_TOLERANCE") {
            match tolerance.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => {
                    config.drift_tolerance = parsed
                }
                _ => tracing::warn!("Invalid DRIFT_TOLERANCE '{}', using default", tolerance),
            }
        }

        if let Ok(policy) = std::env::var("RECONCILE_POLICY") {
            match policy.parse() {
                Ok(parsed) => config.reconcile_policy = parsed,
                Err(()) => tracing::warn!("Invalid RECONCILE_POLICY '{}', using default", policy),
            }
        }

        if let Ok(sanitize) = std::env::var("SANITIZE_INPUTS") {
            match sanitize.parse::<bool>() {
                Ok(parsed) => config.sanitize_inputs = parsed,
                Err(_) => tracing::warn!("Invalid SANITIZE_INPUTS '{}', using default", sanitize),
            }
        }

        if let Ok(latency) = std::env::var("LOOPBACK_LATENCY_TICKS") {
            match latency.parse::<u32>() {
                Ok(parsed) => config.loopback_latency_ticks = parsed,
                Err(_) => tracing::warn!("Invalid LOOPBACK_LATENCY_TICKS '{}', using default", latency),
            }
        }

        if let Ok(reorder) = std::env::var("LOOPBACK_REORDER") {
            match reorder.parse::<bool>() {
                Ok(parsed) => config.loopback_reorder = parsed,
                Err(_) => tracing::warn!("Invalid LOOPBACK_REORDER '{}', using default", reorder),
            }
        }

        if let Ok(path) = std::env::var("MOVEMENT_CONFIG") {
            match MovementConfig::from_file(&path) {
                Ok(movement) => config.movement = movement,
                Err(e) => tracing::warn!("{}, using default movement config", e),
            }
        }

        config
    }

    /// Fixed delta time in seconds
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::NotPositive("tick_rate"));
        }
        if self.history_capacity < 2 {
            return Err(ConfigError::HistoryTooSmall(self.history_capacity));
        }
        non_negative("drift_tolerance", self.drift_tolerance)?;
        self.movement.validate()
    }
}

/// Locomotion tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Input-driven behaviours enabled at all
    pub use_controls: bool,
    /// Move/turn relative to the camera instead of the body
    pub forward_is_camera_direction: bool,
    pub move_speed: f32,
    pub turn_speed: f32,
    /// Blend factor from current toward target planar velocity per tick
    pub velocity_blend: f32,
    /// Body-relative yaw blend rate (per second)
    pub yaw_blend_rate: f32,
    pub yaw_wrap_limit: f32,

    pub jump_force: f32,
    pub jump_duration: f32,

    /// Get back up automatically once grounded and settled
    pub auto_get_up: bool,
    /// Infer gait from the centre of mass while balanced
    pub use_step_prediction: bool,
    pub balance_height: f32,
    pub balance_strength: f32,
    pub core_strength: f32,
    pub limb_strength: f32,
    pub drive_off_strength: f32,
    pub settle_velocity: f32,

    pub step_duration: f32,
    pub step_height: f32,
    pub feet_mount_force: f32,

    pub reach_sensitivity: f32,
    pub arm_reach_stiffness: f32,
    pub arm_aim_limit: f32,
    pub body_bend_limit: f32,

    pub can_punch: bool,
    pub punch_force: f32,
    pub punch_restore_delay: f32,

    pub can_be_knocked_out: bool,
    pub knockout_force: f32,

    /// Rest pose captured at spawn; reset, restore and leg relax return here
    pub neutral_pose: JointTargets,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            use_controls: true,
            forward_is_camera_direction: true,
            move_speed: movement::SPEED,
            turn_speed: movement::TURN_SPEED,
            velocity_blend: movement::VELOCITY_BLEND,
            yaw_blend_rate: movement::YAW_BLEND_RATE,
            yaw_wrap_limit: movement::YAW_WRAP_LIMIT,
            jump_force: jump::FORCE,
            jump_duration: jump::DURATION,
            auto_get_up: true,
            use_step_prediction: true,
            balance_height: balance::HEIGHT,
            balance_strength: balance::STRENGTH,
            core_strength: balance::CORE_STRENGTH,
            limb_strength: balance::LIMB_STRENGTH,
            drive_off_strength: balance::DRIVE_OFF,
            settle_velocity: balance::SETTLE_VELOCITY,
            step_duration: gait::STEP_DURATION,
            step_height: gait::STEP_HEIGHT,
            feet_mount_force: gait::FEET_MOUNT_FORCE,
            reach_sensitivity: reach::SENSITIVITY,
            arm_reach_stiffness: reach::ARM_STIFFNESS,
            arm_aim_limit: reach::ARM_AIM_LIMIT,
            body_bend_limit: reach::BODY_BEND_LIMIT,
            can_punch: true,
            punch_force: punch::FORCE,
            punch_restore_delay: punch::RESTORE_DELAY,
            can_be_knocked_out: true,
            knockout_force: impact::KNOCKOUT_FORCE,
            neutral_pose: JointTargets::default(),
        }
    }
}

impl MovementConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::MovementFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::MovementFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reach_sensitivity.is_finite() && self.reach_sensitivity > 0.0) {
            return Err(ConfigError::NotPositive("reach_sensitivity"));
        }
        if !self.neutral_pose.is_finite() {
            return Err(ConfigError::NonFinitePose);
        }
        let fields = [
            ("move_speed", self.move_speed),
            ("turn_speed", self.turn_speed),
            ("velocity_blend", self.velocity_blend),
            ("yaw_blend_rate", self.yaw_blend_rate),
            ("yaw_wrap_limit", self.yaw_wrap_limit),
            ("jump_force", self.jump_force),
            ("jump_duration", self.jump_duration),
            ("balance_height", self.balance_height),
            ("balance_strength", self.balance_strength),
            ("core_strength", self.core_strength),
            ("limb_strength", self.limb_strength),
            ("drive_off_strength", self.drive_off_strength),
            ("settle_velocity", self.settle_velocity),
            ("step_duration", self.step_duration),
            ("step_height", self.step_height),
            ("feet_mount_force", self.feet_mount_force),
            ("arm_reach_stiffness", self.arm_reach_stiffness),
            ("arm_aim_limit", self.arm_aim_limit),
            ("body_bend_limit", self.body_bend_limit),
            ("punch_force", self.punch_force),
            ("punch_restore_delay", self.punch_restore_delay),
            ("knockout_force", self.knockout_force),
        ];
        for (name, value) in fields {
            non_negative(name, value)?;
        }
        Ok(())
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(name, value))
    }
}
