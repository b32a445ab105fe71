//! Joint targets, drive profiles and the fixed poses used by reach/punch

use glam::Quat;
use serde::{Deserialize, Serialize};

use crate::config::MovementConfig;
use crate::game::body::{Segment, Side, SEGMENT_COUNT};
use crate::util::quat::raw;

/// Target orientation for every joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointTargets(pub [Quat; SEGMENT_COUNT]);

impl Default for JointTargets {
    fn default() -> Self {
        Self([Quat::IDENTITY; SEGMENT_COUNT])
    }
}

impl JointTargets {
    #[inline]
    pub fn get(&self, segment: Segment) -> Quat {
        self.0[segment.index()]
    }

    #[inline]
    pub fn set(&mut self, segment: Segment, target: Quat) {
        self.0[segment.index()] = target;
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|q| q.is_finite())
    }

    /// Add `delta` to the raw x component of a joint target
    pub fn offset_x(&mut self, segment: Segment, delta: f32) {
        let q = self.get(segment);
        self.set(segment, raw(q.x + delta, q.y, q.z, q.w));
    }
}

/// Drive stiffness profile of a joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveProfile {
    /// Root holding the body upright
    Balance,
    /// Limb holding its pose
    Pose,
    /// Torso stiffened while reaching
    Core,
    /// Arm stiffened while reaching
    Reach,
    /// Ragdoll
    Off,
}

impl DriveProfile {
    pub fn stiffness(self, config: &MovementConfig) -> f32 {
        match self {
            DriveProfile::Balance => config.balance_strength,
            DriveProfile::Pose => config.limb_strength,
            DriveProfile::Core => config.core_strength,
            DriveProfile::Reach => config.arm_reach_stiffness,
            DriveProfile::Off => config.drive_off_strength,
        }
    }
}

/// Per-joint drive profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveTable(pub [DriveProfile; SEGMENT_COUNT]);

impl DriveTable {
    /// Standing: root balancing, everything else posing
    pub fn standing() -> Self {
        let mut table = Self([DriveProfile::Pose; SEGMENT_COUNT]);
        table.set(Segment::Root, DriveProfile::Balance);
        table
    }

    #[inline]
    pub fn get(&self, segment: Segment) -> DriveProfile {
        self.0[segment.index()]
    }

    #[inline]
    pub fn set(&mut self, segment: Segment, profile: DriveProfile) {
        self.0[segment.index()] = profile;
    }

    pub fn set_arm(&mut self, side: Side, profile: DriveProfile) {
        self.set(side.upper_arm(), profile);
        self.set(side.lower_arm(), profile);
    }

    pub fn set_lower_body(&mut self, profile: DriveProfile) {
        for segment in Segment::LOWER_BODY {
            self.set(segment, profile);
        }
    }
}

/// Arm poses for one punch phase
#[derive(Debug, Clone, Copy)]
pub struct PunchPose {
    pub body: Quat,
    pub upper_arm: Quat,
    pub lower_arm: Quat,
}

/// Pulled-back pose on punch press
pub fn punch_wind_up(side: Side) -> PunchPose {
    match side {
        Side::Right => PunchPose {
            body: raw(-0.15, -0.15, 0.0, 1.0),
            upper_arm: raw(-0.62, -0.51, 0.02, 1.0),
            lower_arm: raw(1.31, 0.5, -0.5, 1.0),
        },
        Side::Left => PunchPose {
            body: raw(-0.15, 0.15, 0.0, 1.0),
            upper_arm: raw(0.62, -0.51, 0.02, 1.0),
            lower_arm: raw(-1.31, 0.5, 0.5, 1.0),
        },
    }
}

/// Extended pose on punch release
pub fn punch_release(side: Side) -> PunchPose {
    match side {
        Side::Right => PunchPose {
            body: raw(-0.15, 0.15, 0.0, 1.0),
            upper_arm: raw(0.74, 0.04, 0.0, 1.0),
            lower_arm: raw(0.2, 0.0, 0.0, 1.0),
        },
        Side::Left => PunchPose {
            body: raw(-0.15, -0.15, 0.0, 1.0),
            upper_arm: raw(-0.74, 0.04, 0.0, 1.0),
            lower_arm: raw(-0.2, 0.0, 0.0, 1.0),
        },
    }
}

/// Upper-arm target while reaching with aim accumulator `aim`
pub fn reach_upper_arm(side: Side, aim: f32) -> Quat {
    match side {
        Side::Left => raw(-0.58 - aim, -0.88 - aim, -0.8, 1.0),
        Side::Right => raw(0.58 + aim, -0.88 - aim, 0.8, 1.0),
    }
}

/// Torso target for body bend `bend`
pub fn body_bend(bend: f32) -> Quat {
    raw(bend, 0.0, 0.0, 1.0)
}
