//! Deterministic reference rig
//!
//! A rigid root integrated under gravity against the ground plane `y = 0`,
//! with every other segment placed at a rest offset. Legs swing from their
//! upper-leg targets so the step cycle moves the feet. Good enough to drive
//! the loops headless and in tests; a real engine implements [`PhysicsBody`]
//! itself.

use glam::{Quat, Vec3};

use crate::game::body::{
    ActuatorFrame, BodySnapshot, PhysicsBody, Segment, SegmentSample, Side, SEGMENT_COUNT,
};
use crate::game::constants::{balance, rig};
use crate::net::protocol::BodyState;
use crate::util::quat::{nlerp, normalize_or_identity};

/// Segment offsets from the root while standing, in root space
const REST_OFFSETS: [Vec3; SEGMENT_COUNT] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(0.0, 0.35, 0.0),
    Vec3::new(0.0, 0.75, 0.0),
    Vec3::new(0.3, 0.45, 0.0),
    Vec3::new(0.3, 0.15, 0.0),
    Vec3::new(-0.3, 0.45, 0.0),
    Vec3::new(-0.3, 0.15, 0.0),
    Vec3::new(0.15, -0.3, 0.0),
    Vec3::new(0.15, -0.65, 0.0),
    Vec3::new(-0.15, -0.3, 0.0),
    Vec3::new(-0.15, -0.65, 0.0),
    Vec3::new(0.15, -1.0, 0.0),
    Vec3::new(-0.15, -1.0, 0.0),
];

const GROUND_FRICTION: f32 = 2.0;
const TURN_RESPONSE: f32 = 10.0;
const AIR_MARGIN: f32 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleRig {
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    targets: [Quat; SEGMENT_COUNT],
    stiffness: [f32; SEGMENT_COUNT],
    airborne: bool,
    landed: bool,
}

impl SimpleRig {
    /// Standing rig with its feet on `ground`
    pub fn new(ground: Vec3) -> Self {
        let mut stiffness = [balance::LIMB_STRENGTH; SEGMENT_COUNT];
        stiffness[Segment::Root.index()] = balance::STRENGTH;
        Self {
            position: ground + Vec3::Y * rig::STAND_HEIGHT,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            targets: [Quat::IDENTITY; SEGMENT_COUNT],
            stiffness,
            airborne: false,
            landed: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    #[inline]
    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    fn total_mass() -> f32 {
        rig::SEGMENT_MASS * SEGMENT_COUNT as f32
    }

    fn rest_height(&self) -> f32 {
        if self.stiffness[Segment::Root.index()] >= rig::COLLAPSE_STIFFNESS {
            rig::STAND_HEIGHT
        } else {
            rig::COLLAPSED_HEIGHT
        }
    }

    /// Forward displacement of a leg's lower segments from its upper-leg target
    fn leg_swing(&self, side: Side) -> f32 {
        let upper = normalize_or_identity(self.targets[side.upper_leg().index()]);
        let pitch = 2.0 * upper.x.clamp(-1.0, 1.0).asin();
        rig::LEG_LENGTH * pitch.sin()
    }

    fn offset(&self, segment: Segment) -> Vec3 {
        let mut offset = REST_OFFSETS[segment.index()];
        for side in Side::BOTH {
            if segment == side.foot() {
                offset.z += self.leg_swing(side);
            } else if segment == side.lower_leg() {
                offset.z += self.leg_swing(side) * 0.5;
            }
        }
        offset
    }
}

impl Default for SimpleRig {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl PhysicsBody for SimpleRig {
    type Checkpoint = SimpleRig;

    fn snapshot(&self, ground_reach: f32) -> BodySnapshot {
        let mut segments = [SegmentSample::default(); SEGMENT_COUNT];
        for segment in Segment::ALL {
            let rotation = if segment == Segment::Root {
                self.rotation
            } else {
                self.rotation * normalize_or_identity(self.targets[segment.index()])
            };
            segments[segment.index()] = SegmentSample {
                position: self.position + self.rotation * self.offset(segment),
                rotation,
                velocity: self.velocity,
                mass: rig::SEGMENT_MASS,
            };
        }

        let height = self.position.y;
        let ground_distance = (height >= 0.0 && height <= ground_reach).then_some(height);

        BodySnapshot {
            segments,
            ground_distance,
        }
    }

    fn apply(&mut self, frame: &ActuatorFrame) {
        self.targets = frame.targets;
        self.stiffness = frame.stiffness;
        if let Some(velocity) = frame.root_velocity {
            self.velocity = velocity;
        }
        let mass = Self::total_mass();
        for impulse in &frame.impulses {
            self.velocity += impulse.impulse / mass;
        }
    }

    fn simulate(&mut self, dt: f32) {
        let root = Segment::Root.index();
        let goal = normalize_or_identity(self.targets[root]).inverse();
        let response = (self.stiffness[root] / balance::STRENGTH).clamp(0.0, 1.0);
        self.rotation = nlerp(self.rotation, goal, response * TURN_RESPONSE * dt);

        self.velocity.y -= rig::GRAVITY * dt;
        self.position += self.velocity * dt;

        let rest = self.rest_height();
        if self.position.y <= rest {
            if self.airborne {
                self.landed = true;
                self.airborne = false;
            }
            self.position.y = rest;
            self.velocity.y = self.velocity.y.max(0.0);

            let damping = (1.0 - GROUND_FRICTION * dt).max(0.0);
            self.velocity.x *= damping;
            self.velocity.z *= damping;
        } else if self.position.y > rest + AIR_MARGIN {
            self.airborne = true;
        }
    }

    fn checkpoint(&self) -> SimpleRig {
        self.clone()
    }

    fn restore(&mut self, checkpoint: &SimpleRig) {
        self.clone_from(checkpoint);
    }

    fn restore_root(&mut self, state: &BodyState) {
        self.position = state.position;
        self.rotation = state.rotation;
    }

    fn take_landed(&mut self) -> bool {
        std::mem::take(&mut self.landed)
    }
}
