//! Body model and the physics collaborator seam
//!
//! The locomotion controller never touches the physics engine directly. It
//! reads a [`BodySnapshot`] and returns an [`ActuatorFrame`]; the caller
//! applies the frame through [`PhysicsBody`].

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::protocol::BodyState;

/// Number of jointed segments
pub const SEGMENT_COUNT: usize = 13;

/// Jointed body segments, in fixed index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Root,
    Body,
    Head,
    UpperRightArm,
    LowerRightArm,
    UpperLeftArm,
    LowerLeftArm,
    UpperRightLeg,
    LowerRightLeg,
    UpperLeftLeg,
    LowerLeftLeg,
    RightFoot,
    LeftFoot,
}

impl Segment {
    pub const ALL: [Segment; SEGMENT_COUNT] = [
        Segment::Root,
        Segment::Body,
        Segment::Head,
        Segment::UpperRightArm,
        Segment::LowerRightArm,
        Segment::UpperLeftArm,
        Segment::LowerLeftArm,
        Segment::UpperRightLeg,
        Segment::LowerRightLeg,
        Segment::UpperLeftLeg,
        Segment::LowerLeftLeg,
        Segment::RightFoot,
        Segment::LeftFoot,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Segments whose drives relax/stiffen together with the legs
    pub const LOWER_BODY: [Segment; 6] = [
        Segment::UpperRightLeg,
        Segment::LowerRightLeg,
        Segment::UpperLeftLeg,
        Segment::LowerLeftLeg,
        Segment::RightFoot,
        Segment::LeftFoot,
    ];
}

/// Left/right selector for paired limbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn upper_arm(self) -> Segment {
        match self {
            Side::Left => Segment::UpperLeftArm,
            Side::Right => Segment::UpperRightArm,
        }
    }

    pub fn lower_arm(self) -> Segment {
        match self {
            Side::Left => Segment::LowerLeftArm,
            Side::Right => Segment::LowerRightArm,
        }
    }

    pub fn upper_leg(self) -> Segment {
        match self {
            Side::Left => Segment::UpperLeftLeg,
            Side::Right => Segment::UpperRightLeg,
        }
    }

    pub fn lower_leg(self) -> Segment {
        match self {
            Side::Left => Segment::LowerLeftLeg,
            Side::Right => Segment::LowerRightLeg,
        }
    }

    pub fn foot(self) -> Segment {
        match self {
            Side::Left => Segment::LeftFoot,
            Side::Right => Segment::RightFoot,
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Anything that can receive an impulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyPart {
    Segment(Segment),
    Hand(Side),
}

/// Kinematic sample of one segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentSample {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub mass: f32,
}

impl Default for SegmentSample {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            mass: 1.0,
        }
    }
}

/// Everything the controller may read from physics for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub segments: [SegmentSample; SEGMENT_COUNT],
    /// Distance to ground along root-down, if ground lies within the ground reach
    pub ground_distance: Option<f32>,
}

impl Default for BodySnapshot {
    fn default() -> Self {
        Self {
            segments: [SegmentSample::default(); SEGMENT_COUNT],
            ground_distance: Some(0.0),
        }
    }
}

impl BodySnapshot {
    #[inline]
    pub fn segment(&self, segment: Segment) -> &SegmentSample {
        &self.segments[segment.index()]
    }

    #[inline]
    pub fn segment_mut(&mut self, segment: Segment) -> &mut SegmentSample {
        &mut self.segments[segment.index()]
    }

    #[inline]
    pub fn root(&self) -> &SegmentSample {
        self.segment(Segment::Root)
    }

    /// Root forward axis (+Z in root space)
    pub fn forward(&self) -> Vec3 {
        self.root().rotation * Vec3::Z
    }

    /// Root up axis (+Y in root space)
    pub fn up(&self) -> Vec3 {
        self.root().rotation * Vec3::Y
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.ground_distance.is_some()
    }

    /// Mass-weighted average position of all segments
    pub fn center_of_mass(&self) -> Vec3 {
        let (weighted, total) = self
            .segments
            .iter()
            .fold((Vec3::ZERO, 0.0f32), |(sum, mass), s| {
                (sum + s.position * s.mass, mass + s.mass)
            });

        if total > 0.0 && total.is_finite() {
            weighted / total
        } else {
            self.root().position
        }
    }

    /// Outward-facing sample of the root
    pub fn body_state(&self, tick: crate::game::clock::Tick) -> BodyState {
        BodyState {
            tick,
            position: self.root().position,
            rotation: self.root().rotation,
        }
    }
}

/// An impulse to apply this tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Impulse {
    pub part: BodyPart,
    pub impulse: Vec3,
}

/// Controller output for one tick: joint targets, drive stiffness, velocity
/// command and impulses, applied by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorFrame {
    /// Raw target orientation per joint, indexed by [`Segment::index`]
    pub targets: [Quat; SEGMENT_COUNT],
    /// Drive stiffness per joint
    pub stiffness: [f32; SEGMENT_COUNT],
    /// Root velocity to set, if movement or jumping commanded one
    pub root_velocity: Option<Vec3>,
    pub impulses: SmallVec<[Impulse; 6]>,
}

impl ActuatorFrame {
    #[inline]
    pub fn target(&self, segment: Segment) -> Quat {
        self.targets[segment.index()]
    }

    #[inline]
    pub fn stiffness(&self, segment: Segment) -> f32 {
        self.stiffness[segment.index()]
    }

    /// Sum of impulses applied to `part` this tick
    pub fn impulse_on(&self, part: BodyPart) -> Vec3 {
        self.impulses
            .iter()
            .filter(|i| i.part == part)
            .fold(Vec3::ZERO, |acc, i| acc + i.impulse)
    }
}

/// Physics collaborator owning one simulated body
pub trait PhysicsBody {
    /// Full engine state at the end of a tick: velocities, contacts, drives
    type Checkpoint: Clone;

    /// Read all segments and look for ground within `ground_reach` below the root
    fn snapshot(&self, ground_reach: f32) -> BodySnapshot;

    /// Apply joint targets, drive stiffness, velocity command and impulses
    fn apply(&mut self, frame: &ActuatorFrame);

    /// Advance the body by `dt` seconds after a frame was applied
    fn simulate(&mut self, dt: f32);

    /// Capture everything needed to resume simulation from this point
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Rewind to a captured checkpoint
    fn restore(&mut self, checkpoint: &Self::Checkpoint);

    /// Teleport the root to an authoritative state
    fn restore_root(&mut self, state: &BodyState);

    /// True once after an airborne body touches down
    fn take_landed(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_indices_are_stable() {
        for (i, segment) in Segment::ALL.iter().enumerate() {
            assert_eq!(segment.index(), i);
        }
        assert_eq!(Segment::LeftFoot.index(), 12);
    }

    #[test]
    fn test_center_of_mass_weighted() {
        let mut snapshot = BodySnapshot::default();
        for s in snapshot.segments.iter_mut() {
            s.mass = 0.0;
        }
        snapshot.segment_mut(Segment::Root).mass = 3.0;
        snapshot.segment_mut(Segment::Head).mass = 1.0;
        snapshot.segment_mut(Segment::Head).position = Vec3::new(0.0, 4.0, 0.0);

        let com = snapshot.center_of_mass();
        assert!((com.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_center_of_mass_massless_falls_back_to_root() {
        let mut snapshot = BodySnapshot::default();
        for s in snapshot.segments.iter_mut() {
            s.mass = 0.0;
        }
        snapshot.segment_mut(Segment::Root).position = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(snapshot.center_of_mass(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_side_mapping() {
        assert_eq!(Side::Left.upper_arm(), Segment::UpperLeftArm);
        assert_eq!(Side::Right.foot(), Segment::RightFoot);
        assert_eq!(Side::Left.other(), Side::Right);
    }

    #[test]
    fn test_forward_follows_root_rotation() {
        let mut snapshot = BodySnapshot::default();
        snapshot.segment_mut(Segment::Root).rotation =
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!((snapshot.forward() - Vec3::X).length() < 1e-5);
    }
}
