//! Per-actor locomotion state
//!
//! Every mutually exclusive set of flags is a tagged enum, so combinations
//! like stepping with both legs or jumping while airborne cannot be built.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::pose::{DriveTable, JointTargets};
use super::schedule::EventQueue;
use crate::game::body::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BalanceState {
    #[default]
    Balanced,
    Ragdoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gait {
    #[default]
    Idle,
    WalkForward,
    WalkBackward,
}

/// Which leg, if any, is mid-step, with time spent in the step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Stance {
    #[default]
    Planted,
    StepRight { elapsed: f32 },
    StepLeft { elapsed: f32 },
}

impl Stance {
    pub fn stepping(&self) -> Option<Side> {
        match self {
            Stance::Planted => None,
            Stance::StepRight { .. } => Some(Side::Right),
            Stance::StepLeft { .. } => Some(Side::Left),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Vertical {
    #[default]
    Grounded,
    /// Launch phase, velocity is driven up until `elapsed` passes the jump duration
    Jumping { elapsed: f32 },
    /// Waiting for landing to be signalled
    Airborne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArmState {
    #[default]
    Neutral,
    Reaching,
    /// Wound up; `interrupted_reach` resumes reaching on release
    Punching { interrupted_reach: bool },
}

impl ArmState {
    #[inline]
    pub fn is_punching(&self) -> bool {
        matches!(self, ArmState::Punching { .. })
    }

    /// Whether the arm keeps its reach drive through a ragdoll transition
    #[inline]
    pub fn holds_reach(&self) -> bool {
        matches!(
            self,
            ArmState::Reaching
                | ArmState::Punching {
                    interrupted_reach: true
                }
        )
    }
}

/// Everything the controller carries between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocomotionState {
    pub balance: BalanceState,
    pub gait: Gait,
    pub stance: Stance,
    /// First step of the current walk has been chosen
    pub cycle_started: bool,
    pub vertical: Vertical,
    pub left_arm: ArmState,
    pub right_arm: ArmState,
    pub body_bend: f32,
    pub arm_aim: f32,
    pub targets: JointTargets,
    pub drives: DriveTable,
    /// Body, arms and aim return to neutral at the next chance
    pub pending_reset: bool,
    /// Center of mass sampled during the previous tick, once one has run
    pub center_of_mass: Option<Vec3>,
    pub(super) move_held: bool,
    pub(super) jump_held: bool,
    pub(super) steps: u64,
    pub(super) events: EventQueue,
}

impl LocomotionState {
    /// Fresh standing state holding `neutral`
    pub fn standing(neutral: JointTargets) -> Self {
        Self {
            balance: BalanceState::Balanced,
            gait: Gait::Idle,
            stance: Stance::Planted,
            cycle_started: false,
            vertical: Vertical::Grounded,
            left_arm: ArmState::Neutral,
            right_arm: ArmState::Neutral,
            body_bend: 0.0,
            arm_aim: 0.0,
            targets: neutral,
            drives: DriveTable::standing(),
            pending_reset: false,
            center_of_mass: None,
            move_held: false,
            jump_held: false,
            steps: 0,
            events: EventQueue::default(),
        }
    }

    #[inline]
    pub fn arm(&self, side: Side) -> ArmState {
        match side {
            Side::Left => self.left_arm,
            Side::Right => self.right_arm,
        }
    }

    #[inline]
    pub fn arm_mut(&mut self, side: Side) -> &mut ArmState {
        match side {
            Side::Left => &mut self.left_arm,
            Side::Right => &mut self.right_arm,
        }
    }

    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.balance == BalanceState::Balanced
    }

    #[inline]
    pub fn is_ragdoll(&self) -> bool {
        self.balance == BalanceState::Ragdoll
    }

    #[inline]
    pub fn is_walking(&self) -> bool {
        self.gait != Gait::Idle
    }

    #[inline]
    pub fn is_airborne(&self) -> bool {
        self.vertical == Vertical::Airborne
    }

    #[inline]
    pub fn is_jumping(&self) -> bool {
        matches!(self.vertical, Vertical::Jumping { .. })
    }

    #[inline]
    pub fn is_reaching(&self, side: Side) -> bool {
        self.arm(side) == ArmState::Reaching
    }

    #[inline]
    pub fn is_punching(&self, side: Side) -> bool {
        self.arm(side).is_punching()
    }

    /// Move input is currently latched as held
    #[inline]
    pub fn move_held(&self) -> bool {
        self.move_held
    }

    /// Ticks this controller has stepped
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn pending_events(&self) -> &EventQueue {
        &self.events
    }
}

impl Default for LocomotionState {
    fn default() -> Self {
        Self::standing(JointTargets::default())
    }
}
