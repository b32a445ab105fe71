//! Owner-side drift detection and optional rewind-and-replay

use tracing::{debug, info};

use crate::game::body::PhysicsBody;
use crate::game::clock::Tick;
use crate::game::history::RingHistory;
use crate::game::locomotion::{LocomotionController, LocomotionState};
use crate::net::protocol::{BodyState, InputCommand};
use crate::util::quat::angle_between;

/// Predicted vs authoritative state at one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftReport {
    pub tick: Tick,
    /// World-space distance between root positions
    pub position_error: f32,
    /// Angle in radians between root orientations
    pub rotation_error: f32,
}

impl DriftReport {
    pub fn compare(predicted: &BodyState, authoritative: &BodyState) -> Self {
        Self {
            tick: authoritative.tick,
            position_error: predicted.position.distance(authoritative.position),
            rotation_error: angle_between(predicted.rotation, authoritative.rotation),
        }
    }

    #[inline]
    pub fn exceeds(&self, tolerance: f32) -> bool {
        !(self.position_error <= tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("history for tick {0} is no longer buffered")]
    HistoryOverwritten(Tick),
    #[error("authoritative tick {authoritative} is ahead of the current tick {current}")]
    AheadOfPrediction { authoritative: Tick, current: Tick },
}

/// Buffers the owner keeps per tick for replay
pub struct ReplayBuffers<'a, C> {
    pub inputs: &'a RingHistory<InputCommand>,
    pub locomotion: &'a mut RingHistory<LocomotionState>,
    pub predicted: &'a mut RingHistory<BodyState>,
    /// Physics checkpoints taken at the end of each tick
    pub checkpoints: &'a mut RingHistory<C>,
}

/// Rewind the body to its checkpoint at the authoritative tick, move the root
/// to `authoritative`, then replay buffered inputs for every tick after it up
/// to `current`, rewriting the predicted history.
///
/// Checks that every needed entry is still buffered before touching the body.
/// Returns the locomotion state after `current` and the number of replayed ticks.
pub fn resimulate<B: PhysicsBody + ?Sized>(
    controller: &LocomotionController,
    body: &mut B,
    authoritative: &BodyState,
    current: Tick,
    buffers: ReplayBuffers<'_, B::Checkpoint>,
) -> Result<(LocomotionState, u64), ReconcileError> {
    let from = authoritative.tick;
    if from > current {
        return Err(ReconcileError::AheadOfPrediction {
            authoritative: from,
            current,
        });
    }

    let mut state = buffers
        .locomotion
        .get(from)
        .cloned()
        .ok_or(ReconcileError::HistoryOverwritten(from))?;
    let checkpoint = buffers
        .checkpoints
        .get(from)
        .cloned()
        .ok_or(ReconcileError::HistoryOverwritten(from))?;
    if let Some(missing) = (from + 1..=current).find(|tick| !buffers.inputs.contains(*tick)) {
        return Err(ReconcileError::HistoryOverwritten(missing));
    }

    body.restore(&checkpoint);
    body.restore_root(authoritative);
    buffers.predicted.write(from, *authoritative);
    buffers.checkpoints.write(from, body.checkpoint());

    let mut replayed = 0;
    for tick in from + 1..=current {
        let Some(input) = buffers.inputs.get(tick) else {
            return Err(ReconcileError::HistoryOverwritten(tick));
        };
        let result = controller.tick(&mut state, body, input);
        buffers.predicted.write(tick, result);
        buffers.locomotion.write(tick, state.clone());
        buffers.checkpoints.write(tick, body.checkpoint());
        replayed += 1;
    }

    debug!(from, current, replayed, "Resimulated from authoritative state");
    if replayed > 0 {
        info!(from, replayed, "Prediction corrected");
    }
    Ok((state, replayed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;
    use crate::game::body::PhysicsBody;
    use crate::game::rig::SimpleRig;
    use glam::{Quat, Vec2, Vec3};

    #[test]
    fn test_drift_report() {
        let predicted = BodyState {
            tick: 4,
            position: Vec3::new(1.0, 1.0, 0.0),
            rotation: Quat::IDENTITY,
        };
        let authoritative = BodyState {
            position: Vec3::new(1.0, 1.0, 0.5),
            ..predicted
        };
        let report = DriftReport::compare(&predicted, &authoritative);
        assert_eq!(report.tick, 4);
        assert!((report.position_error - 0.5).abs() < 1e-6);
        assert!(report.rotation_error.abs() < 1e-6);
        assert!(report.exceeds(0.25));
        assert!(!report.exceeds(0.5));
    }

    #[test]
    fn test_nan_drift_exceeds() {
        let report = DriftReport {
            tick: 1,
            position_error: f32::NAN,
            rotation_error: 0.0,
        };
        assert!(report.exceeds(1.0));
    }

    #[test]
    fn test_resimulate_replays_inputs() {
        let controller = LocomotionController::new(MovementConfig::default(), 60);
        let mut inputs = RingHistory::new(64);
        let mut locomotion = RingHistory::new(64);
        let mut predicted = RingHistory::new(64);
        let mut checkpoints = RingHistory::new(64);

        let mut rig = SimpleRig::default();
        let mut state = controller.spawn_state();
        for tick in 1..=10 {
            let input = InputCommand {
                move_axis: Vec2::new(0.0, 1.0),
                ..InputCommand::new(tick)
            };
            inputs.write(tick, input);
            predicted.write(tick, controller.tick(&mut state, &mut rig, &input));
            locomotion.write(tick, state.clone());
            checkpoints.write(tick, rig.checkpoint());
        }

        // authority saw tick 5 a little further along
        let mut authoritative = *predicted.get(5).unwrap();
        authoritative.position.z += 1.0;

        let (replayed_state, replayed) = resimulate(
            &controller,
            &mut rig,
            &authoritative,
            10,
            ReplayBuffers {
                inputs: &inputs,
                locomotion: &mut locomotion,
                predicted: &mut predicted,
                checkpoints: &mut checkpoints,
            },
        )
        .unwrap();

        assert_eq!(replayed, 5);
        assert_eq!(predicted.get(5), Some(&authoritative));
        assert!(predicted.get(10).unwrap().position.z > authoritative.position.z);
        assert_eq!(replayed_state.steps(), state.steps());
    }

    #[test]
    fn test_resimulate_rejects_overwritten_history() {
        let controller = LocomotionController::new(MovementConfig::default(), 60);
        let inputs = RingHistory::new(4);
        let mut locomotion: RingHistory<LocomotionState> = RingHistory::new(4);
        let mut predicted = RingHistory::new(4);
        let mut checkpoints = RingHistory::new(4);
        let mut rig = SimpleRig::default();
        let before = rig.clone();

        let result = resimulate(
            &controller,
            &mut rig,
            &BodyState {
                tick: 2,
                ..BodyState::default()
            },
            8,
            ReplayBuffers {
                inputs: &inputs,
                locomotion: &mut locomotion,
                predicted: &mut predicted,
                checkpoints: &mut checkpoints,
            },
        );
        assert_eq!(result.unwrap_err(), ReconcileError::HistoryOverwritten(2));
        assert_eq!(rig, before);
    }

    #[test]
    fn test_resimulate_rejects_future_state() {
        let controller = LocomotionController::new(MovementConfig::default(), 60);
        let inputs = RingHistory::new(4);
        let mut locomotion: RingHistory<LocomotionState> = RingHistory::new(4);
        let mut predicted = RingHistory::new(4);
        let mut checkpoints = RingHistory::new(4);

        let result = resimulate(
            &controller,
            &mut SimpleRig::default(),
            &BodyState {
                tick: 9,
                ..BodyState::default()
            },
            8,
            ReplayBuffers {
                inputs: &inputs,
                locomotion: &mut locomotion,
                predicted: &mut predicted,
                checkpoints: &mut checkpoints,
            },
        );
        assert!(matches!(
            result,
            Err(ReconcileError::AheadOfPrediction { .. })
        ));
    }

    #[test]
    fn test_resimulate_requires_checkpoint() {
        let controller = LocomotionController::new(MovementConfig::default(), 60);
        let mut inputs = RingHistory::new(8);
        let mut locomotion = RingHistory::new(8);
        let mut predicted = RingHistory::new(8);
        let mut checkpoints: RingHistory<SimpleRig> = RingHistory::new(8);

        locomotion.write(2, controller.spawn_state());
        for tick in 3..=4 {
            inputs.write(tick, InputCommand::new(tick));
        }
        let mut rig = SimpleRig::default();
        let before = rig.clone();

        let result = resimulate(
            &controller,
            &mut rig,
            &BodyState {
                tick: 2,
                ..BodyState::default()
            },
            4,
            ReplayBuffers {
                inputs: &inputs,
                locomotion: &mut locomotion,
                predicted: &mut predicted,
                checkpoints: &mut checkpoints,
            },
        );
        assert_eq!(result.unwrap_err(), ReconcileError::HistoryOverwritten(2));
        assert_eq!(rig, before);
        assert!(!predicted.contains(2));
    }
}
