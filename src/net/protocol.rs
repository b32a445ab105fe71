use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::clock::Tick;

/// Unique simulated-actor identifier
pub type ActorId = Uuid;

/// Squared-length slack accepted as unit length, so sanitizing twice changes nothing
const UNIT_EPSILON: f32 = 1e-5;

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Owner input for one tick
    Input { actor: ActorId, command: InputCommand },
}

/// Messages from server to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Authoritative result of the last command processed this server tick
    State(StateUpdate),
}

/// Owner input for one tick. Immutable once sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    /// Tick this input was sampled on
    pub tick: Tick,
    /// Planar move axis (x = strafe, y = forward)
    pub move_axis: Vec2,
    pub punch_left: bool,
    pub punch_right: bool,
    pub reach_left: f32,
    pub reach_right: f32,
    /// Secondary aim axis driving body bend and arm aim
    pub mouse_y: f32,
    pub jump: f32,
    pub cam_forward: Vec3,
}

impl Default for InputCommand {
    fn default() -> Self {
        Self {
            tick: 0,
            move_axis: Vec2::ZERO,
            punch_left: false,
            punch_right: false,
            reach_left: 0.0,
            reach_right: 0.0,
            mouse_y: 0.0,
            jump: 0.0,
            cam_forward: Vec3::Z,
        }
    }
}

impl InputCommand {
    pub fn new(tick: Tick) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Copy with non-finite values zeroed and ranges clamped.
    ///
    /// Move is clamped to unit length, reach and jump to 0..1, camera forward
    /// normalised (zero-length falls back to +Z).
    pub fn sanitized(&self) -> Self {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };

        let move_axis = if !self.move_axis.is_finite() {
            Vec2::ZERO
        } else if self.move_axis.length_squared() > 1.0 + UNIT_EPSILON {
            self.move_axis.normalize()
        } else {
            self.move_axis
        };

        let cam_forward = if !self.cam_forward.is_finite() {
            Vec3::Z
        } else if (self.cam_forward.length_squared() - 1.0).abs() <= UNIT_EPSILON {
            self.cam_forward
        } else {
            self.cam_forward.try_normalize().unwrap_or(Vec3::Z)
        };

        Self {
            tick: self.tick,
            move_axis,
            punch_left: self.punch_left,
            punch_right: self.punch_right,
            reach_left: finite(self.reach_left).clamp(0.0, 1.0),
            reach_right: finite(self.reach_right).clamp(0.0, 1.0),
            mouse_y: finite(self.mouse_y),
            jump: finite(self.jump).clamp(0.0, 1.0),
            cam_forward,
        }
    }

    #[inline]
    pub fn has_move(&self) -> bool {
        self.move_axis.x != 0.0 || self.move_axis.y != 0.0
    }
}

/// Resulting root state of one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub tick: Tick,
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            tick: 0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Authority broadcast: a state and the command that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub actor: ActorId,
    pub state: BodyState,
    pub command: InputCommand,
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command() -> InputCommand {
        InputCommand {
            tick: 42,
            move_axis: Vec2::new(0.0, 1.0),
            punch_left: false,
            punch_right: true,
            reach_left: 0.5,
            reach_right: 0.0,
            mouse_y: -2.0,
            jump: 1.0,
            cam_forward: Vec3::new(0.0, -0.3, 1.0),
        }
    }

    #[test]
    fn test_client_message_input() {
        let actor = Uuid::new_v4();
        let msg = ClientMessage::Input {
            actor,
            command: sample_command(),
        };
        let encoded = encode(&msg).unwrap();
        let decoded: ClientMessage = decode(&encoded).unwrap();
        match decoded {
            ClientMessage::Input { actor: a, command } => {
                assert_eq!(a, actor);
                assert_eq!(command, sample_command());
            }
        }
    }

    #[test]
    fn test_server_message_state() {
        let update = StateUpdate {
            actor: Uuid::new_v4(),
            state: BodyState {
                tick: 42,
                position: Vec3::new(1.0, 2.0, 3.0),
                rotation: Quat::from_rotation_y(0.5),
            },
            command: sample_command(),
        };
        let encoded = encode(&ServerMessage::State(update)).unwrap();
        let decoded: ServerMessage = decode(&encoded).unwrap();
        let ServerMessage::State(decoded) = decoded;
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_invalid_decode() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        let result: Result<ClientMessage, _> = decode(&garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_command_is_idle() {
        let command = InputCommand::default();
        assert!(!command.has_move());
        assert!(!command.punch_left && !command.punch_right);
        assert_eq!(command.jump, 0.0);
    }

    #[test]
    fn test_sanitize_clamps_ranges() {
        let command = InputCommand {
            move_axis: Vec2::new(3.0, 4.0),
            reach_left: 7.0,
            reach_right: -1.0,
            jump: f32::INFINITY,
            mouse_y: f32::NAN,
            cam_forward: Vec3::ZERO,
            ..sample_command()
        }
        .sanitized();

        assert!((command.move_axis.length() - 1.0).abs() < 1e-6);
        assert_eq!(command.reach_left, 1.0);
        assert_eq!(command.reach_right, 0.0);
        assert_eq!(command.jump, 0.0);
        assert_eq!(command.mouse_y, 0.0);
        assert_eq!(command.cam_forward, Vec3::Z);
        assert_eq!(command.tick, 42);
    }

    #[test]
    fn test_sanitize_keeps_valid_command() {
        let command = InputCommand {
            cam_forward: Vec3::Z,
            ..sample_command()
        };
        assert_eq!(command.sanitized(), command);
    }

    #[test]
    fn test_sanitize_is_stable() {
        let commands = [
            sample_command(),
            InputCommand {
                move_axis: Vec2::new(3.0, 4.0),
                cam_forward: Vec3::new(0.3, 0.1, -0.7),
                ..sample_command()
            },
            InputCommand {
                move_axis: Vec2::new(-0.7, 0.7),
                cam_forward: Vec3::new(f32::NAN, 0.0, 1.0),
                mouse_y: f32::NEG_INFINITY,
                ..sample_command()
            },
        ];
        for command in commands {
            let once = command.sanitized();
            assert_eq!(once.sanitized(), once);
        }
    }
}
