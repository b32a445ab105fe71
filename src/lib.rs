//! Ragdoll Netcore Library
//!
//! Deterministic active-ragdoll locomotion with owner prediction,
//! authoritative re-simulation and observer dead reckoning.
//!
//! # Features
//!
//! - `metrics` - Prometheus-style TCP metrics endpoint (enabled by default)

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;

pub use config::{MovementConfig, ReconcilePolicy, SimConfig};
pub use game::body::{ActuatorFrame, BodySnapshot, PhysicsBody};
pub use game::clock::{FixedTickClock, Tick};
pub use game::history::RingHistory;
pub use game::locomotion::{LocomotionController, LocomotionState};
pub use net::protocol::{ActorId, BodyState, InputCommand, StateUpdate};
