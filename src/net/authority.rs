//! Authority role: canonical simulation
//!
//! Commands are simulated in arrival order, not tick order. Each result is
//! stored at the command's own tick, and after the queue is drained the last
//! result per actor is broadcast together with the command that produced it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::config::SimConfig;
use crate::game::body::PhysicsBody;
use crate::game::clock::{FixedTickClock, Tick};
use crate::game::history::RingHistory;
use crate::game::input_buffer::InputBuffer;
use crate::game::locomotion::{LocomotionController, LocomotionState};
use crate::metrics::Metrics;
use crate::net::protocol::{decode, ActorId, BodyState, ClientMessage, InputCommand, StateUpdate};
use crate::net::transport::StateSink;

struct ActorSlot<B> {
    state: LocomotionState,
    body: B,
    history: RingHistory<BodyState>,
}

pub struct AuthorityServer<B: PhysicsBody> {
    controller: LocomotionController,
    actors: HashMap<ActorId, ActorSlot<B>>,
    queue: InputBuffer,
    clock: FixedTickClock,
    history_capacity: usize,
    sanitize: bool,
    metrics: Arc<Metrics>,
}

impl<B: PhysicsBody> AuthorityServer<B> {
    pub fn new(config: &SimConfig, metrics: Arc<Metrics>) -> Self {
        let controller = LocomotionController::new(config.movement.clone(), config.tick_rate);
        let mut clock = FixedTickClock::new(config.tick_rate);
        if let Some(max) = config.max_catch_up_ticks {
            clock = clock.with_max_catch_up(max);
        }

        Self {
            controller,
            actors: HashMap::new(),
            queue: InputBuffer::default(),
            clock,
            history_capacity: config.history_capacity,
            sanitize: config.sanitize_inputs,
            metrics,
        }
    }

    /// Replace the arrival queue with one of a different capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue = InputBuffer::new(capacity);
        self
    }

    /// Start simulating `actor` with `body` in the neutral standing state
    pub fn spawn_actor(&mut self, actor: ActorId, body: B) {
        info!(%actor, "Spawning actor on authority");
        self.actors.insert(
            actor,
            ActorSlot {
                state: self.controller.spawn_state(),
                body,
                history: RingHistory::new(self.history_capacity),
            },
        );
    }

    /// Enqueue a received command. Returns false if it was dropped.
    pub fn submit(&self, actor: ActorId, command: InputCommand) -> bool {
        Metrics::incr(&self.metrics.commands_received);
        if self.queue.try_submit(actor, command) {
            true
        } else {
            Metrics::incr(&self.metrics.commands_dropped);
            warn!(%actor, tick = command.tick, "Input buffer full, dropping command");
            false
        }
    }

    /// Decode and enqueue one datagram from an owner
    pub fn receive(&self, bytes: &[u8]) -> bool {
        match decode::<ClientMessage>(bytes) {
            Ok(ClientMessage::Input { actor, command }) => self.submit(actor, command),
            Err(e) => {
                Metrics::incr(&self.metrics.decode_errors);
                warn!("Authority dropped malformed message: {}", e);
                false
            }
        }
    }

    /// Advance the clock by a frame delta and run every due tick.
    /// Returns the number of ticks run.
    pub fn frame<K: StateSink + ?Sized>(&mut self, elapsed: Duration, sink: &K) -> usize {
        self.clock.advance(elapsed);
        let mut ticks = 0;
        while self.clock.should_tick() {
            self.run_tick(sink);
            ticks += 1;
        }
        ticks
    }

    /// Drain the arrival queue, simulate every command, broadcast the last
    /// result per actor. Returns the number of commands simulated.
    pub fn run_tick<K: StateSink + ?Sized>(&mut self, sink: &K) -> usize {
        let started = Instant::now();
        let messages = self.queue.drain();
        let mut latest: SmallVec<[StateUpdate; 4]> = SmallVec::new();
        let mut processed = 0;

        for message in &messages {
            let Some(slot) = self.actors.get_mut(&message.actor) else {
                debug!(actor = %message.actor, "Command for unknown actor");
                continue;
            };
            let command = if self.sanitize {
                message.command.sanitized()
            } else {
                message.command
            };

            let was_ragdoll = slot.state.is_ragdoll();
            let state = self.controller.tick(&mut slot.state, &mut slot.body, &command);
            if was_ragdoll != slot.state.is_ragdoll() {
                Metrics::incr(&self.metrics.ragdoll_transitions);
            }
            slot.history.write(command.tick, state);
            processed += 1;

            let update = StateUpdate {
                actor: message.actor,
                state,
                command,
            };
            match latest.iter_mut().find(|u| u.actor == message.actor) {
                Some(existing) => *existing = update,
                None => latest.push(update),
            }
        }

        for update in &latest {
            match sink.send_state(update) {
                Ok(()) => Metrics::incr(&self.metrics.broadcasts_sent),
                Err(e) => warn!(actor = %update.actor, "Broadcast failed: {}", e),
            }
            trace!(actor = %update.actor, tick = update.state.tick, "Broadcast state");
        }

        Metrics::incr(&self.metrics.authority_ticks);
        self.metrics.record_tick_time(started.elapsed());
        processed
    }

    /// Report a collision on an actor's body
    pub fn register_impact(&mut self, actor: &ActorId, magnitude: f32) -> bool {
        let Some(slot) = self.actors.get_mut(actor) else {
            return false;
        };
        let knocked = self.controller.register_impact(&mut slot.state, magnitude);
        if knocked {
            Metrics::incr(&self.metrics.ragdoll_transitions);
        }
        knocked
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.pending_count()
    }

    /// Authoritative states of `actor`, indexed by command tick
    pub fn history(&self, actor: &ActorId) -> Option<&RingHistory<BodyState>> {
        self.actors.get(actor).map(|slot| &slot.history)
    }

    pub fn state(&self, actor: &ActorId) -> Option<&LocomotionState> {
        self.actors.get(actor).map(|slot| &slot.state)
    }

    pub fn body(&self, actor: &ActorId) -> Option<&B> {
        self.actors.get(actor).map(|slot| &slot.body)
    }

    pub fn controller(&self) -> &LocomotionController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rig::SimpleRig;
    use crate::net::protocol::{decode, encode, ServerMessage};
    use crate::net::transport::LoopbackLink;
    use glam::Vec2;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn server() -> (AuthorityServer<SimpleRig>, ActorId) {
        let mut server = AuthorityServer::new(&SimConfig::default(), Arc::new(Metrics::new()));
        let actor = Uuid::new_v4();
        server.spawn_actor(actor, SimpleRig::default());
        (server, actor)
    }

    fn broadcast_ticks(link: &LoopbackLink) -> Vec<Tick> {
        link.recv_ready()
            .iter()
            .map(|bytes| {
                let ServerMessage::State(update) = decode::<ServerMessage>(bytes).unwrap();
                update.state.tick
            })
            .collect()
    }

    #[test]
    fn test_stores_by_command_tick_and_broadcasts_last() {
        let (mut server, actor) = server();
        let link = LoopbackLink::new(16);

        for tick in [5, 7, 6] {
            assert!(server.submit(actor, InputCommand::new(tick)));
        }
        assert_eq!(server.run_tick(&link.endpoint()), 3);

        let history = server.history(&actor).unwrap();
        for tick in [5, 6, 7] {
            assert_eq!(history.get(tick).unwrap().tick, tick);
        }
        assert_eq!(broadcast_ticks(&link), vec![6]);
    }

    #[test]
    fn test_empty_queue_broadcasts_nothing() {
        let (mut server, _) = server();
        let link = LoopbackLink::new(16);
        assert_eq!(server.run_tick(&link.endpoint()), 0);
        assert!(link.recv_ready().is_empty());
    }

    #[test]
    fn test_broadcast_carries_simulated_command() {
        let (mut server, actor) = server();
        let link = LoopbackLink::new(16);
        let command = InputCommand {
            move_axis: Vec2::new(0.0, 3.0),
            reach_left: f32::NAN,
            ..InputCommand::new(2)
        };
        server.submit(actor, command);
        server.run_tick(&link.endpoint());

        let received = link.recv_ready();
        let ServerMessage::State(update) = decode::<ServerMessage>(&received[0]).unwrap();
        assert_eq!(update.actor, actor);
        assert_eq!(update.command, command.sanitized());
        assert_eq!(update.command.move_axis, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let (server, actor) = server();
        let server = server.with_queue_capacity(2);
        assert!(server.submit(actor, InputCommand::new(1)));
        assert!(server.submit(actor, InputCommand::new(2)));
        assert!(!server.submit(actor, InputCommand::new(3)));
        assert_eq!(server.metrics.commands_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(server.pending_commands(), 2);
    }

    #[test]
    fn test_receive_decodes_datagrams() {
        let (mut server, actor) = server();
        let bytes = encode(&ClientMessage::Input {
            actor,
            command: InputCommand::new(1),
        })
        .unwrap();
        assert!(server.receive(&bytes));
        assert!(!server.receive(b"junk"));
        assert_eq!(server.metrics.decode_errors.load(Ordering::Relaxed), 1);

        let link = LoopbackLink::new(4);
        assert_eq!(server.run_tick(&link.endpoint()), 1);
    }

    #[test]
    fn test_unknown_actor_is_skipped() {
        let (mut server, _) = server();
        let link = LoopbackLink::new(4);
        server.submit(Uuid::new_v4(), InputCommand::new(1));
        server.run_tick(&link.endpoint());
        assert!(link.recv_ready().is_empty());
    }

    #[test]
    fn test_frame_runs_due_ticks() {
        let (mut server, actor) = server();
        let link = LoopbackLink::new(16);
        let step = Duration::from_secs_f64(1.0 / 60.0);

        server.submit(actor, InputCommand::new(1));
        assert_eq!(server.frame(step, &link.endpoint()), 1);
        assert_eq!(server.current_tick(), 1);
        assert_eq!(broadcast_ticks(&link), vec![1]);

        // no input this tick, no broadcast
        assert_eq!(server.frame(step, &link.endpoint()), 1);
        assert!(link.recv_ready().is_empty());
    }
}
