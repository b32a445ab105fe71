//! Fire-and-forget sinks and the in-process loopback link
//!
//! Roles only see [`CommandSink`] and [`StateSink`]; what carries the bytes is
//! the caller's business. [`LoopbackLink`] carries encoded messages over a
//! bounded crossbeam channel with optional latency and deterministic
//! reordering, which is enough to exercise the netcode without sockets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::trace;

use crate::game::clock::Tick;
use crate::net::protocol::{
    encode, ActorId, ClientMessage, EncodeError, InputCommand, ServerMessage, StateUpdate,
};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("outgoing queue full")]
    Full,
    #[error("peer disconnected")]
    Disconnected,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Owner → authority
pub trait CommandSink {
    fn send_command(&self, actor: ActorId, command: &InputCommand) -> Result<(), TransportError>;
}

/// Authority → observers of an actor
pub trait StateSink {
    fn send_state(&self, update: &StateUpdate) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
struct Datagram {
    sent_at: Tick,
    bytes: Vec<u8>,
}

/// One-directional in-process link
pub struct LoopbackLink {
    sender: Sender<Datagram>,
    receiver: Receiver<Datagram>,
    clock: Arc<AtomicU64>,
    latency_ticks: u64,
    reorder: bool,
    in_flight: Mutex<Vec<Datagram>>,
}

impl LoopbackLink {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            clock: Arc::new(AtomicU64::new(0)),
            latency_ticks: 0,
            reorder: false,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Hold every datagram for `ticks` before it can be received
    pub fn with_latency(mut self, ticks: u32) -> Self {
        self.latency_ticks = ticks as u64;
        self
    }

    /// Swap the second and third datagram of every three in a delivered batch
    pub fn with_reorder(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Advance the link clock used to stamp and release datagrams
    pub fn set_now(&self, now: Tick) {
        self.clock.store(now, Ordering::Relaxed);
    }

    pub fn now(&self) -> Tick {
        self.clock.load(Ordering::Relaxed)
    }

    /// Handle for the sending side
    pub fn endpoint(&self) -> LinkEndpoint {
        LinkEndpoint {
            sender: self.sender.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Every datagram whose latency has elapsed, in delivery order
    pub fn recv_ready(&self) -> Vec<Vec<u8>> {
        let now = self.now();
        let mut in_flight = self.in_flight.lock();
        in_flight.extend(self.receiver.try_iter());

        let mut ready = Vec::new();
        in_flight.retain(|datagram| {
            if datagram.sent_at + self.latency_ticks <= now {
                ready.push(datagram.bytes.clone());
                false
            } else {
                true
            }
        });

        if self.reorder {
            let mut i = 1;
            while i + 1 < ready.len() {
                ready.swap(i, i + 1);
                i += 3;
            }
        }
        trace!(count = ready.len(), now, "Loopback delivery");
        ready
    }

    pub fn pending(&self) -> usize {
        self.receiver.len() + self.in_flight.lock().len()
    }
}

/// Clonable sending half of a [`LoopbackLink`]
#[derive(Clone)]
pub struct LinkEndpoint {
    sender: Sender<Datagram>,
    clock: Arc<AtomicU64>,
}

impl LinkEndpoint {
    pub fn send_bytes(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let datagram = Datagram {
            sent_at: self.clock.load(Ordering::Relaxed),
            bytes,
        };
        self.sender.try_send(datagram).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Full,
            TrySendError::Disconnected(_) => TransportError::Disconnected,
        })
    }
}

impl CommandSink for LinkEndpoint {
    fn send_command(&self, actor: ActorId, command: &InputCommand) -> Result<(), TransportError> {
        let message = ClientMessage::Input {
            actor,
            command: *command,
        };
        self.send_bytes(encode(&message)?)
    }
}

impl StateSink for LinkEndpoint {
    fn send_state(&self, update: &StateUpdate) -> Result<(), TransportError> {
        self.send_bytes(encode(&ServerMessage::State(*update))?)
    }
}

/// Fan a state broadcast out to several endpoints
#[derive(Clone, Default)]
pub struct Broadcast {
    endpoints: Vec<LinkEndpoint>,
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, endpoint: LinkEndpoint) {
        self.endpoints.push(endpoint);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl StateSink for Broadcast {
    /// Sends to every endpoint; reports the first failure after trying all
    fn send_state(&self, update: &StateUpdate) -> Result<(), TransportError> {
        let bytes = encode(&ServerMessage::State(*update))?;
        let mut result = Ok(());
        for endpoint in &self.endpoints {
            if let Err(e) = endpoint.send_bytes(bytes.clone()) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{decode, BodyState};
    use uuid::Uuid;

    fn command_ticks(link: &LoopbackLink) -> Vec<Tick> {
        link.recv_ready()
            .iter()
            .map(|bytes| match decode::<ClientMessage>(bytes).unwrap() {
                ClientMessage::Input { command, .. } => command.tick,
            })
            .collect()
    }

    #[test]
    fn test_loopback_delivers_in_order() {
        let link = LoopbackLink::new(16);
        let endpoint = link.endpoint();
        let actor = Uuid::new_v4();
        for tick in 1..=3 {
            endpoint.send_command(actor, &InputCommand::new(tick)).unwrap();
        }
        assert_eq!(command_ticks(&link), vec![1, 2, 3]);
        assert_eq!(link.pending(), 0);
    }

    #[test]
    fn test_loopback_reorders_deterministically() {
        let link = LoopbackLink::new(16).with_reorder(true);
        let endpoint = link.endpoint();
        let actor = Uuid::new_v4();
        for tick in [5, 6, 7] {
            endpoint.send_command(actor, &InputCommand::new(tick)).unwrap();
        }
        assert_eq!(command_ticks(&link), vec![5, 7, 6]);
    }

    #[test]
    fn test_loopback_latency() {
        let link = LoopbackLink::new(16).with_latency(2);
        let endpoint = link.endpoint();
        link.set_now(10);
        endpoint
            .send_command(Uuid::new_v4(), &InputCommand::new(10))
            .unwrap();

        link.set_now(11);
        assert!(link.recv_ready().is_empty());
        assert_eq!(link.pending(), 1);

        link.set_now(12);
        assert_eq!(link.recv_ready().len(), 1);
    }

    #[test]
    fn test_full_link_reports_full() {
        let link = LoopbackLink::new(1);
        let endpoint = link.endpoint();
        let actor = Uuid::new_v4();
        endpoint.send_command(actor, &InputCommand::new(1)).unwrap();
        assert!(matches!(
            endpoint.send_command(actor, &InputCommand::new(2)),
            Err(TransportError::Full)
        ));
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let a = LoopbackLink::new(4);
        let b = LoopbackLink::new(4);
        let mut broadcast = Broadcast::new();
        broadcast.subscribe(a.endpoint());
        broadcast.subscribe(b.endpoint());

        let update = StateUpdate {
            actor: Uuid::new_v4(),
            state: BodyState::default(),
            command: InputCommand::new(3),
        };
        broadcast.send_state(&update).unwrap();

        for link in [&a, &b] {
            let received = link.recv_ready();
            assert_eq!(received.len(), 1);
            let ServerMessage::State(decoded) = decode::<ServerMessage>(&received[0]).unwrap();
            assert_eq!(decoded, update);
        }
    }
}
