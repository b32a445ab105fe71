//! Lock-free arrival queue for owner commands
//!
//! Uses crossbeam-channel so transport handlers can enqueue without blocking;
//! the authority drains everything at the start of its tick, in arrival order.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::net::protocol::{ActorId, InputCommand};

/// One received command and the actor it drives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputMessage {
    pub actor: ActorId,
    pub command: InputCommand,
}

/// Bounded FIFO of received commands
///
/// A full buffer rejects new commands instead of blocking the producer.
pub struct InputBuffer {
    sender: Sender<InputMessage>,
    receiver: Receiver<InputMessage>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Returns false if the buffer is full
    #[inline]
    pub fn try_submit(&self, actor: ActorId, command: InputCommand) -> bool {
        self.sender
            .try_send(InputMessage { actor, command })
            .is_ok()
    }

    /// Take every pending command, oldest arrival first
    pub fn drain(&self) -> Vec<InputMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(crate::game::constants::net::QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_drain_keeps_arrival_order() {
        let buffer = InputBuffer::new(10);
        let actor = Uuid::new_v4();

        for tick in [5, 7, 6] {
            assert!(buffer.try_submit(actor, InputCommand::new(tick)));
        }
        assert_eq!(buffer.pending_count(), 3);

        let ticks: Vec<u64> = buffer.drain().iter().map(|m| m.command.tick).collect();
        assert_eq!(ticks, vec![5, 7, 6]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_full_buffer_drops() {
        let buffer = InputBuffer::new(2);
        let actor = Uuid::new_v4();

        assert!(buffer.try_submit(actor, InputCommand::new(1)));
        assert!(buffer.try_submit(actor, InputCommand::new(2)));
        assert!(!buffer.try_submit(actor, InputCommand::new(3)));

        buffer.drain();
        assert!(buffer.try_submit(actor, InputCommand::new(3)));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(InputBuffer::default().capacity(), 1024);
    }
}
