//! Event types for PetalSonic I/O

use crossbeam_channel::{Receiver, Sender};

/// Maximum number of undelivered events a source keeps before dropping new ones.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The consumer asked for frames while no whole frame was buffered
    Underrun { requested_frames: u64 },
    /// The producer pushed more than the buffer could hold
    Overflow { dropped_bytes: usize },
    /// Format or channel count changed and the buffer was recreated
    Reconfigured {
        bytes_per_frame: usize,
        capacity_bytes: usize,
    },
}

impl StreamEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Underrun { .. } | Self::Overflow { .. })
    }
}

/// Bounded event queue whose send side never blocks.
#[derive(Debug, Clone)]
pub(crate) struct EventQueue {
    sender: Sender<StreamEvent>,
    receiver: Receiver<StreamEvent>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);
        Self { sender, receiver }
    }

    /// Queues an event, dropping it when the queue is full.
    pub(crate) fn emit(&self, event: StreamEvent) {
        // Dropped when the queue is full
        let _ = self.sender.try_send(event);
    }

    pub(crate) fn drain(&self) -> Vec<StreamEvent> {
        self.receiver.try_iter().collect()
    }
}
