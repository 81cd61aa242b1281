use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::channel::{ChannelId, TaggedFrame};

/// One item on the hand-off queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Handoff {
    /// A frame decoded by a channel reader.
    Frame(TaggedFrame),
    /// The channel's reader has fully stopped; no frame of that reader
    /// follows this marker.
    Detached(ChannelId),
}

/// The hand-off queue was dropped; nobody will consume further frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("hand-off queue closed")]
pub struct QueueClosed;

/// Unbounded multi-producer FIFO between channel readers and the combiner.
///
/// Ordering is by arrival across all producers; each producer's own frames
/// stay in the order it pushed them.
#[derive(Debug)]
pub struct HandoffQueue {
    tx: Sender<Handoff>,
    rx: Receiver<Handoff>,
}

impl HandoffQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Producer handle for a channel reader.
    pub fn sink(&self) -> FrameSink {
        FrameSink {
            tx: self.tx.clone(),
        }
    }

    /// Wait up to `timeout` for the next item. `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Handoff> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            // The queue holds its own sender, so it cannot disconnect.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take the next item if one is queued.
    pub fn try_recv(&self) -> Option<Handoff> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn push_detached(&self, channel: ChannelId) {
        // Infallible while `self` holds the receiver.
        let _ = self.tx.send(Handoff::Detached(channel));
    }

    /// Items waiting to be consumed.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for HandoffQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer end of a [`HandoffQueue`]. Never blocks.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: Sender<Handoff>,
}

impl FrameSink {
    pub fn push(&self, frame: TaggedFrame) -> Result<(), QueueClosed> {
        self.tx.send(Handoff::Frame(frame)).map_err(|_| QueueClosed)
    }
}
