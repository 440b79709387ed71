//! Thread boundary between the resolver stage and whoever runs the pipeline.
//!
//! The resolver pushes [`SinkMessage`]s into a bounded crossbeam channel;
//! the caller holds the [`PipelineBridge`] end and drains it.

use crate::types::Component;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of the report channel.
pub const REPORT_CHANNEL_CAPACITY: usize = 1024;

/// Totals reported by the resolver at end of stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSummary {
    pub components: u64,
    pub merges_applied: u64,
    pub recycled_labels: u64,
    /// Component reports dropped because the channel was full.
    pub dropped_reports: u64,
}

/// Messages sent from the resolver to the caller.
#[derive(Debug, Clone)]
pub enum SinkMessage {
    /// Components completed during one tick.
    Components(Vec<Component>),
    /// The stream ended; no further messages follow.
    End(ResolverSummary),
}

/// Caller-side handle on the report channel.
pub struct PipelineBridge {
    pub msg_rx: Receiver<SinkMessage>,
}

impl PipelineBridge {
    /// Create a bridge and the sender the resolver should own.
    pub fn new(capacity: usize) -> (Self, Sender<SinkMessage>) {
        let (msg_tx, msg_rx) = bounded(capacity.max(1));
        (Self { msg_rx }, msg_tx)
    }

    /// Drain all pending messages.
    pub fn drain(&self) -> Vec<SinkMessage> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    /// Try to receive a single message without blocking.
    pub fn try_recv(&self) -> Option<SinkMessage> {
        self.msg_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for a message.
    ///
    /// `Err(Disconnected)` means the resolver is gone and nothing more will arrive.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SinkMessage, RecvTimeoutError> {
        self.msg_rx.recv_timeout(timeout)
    }
}
