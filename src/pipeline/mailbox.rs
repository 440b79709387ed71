//! Single-slot overwrite mailbox.
//!
//! Each stage publishes into its own mailbox and the next stage retrieves
//! from it. The slot holds at most one chunk: publishing over an unretrieved
//! chunk replaces it and bumps the lost counter. A slow consumer therefore
//! always sees the freshest chunk and memory use stays constant.

use crate::pipeline::chunk::Chunk;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, immutable-after-construction handle to a predecessor's mailbox.
pub type Upstream = Arc<Mailbox>;

#[derive(Default)]
struct Slot {
    chunk: Option<Chunk>,
    lost: u64,
    published: u64,
}

/// Latest-value-wins transport between two adjacent stages.
#[derive(Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailbox already wrapped for sharing with a downstream stage.
    pub fn shared() -> Upstream {
        Arc::new(Self::new())
    }

    /// Store `chunk`, discarding (and counting) any chunk nobody retrieved yet.
    ///
    /// Never blocks beyond the slot's critical section.
    pub fn publish(&self, chunk: Chunk) {
        let mut slot = self.slot.lock();
        if slot.chunk.replace(chunk).is_some() {
            slot.lost += 1;
        }
        slot.published += 1;
        drop(slot);
        self.ready.notify_one();
    }

    /// Block until a chunk is available, then take it.
    pub fn retrieve(&self) -> Chunk {
        let mut slot = self.slot.lock();
        loop {
            if let Some(chunk) = slot.chunk.take() {
                return chunk;
            }
            self.ready.wait(&mut slot);
        }
    }

    /// Like [`retrieve`](Self::retrieve) but gives up after `timeout`.
    pub fn retrieve_timeout(&self, timeout: Duration) -> Option<Chunk> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Some(chunk) = slot.chunk.take() {
                return Some(chunk);
            }
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.chunk.take();
            }
        }
    }

    /// Take the pending chunk, if any, without waiting.
    pub fn try_retrieve(&self) -> Option<Chunk> {
        self.slot.lock().chunk.take()
    }

    /// Whether a chunk is waiting to be retrieved.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().chunk.is_some()
    }

    /// Number of chunks overwritten before anyone retrieved them.
    pub fn lost_chunks(&self) -> u64 {
        self.slot.lock().lost
    }

    /// Number of chunks ever published into this mailbox.
    pub fn published_chunks(&self) -> u64 {
        self.slot.lock().published
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("Mailbox")
            .field("pending", &slot.chunk.is_some())
            .field("lost", &slot.lost)
            .field("published", &slot.published)
            .finish()
    }
}
