//! Reusable label-id pool.
//!
//! The pool starts with the ids `1..=capacity` free. `allocate` hands out the
//! smallest free id; once the free set is empty it mints `capacity + 1`,
//! `capacity + 2`, ... without ever passing them through the free set.
//! `release` puts an id back so it can be handed out again.
//!
//! The labelling stage allocates from its own worker thread while the resolver
//! releases from another, so the pool lives behind its own mutex
//! ([`SharedLabelPool`]), unrelated to any mailbox lock.

use crate::types::{Label, LabelReusal, BACKGROUND};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What happened to a released id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The id is free again.
    Released,
    /// The id was already free; nothing changed.
    AlreadyFree,
    /// `0` is background and never part of the pool.
    Background,
    /// The id was never handed out; ignored.
    NeverAllocated,
}

/// Allocator/recycler of label ids.
#[derive(Debug, Clone)]
pub struct LabelPool {
    capacity: Label,
    free: BTreeSet<Label>,
    next_fresh: Label,
    redundant_releases: u64,
}

impl LabelPool {
    /// Pool whose free set starts as `1..=capacity`.
    pub fn new(capacity: Label) -> Self {
        Self {
            capacity,
            free: (1..=capacity).collect(),
            next_fresh: capacity + 1,
            redundant_releases: 0,
        }
    }

    /// Smallest free id, or a freshly minted one.
    pub fn allocate(&mut self) -> Label {
        if let Some(label) = self.free.pop_first() {
            return label;
        }
        let label = self.next_fresh;
        self.next_fresh += 1;
        label
    }

    /// Return `label` to the free set.
    pub fn release(&mut self, label: Label) -> ReleaseOutcome {
        if label == BACKGROUND {
            return ReleaseOutcome::Background;
        }
        if label >= self.next_fresh {
            tracing::warn!(
                "Ignoring release of label {} that was never allocated (next fresh {})",
                label,
                self.next_fresh
            );
            return ReleaseOutcome::NeverAllocated;
        }
        if self.free.insert(label) {
            ReleaseOutcome::Released
        } else {
            self.redundant_releases += 1;
            tracing::debug!("Label {} released while already free", label);
            ReleaseOutcome::AlreadyFree
        }
    }

    /// Release every id in `reusal`. Returns how many became free.
    pub fn release_all(&mut self, reusal: &LabelReusal) -> usize {
        reusal
            .labels
            .iter()
            .filter(|&&label| self.release(label) == ReleaseOutcome::Released)
            .count()
    }

    pub fn capacity(&self) -> Label {
        self.capacity
    }

    pub fn next_fresh(&self) -> Label {
        self.next_fresh
    }

    pub fn is_free(&self, label: Label) -> bool {
        self.free.contains(&label)
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of ids currently handed out.
    pub fn outstanding(&self) -> usize {
        (self.next_fresh as usize - 1) - self.free.len()
    }

    /// How many releases hit an id that was already free.
    pub fn redundant_releases(&self) -> u64 {
        self.redundant_releases
    }
}

/// Pool shared between the labelling worker and the feedback path.
pub type SharedLabelPool = Arc<Mutex<LabelPool>>;

/// Reverse-direction sink into the labelling stage's pool.
///
/// Cloneable and safe to call from any thread. A call holds the pool lock
/// only for the duration of the inserts.
#[derive(Clone)]
pub struct LabelReuseSink {
    pool: SharedLabelPool,
}

impl LabelReuseSink {
    pub fn new(pool: SharedLabelPool) -> Self {
        Self { pool }
    }

    /// Return retired ids to the pool. Returns how many became free.
    pub fn reuse_labels(&self, reusal: &LabelReusal) -> usize {
        if reusal.is_empty() {
            return 0;
        }
        self.pool.lock().release_all(reusal)
    }

    /// Snapshot of the number of ids currently handed out.
    pub fn outstanding(&self) -> usize {
        self.pool.lock().outstanding()
    }
}

impl std::fmt::Debug for LabelReuseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelReuseSink").finish_non_exhaustive()
    }
}
