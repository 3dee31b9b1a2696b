use crate::attrs::{Attr, Name};
use crate::live::LiveId;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Accumulated attribute writes for one object. `None` removes the key.
pub type PatchBatch = BTreeMap<Name, Option<Attr>>;

#[derive(Debug)]
struct Pending {
    due: Instant,
    batch: PatchBatch,
}

/// Collapses bursts of attribute writes into one patch per object.
///
/// Every write restarts the object's deadline and moves it to the back of
/// the firing order. Batches are handed out in firing order; applying them
/// is up to the caller.
#[derive(Debug)]
pub struct Coalescer {
    delay: Duration,
    pending: IndexMap<LiveId, Pending>,
}

impl Coalescer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: IndexMap::new(),
        }
    }

    /// Schedule a patch due after the configured delay from now.
    pub fn schedule_patch(&mut self, target: LiveId, key: &str, value: Option<Attr>) {
        self.schedule_at(target, key, value, Instant::now());
    }

    /// Schedule a patch as if it arrived at `now`.
    pub fn schedule_at(&mut self, target: LiveId, key: &str, value: Option<Attr>, now: Instant) {
        let mut entry = self.pending.shift_remove(&target).unwrap_or(Pending {
            due: now,
            batch: PatchBatch::new(),
        });
        entry.due = now + self.delay;
        entry.batch.insert(key.into(), value);
        trace!(?target, %key, keys = entry.batch.len(), "patch scheduled");
        self.pending.insert(target, entry);
    }

    /// Take every batch whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<(LiveId, PatchBatch)> {
        let mut ready = Vec::new();
        let mut waiting = IndexMap::with_capacity(self.pending.len());
        for (target, pending) in self.pending.drain(..) {
            if pending.due <= now {
                ready.push((target, pending.batch));
            } else {
                waiting.insert(target, pending);
            }
        }
        self.pending = waiting;
        ready
    }

    /// Take every batch regardless of its deadline.
    pub fn take_all(&mut self) -> Vec<(LiveId, PatchBatch)> {
        self.pending
            .drain(..)
            .map(|(target, pending)| (target, pending.batch))
            .collect()
    }

    /// Drop the pending batch of `target`. Returns false if none was queued.
    pub fn cancel(&mut self, target: LiveId) -> bool {
        self.pending.shift_remove(&target).is_some()
    }

    /// Earliest due time of a pending batch.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Pending batch for `target`.
    pub fn batch(&self, target: LiveId) -> Option<&PatchBatch> {
        self.pending.get(&target).map(|p| &p.batch)
    }

    /// Number of targets with a pending batch.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
