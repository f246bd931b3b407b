//! The reorder buffer: a bounded, sorted holding area for results that arrived
//! before their turn on the primary sink.
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::config::MAX_BUFFER;
use crate::rendered::RenderedPackage;

/// Sorted collection of buffered [`RenderedPackage`]s keyed by id, bounded to
/// [`MAX_BUFFER`] entries.
///
/// Invariants (spec §3): every entry's id is >= the next id expected by the
/// primary sink; ids are unique within the buffer (guaranteed by the `BTreeMap`
/// key); `len() <= MAX_BUFFER` at all times.
pub struct ReorderBuffer {
    entries: Mutex<BTreeMap<u64, RenderedPackage>>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        ReorderBuffer {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts to insert `rendered` into the buffer, honoring the capacity
    /// bound. Returns the item back to the caller if the buffer was full so it
    /// can fall through to the write path instead (spec §4.5 step 3).
    pub fn try_insert(&self, rendered: RenderedPackage) -> Result<(), RenderedPackage> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= MAX_BUFFER {
            return Err(rendered);
        }
        guard.insert(rendered.id, rendered);
        Ok(())
    }

    /// Decides whether `rendered` should be buffered and, if so, inserts it —
    /// all under one acquisition of the buffer's lock. `current_primary_id` is
    /// called only once the lock is held, so its result reflects the freshest
    /// cursor value available to any concurrent drain, which itself re-reads
    /// the cursor under this same lock in [`pop_if_ready`](Self::pop_if_ready).
    ///
    /// A caller that read the cursor *before* locking (as a separate step from
    /// the insert) can race a drain that runs in between: the drain finds the
    /// buffer empty and stops, the caller then inserts using its now-stale
    /// "not my turn yet" reading, and the entry is never drained again. Folding
    /// the cursor check into this single critical section — mirroring the
    /// original's `mutex_buffer`-guarded check-and-insert block
    /// (`dumper_thread.c`) — closes that window: whichever of an insert or a
    /// drain acquires the lock second always observes the other's effect.
    ///
    /// Returns the item back to the caller (to fall through to the write path)
    /// if the buffer is full, this is the last task, or the primary cursor has
    /// already reached this id.
    pub fn try_insert_unless_ready(
        &self,
        rendered: RenderedPackage,
        is_last_task: bool,
        current_primary_id: impl FnOnce() -> u64,
    ) -> Result<(), RenderedPackage> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if is_last_task || guard.len() >= MAX_BUFFER || current_primary_id() == rendered.id {
            return Err(rendered);
        }
        guard.insert(rendered.id, rendered);
        Ok(())
    }

    /// Pops the buffered entry with the given id if it is the smallest id
    /// present (i.e. it is now eligible for writing), otherwise leaves the
    /// buffer untouched and returns `None`.
    pub fn pop_if_head(&self, expected_id: u64) -> Option<RenderedPackage> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::pop_head_locked(&mut guard, expected_id)
    }

    /// Like [`pop_if_head`](Self::pop_if_head), but reads the expected id via
    /// `current_primary_id` only once the buffer's lock is held, matching the
    /// original's re-read of `id_pri` under `mutex_buffer` in its drain loop.
    /// Used by the drain loop instead of a pre-fetched hint for the same
    /// reason [`try_insert_unless_ready`](Self::try_insert_unless_ready) reads
    /// its cursor under the lock.
    pub fn pop_if_ready(&self, current_primary_id: impl FnOnce() -> u64) -> Option<RenderedPackage> {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expected_id = current_primary_id();
        Self::pop_head_locked(&mut guard, expected_id)
    }

    fn pop_head_locked(
        guard: &mut BTreeMap<u64, RenderedPackage>,
        expected_id: u64,
    ) -> Option<RenderedPackage> {
        match guard.keys().next().copied() {
            Some(head_id) if head_id == expected_id => guard.remove(&head_id),
            _ => None,
        }
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new()
    }
}
