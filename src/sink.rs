//! The ordered writer: three independently serialized sinks, each consuming
//! [`RenderedPackage`]s strictly in id order.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::errors::*;
use crate::record::PackageRecord;
use crate::rendered::RenderedPackage;

/// A serial consumer of XML chunks for one of the three streams. Implementations
/// are free to write to a file, a socket, an in-memory buffer — whatever the
/// caller wires up. The core never inspects the chunk's contents nor defines
/// their format (spec Non-goals).
pub trait ChunkSink: Send {
    fn append(&mut self, chunk: &str) -> std::io::Result<()>;
}

/// An optional per-sink auxiliary indexed store. Receives each [`PackageRecord`]
/// under the same serialization as the sink's chunk appends (spec §5, "Ordering
/// guarantees").
pub trait IndexStore: Send {
    fn insert(&mut self, record: &PackageRecord) -> std::io::Result<()>;
}

/// Which of the three sinks a given error or log message concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Primary,
    Filelists,
    Other,
}

impl SinkKind {
    fn label(self) -> &'static str {
        match self {
            SinkKind::Primary => "primary",
            SinkKind::Filelists => "filelists",
            SinkKind::Other => "other",
        }
    }
}

struct SinkState {
    next_id: u64,
    appender: Box<dyn ChunkSink>,
    index: Option<Box<dyn IndexStore>>,
}

/// One serialized output stream with its cursor, mutex and condition variable.
pub struct Sink {
    kind: SinkKind,
    mutex: Mutex<SinkState>,
    cond: Condvar,
    /// A lock-free mirror of `next_id`, readable without taking `mutex`. The
    /// buffer-or-write decision and the drain loop (`ReorderBuffer::
    /// try_insert_unless_ready`/`pop_if_ready`) read this hint from inside the
    /// reorder buffer's own lock, not before acquiring it — mirroring the
    /// source's unlocked `udata->id_pri` peek, which is only safe because it
    /// happens under `mutex_buffer`, not because the value itself is fresh.
    next_id_hint: AtomicU64,
}

impl Sink {
    pub fn new(
        kind: SinkKind,
        appender: Box<dyn ChunkSink>,
        index: Option<Box<dyn IndexStore>>,
    ) -> Self {
        Sink {
            kind,
            mutex: Mutex::new(SinkState {
                next_id: 0,
                appender,
                index,
            }),
            cond: Condvar::new(),
            next_id_hint: AtomicU64::new(0),
        }
    }

    /// A snapshot of this sink's cursor, safe to use as the authoritative value
    /// only when read from inside the reorder buffer's lock; see `next_id_hint`.
    pub fn next_id_hint(&self) -> u64 {
        self.next_id_hint.load(Ordering::Relaxed)
    }

    /// Blocks until this sink's cursor reaches `id`, appends `chunk`, optionally
    /// inserts `record` into the auxiliary index, then advances the cursor and
    /// wakes any waiters. Write/index errors are logged and do not propagate:
    /// the cursor still advances (spec §7).
    fn write(&self, id: u64, chunk: &str, record: &PackageRecord) -> Result<()> {
        let mut guard = self
            .mutex
            .lock()
            .map_err(|_| ErrorKind::Fatal(format!("{} sink mutex poisoned", self.kind.label())))?;

        while guard.next_id != id {
            guard = self
                .cond
                .wait(guard)
                .map_err(|_| ErrorKind::Fatal(format!("{} sink mutex poisoned", self.kind.label())))?;
        }

        if let Err(e) = guard.appender.append(chunk) {
            let err: Error = ErrorKind::Write(self.kind.label(), id).into();
            tracing::warn!(sink = self.kind.label(), id, error = %e, cause = %err, "chunk append failed");
        }

        if let Some(index) = guard.index.as_deref_mut() {
            if let Err(e) = index.insert(record) {
                let err: Error = ErrorKind::IndexInsert(self.kind.label(), id).into();
                tracing::warn!(sink = self.kind.label(), id, error = %e, cause = %err, "index insert failed");
            }
        }

        guard.next_id = id + 1;
        self.next_id_hint.store(guard.next_id, Ordering::Relaxed);
        self.cond.notify_all();
        Ok(())
    }

    /// Advances the cursor past `id` without writing anything (the Task's fail
    /// path, spec §4.5). Blocks until it is this id's turn, exactly like `write`.
    fn advance_past(&self, id: u64) -> Result<()> {
        let mut guard = self
            .mutex
            .lock()
            .map_err(|_| ErrorKind::Fatal(format!("{} sink mutex poisoned", self.kind.label())))?;

        while guard.next_id != id {
            guard = self
                .cond
                .wait(guard)
                .map_err(|_| ErrorKind::Fatal(format!("{} sink mutex poisoned", self.kind.label())))?;
        }

        guard.next_id = id + 1;
        self.next_id_hint.store(guard.next_id, Ordering::Relaxed);
        self.cond.notify_all();
        Ok(())
    }

    fn current_next_id(&self) -> u64 {
        self.mutex
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_id
    }
}

/// The three serialized sinks, written to in the fixed order primary ->
/// filelists -> other (spec §4.6). Fixing the order means no sink mutex is ever
/// held while waiting on another, so no cyclic wait — and thus no deadlock — is
/// possible (spec §5, "Lock ordering").
pub struct OrderedWriter {
    pub primary: Sink,
    pub filelists: Sink,
    pub other: Sink,
}

impl OrderedWriter {
    pub fn new(
        primary: (Box<dyn ChunkSink>, Option<Box<dyn IndexStore>>),
        filelists: (Box<dyn ChunkSink>, Option<Box<dyn IndexStore>>),
        other: (Box<dyn ChunkSink>, Option<Box<dyn IndexStore>>),
    ) -> Self {
        OrderedWriter {
            primary: Sink::new(SinkKind::Primary, primary.0, primary.1),
            filelists: Sink::new(SinkKind::Filelists, filelists.0, filelists.1),
            other: Sink::new(SinkKind::Other, other.0, other.1),
        }
    }

    /// Writes a fully-rendered package to all three sinks in the fixed order,
    /// blocking each on its own cursor.
    pub fn write(&self, rendered: &RenderedPackage) -> Result<()> {
        rendered.record.with_record(|record| -> Result<()> {
            self.primary.write(rendered.id, &rendered.chunks.primary, record)?;
            self.filelists.write(rendered.id, &rendered.chunks.filelists, record)?;
            self.other.write(rendered.id, &rendered.chunks.other, record)?;
            Ok(())
        })
    }

    /// Advances all three sinks' cursors past `id` without writing anything —
    /// the fail path (spec §4.5, §7): a per-Task error must not deadlock later
    /// Tasks waiting on this sink.
    pub fn advance_past(&self, id: u64) -> Result<()> {
        self.primary.advance_past(id)?;
        self.filelists.advance_past(id)?;
        self.other.advance_past(id)?;
        Ok(())
    }

    /// At quiescence, every sink should have `next_id == total_tasks` (spec §8, P2).
    pub fn is_complete(&self, total_tasks: u64) -> bool {
        self.primary.current_next_id() == total_tasks
            && self.filelists.current_next_id() == total_tasks
            && self.other.current_next_id() == total_tasks
    }
}

#[cfg(test)]
impl OrderedWriter {
    pub fn next_ids(&self) -> (u64, u64, u64) {
        (
            self.primary.current_next_id(),
            self.filelists.current_next_id(),
            self.other.current_next_id(),
        )
    }
}
