//! The result of rendering one Task: three XML chunks plus the record they came from.
use std::sync::{Arc, Mutex};

use crate::record::PackageRecord;

/// The three independently-ordered XML chunks produced for one package.
#[derive(Debug, Clone)]
pub struct XmlChunks {
    pub primary: String,
    pub filelists: String,
    pub other: String,
}

/// Tracks where a [`PackageRecord`] came from, which determines ownership on
/// disposal (spec §3, "Origin tag").
///
/// `Fresh` records are produced by the extractor and owned outright: they are
/// dropped like any other Rust value once the `RenderedPackage` goes out of
/// scope. `Cached` records are shared with the incremental cache via `Arc`: the
/// cache keeps its own `Arc` alive for the whole run, so a worker's clone can
/// never be the one that deallocates it (see the "Cache record ownership" note
/// in `DESIGN.md` for why this gives P7 "for free").
#[derive(Clone)]
pub enum PackageHandle {
    Fresh(Arc<PackageRecord>),
    Cached(Arc<Mutex<PackageRecord>>),
}

impl PackageHandle {
    pub fn origin(&self) -> Origin {
        match self {
            PackageHandle::Fresh(_) => Origin::Fresh,
            PackageHandle::Cached(_) => Origin::Cached,
        }
    }

    /// Runs `f` with a reference to the underlying record. For `Cached` handles
    /// this briefly locks the per-record mutex; contention is not expected since
    /// the cache's freshness contract hands out a given record to at most one
    /// in-flight Task at a time.
    pub fn with_record<R>(&self, f: impl FnOnce(&PackageRecord) -> R) -> R {
        match self {
            PackageHandle::Fresh(record) => f(record),
            PackageHandle::Cached(record) => {
                let guard = record.lock().unwrap_or_else(|e| e.into_inner());
                f(&guard)
            }
        }
    }
}

/// Origin tag used for property tests and logging; ownership itself is carried
/// by [`PackageHandle`] rather than by this tag (see design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Fresh,
    Cached,
}

/// The fully-rendered output for one Task, ready to be written or buffered.
pub struct RenderedPackage {
    pub id: u64,
    pub chunks: XmlChunks,
    pub record: PackageHandle,
}

impl RenderedPackage {
    pub fn origin(&self) -> Origin {
        self.record.origin()
    }
}
