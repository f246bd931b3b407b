//! The incremental cache: lets workers skip extraction when a prior run's metadata
//! for a package file is still valid.
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::ChecksumType;
use crate::errors::*;
use crate::record::PackageRecord;

/// Mapping from file name to a previously computed [`PackageRecord`], populated
/// before the run from a prior metadata snapshot.
///
/// Records are stored behind `Arc<Mutex<_>>` rather than cloned out on every hit:
/// the cache itself holds one `Arc` for the entire run, so handing a clone to a
/// worker can never be the clone that frees the record (see `DESIGN.md`). The
/// `Mutex` exists solely to let a cache hit overwrite `location_href`/
/// `location_base` in place, matching the "deliberate destructive update of cache
/// state" called out in spec §4.2; it is never held across anything but that
/// short update and the (equally short) render/write calls that follow.
pub struct IncrementalCache {
    entries: HashMap<String, Arc<Mutex<PackageRecord>>>,
}

impl IncrementalCache {
    /// Builds a cache from a prior run's metadata snapshot, keyed by file name.
    pub fn from_records(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| {
                let key = record.location_href.rsplit('/').next().unwrap_or("").to_string();
                (key, Arc::new(Mutex::new(record)))
            })
            .collect();
        IncrementalCache { entries }
    }

    /// Builds a cache directly from `(file_name, record)` pairs, for callers that
    /// already have the lookup key (e.g. tests, or a loader that indexes by name).
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, PackageRecord)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(name, record)| (name, Arc::new(Mutex::new(record))))
            .collect();
        IncrementalCache { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Implements §4.2's `try_reuse`.
    ///
    /// Looks up `file_name`; a miss returns `Ok(None)` without touching the disk.
    /// On a hit, if `skip_stat` is set the record is accepted unconditionally;
    /// otherwise the file is `stat`-ed and the record is accepted only if
    /// `(mtime, size, checksum_type_name)` all agree with it. A `stat` failure on
    /// a Task whose cache entry might have been used is reported as `Io` — fatal
    /// for that Task only, per §4.2.
    ///
    /// On acceptance, `location_href`/`location_base` are overwritten in place to
    /// reflect `location_href`/`location_base` for the current run.
    pub fn try_reuse(
        &self,
        file_name: &str,
        full_path: &Path,
        checksum_type: ChecksumType,
        skip_stat: bool,
        location_href: &str,
        location_base: &str,
    ) -> Result<Option<Arc<Mutex<PackageRecord>>>> {
        let Some(entry) = self.entries.get(file_name) else {
            return Ok(None);
        };

        let accept = if skip_stat {
            true
        } else {
            let meta = fs::metadata(full_path)
                .chain_err(|| ErrorKind::Io(full_path.to_path_buf()))?;
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let size = meta.len();
            let guard = entry.lock().unwrap_or_else(|e| e.into_inner());
            guard.is_fresh_for(mtime, size, checksum_type)
        };

        if !accept {
            tracing::debug!(file_name, "cached metadata is stale, will re-extract");
            return Ok(None);
        }

        tracing::debug!(file_name, "cache hit");
        {
            let mut guard = entry.lock().unwrap_or_else(|e| e.into_inner());
            guard.location_href = location_href.to_string();
            guard.location_base = location_base.to_string();
        }

        Ok(Some(Arc::clone(entry)))
    }
}
