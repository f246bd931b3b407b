//! The `Package record`: metadata produced by the (external) extractor for one package.
use crate::config::ChecksumType;

/// Metadata extracted from a single package file.
///
/// Every string field is owned directly by the record (rather than borrowed from
/// some caller-scoped arena), so a `PackageRecord` has a single, clear owner and
/// needs no separate arena bookkeeping — see the "String ownership on buffering"
/// note in `DESIGN.md`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: String,

    /// Content checksum of the package file (`pkgId` in the original C naming).
    pub pkg_id: String,

    /// Name of the checksum algorithm used to compute `pkg_id`, e.g. `"sha256"`.
    pub checksum_type_name: String,

    /// Size of the package file in bytes.
    pub size_package: u64,

    /// Modification time of the package file (seconds since the Unix epoch).
    pub time_file: i64,

    /// Start offset of the package header within the file.
    pub header_start: u64,

    /// End offset of the package header within the file.
    pub header_end: u64,

    /// Changelog entries, most recent first, truncated to the extractor's
    /// configured `changelog_limit`.
    pub changelog: Vec<ChangelogEntry>,

    /// Location of the package file relative to the repository root, as recorded
    /// in the emitted metadata. Mutated in place on a cache hit (§4.2).
    pub location_href: String,

    /// Base location prefix, as recorded in the emitted metadata. Mutated in
    /// place on a cache hit (§4.2).
    pub location_base: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChangelogEntry {
    pub author: String,
    pub timestamp: i64,
    pub text: String,
}

impl PackageRecord {
    /// Whether this record is still fresh for a Task whose file has the given
    /// `(mtime, size)` stat and whose run wants `checksum_type`. Implements the
    /// freshness predicate from §4.2 (the `file_name` match is the caller's
    /// responsibility, as a `HashMap` key lookup).
    pub fn is_fresh_for(&self, mtime: i64, size: u64, checksum_type: ChecksumType) -> bool {
        self.time_file == mtime
            && self.size_package == size
            && self.checksum_type_name == checksum_type.name()
    }
}
