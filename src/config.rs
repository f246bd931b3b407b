//! Run configuration for the dumping core.
//!
//! This is exactly the configuration surface enumerated in the specification:
//! nothing here decides *how* packages are found on disk or *how* the repository
//! is laid out — that is left to whatever assembles a [`Config`] and feeds
//! [`crate::task::Task`]s to the [`crate::dumper::Dumper`].
use std::fmt;

/// Checksum algorithm used both for the package file's content checksum and for
/// the freshness comparison against a cached [`crate::record::PackageRecord`].
///
/// Mirrors `cr_ChecksumType` from the original `constants.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumType {
    /// The lowercase name stored as `checksum_type_name` on a [`crate::record::PackageRecord`].
    pub fn name(self) -> &'static str {
        match self {
            ChecksumType::Md5 => "md5",
            ChecksumType::Sha1 => "sha1",
            ChecksumType::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The reorder buffer's fixed capacity. A compile-time constant per spec §6.
pub const MAX_BUFFER: usize = 20;

/// Configuration for a single dumping run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Checksum algorithm to request from the extractor and to compare against
    /// cached records.
    pub checksum_type: ChecksumType,

    /// Maximum number of changelog entries the extractor should keep per package.
    pub changelog_limit: u32,

    /// When set, a cache hit is accepted unconditionally without `stat`-ing the
    /// package file (scenario 6 in spec §8).
    pub skip_stat: bool,

    /// Base path recorded as `location_base` on every [`crate::record::PackageRecord`],
    /// including ones served from the incremental cache.
    pub location_base: String,

    /// Whether the incremental cache should be consulted at all.
    pub use_incremental_cache: bool,

    /// Whether the primary sink should mirror records into its auxiliary indexed store.
    pub enable_primary_index: bool,

    /// Whether the filelists sink should mirror records into its auxiliary indexed store.
    pub enable_filelists_index: bool,

    /// Whether the other sink should mirror records into its auxiliary indexed store.
    pub enable_other_index: bool,

    /// Size of the worker pool. Any value `>= 1` is valid.
    pub worker_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            checksum_type: ChecksumType::Sha256,
            changelog_limit: 10,
            skip_stat: false,
            location_base: String::new(),
            use_incremental_cache: true,
            enable_primary_index: true,
            enable_filelists_index: true,
            enable_other_index: true,
            worker_count: num_cpus::get().max(1) as u32,
        }
    }
}
