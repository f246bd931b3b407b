//! A toy [`MetadataExtractor`] that hashes the whole package file with SHA-256.
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::ChecksumType;
use crate::record::PackageRecord;
use crate::worker::MetadataExtractor;

/// Derives a [`PackageRecord`] from a package file's stat info and content hash.
///
/// Real implementations parse the package's actual header/metadata; this one
/// treats the whole file as opaque bytes, which is enough to exercise the core's
/// ordering and caching machinery end to end.
pub struct HashingExtractor;

impl MetadataExtractor for HashingExtractor {
    fn extract(
        &self,
        path: &Path,
        checksum_type: ChecksumType,
        _changelog_limit: u32,
        location_href: &str,
        location_base: &str,
    ) -> std::io::Result<PackageRecord> {
        let bytes = fs::read(path)?;
        let meta = fs::metadata(path)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let pkg_id = format!("{:x}", hasher.finalize());

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let time_file = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(PackageRecord {
            name,
            pkg_id,
            checksum_type_name: checksum_type.name().to_string(),
            size_package: meta.len(),
            time_file,
            header_start: 0,
            header_end: bytes.len() as u64,
            changelog: Vec::new(),
            location_href: location_href.to_string(),
            location_base: location_base.to_string(),
        })
    }
}
