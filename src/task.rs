//! The unit of work handed to the worker pool.
use std::path::PathBuf;

/// An immutable descriptor of one package file to process.
///
/// Created by the driver in caller-supplied order with a dense, monotonic `id`
/// starting at 0. Owned by whichever worker pops it off the queue; dropped once
/// that worker either parks its result in the reorder buffer or writes it out.
#[derive(Debug, Clone)]
pub struct Task {
    /// Dense id assigned by the driver, starting at 0. This is the order every
    /// output stream must preserve.
    pub id: u64,

    /// Full path to the package file on disk.
    pub full_path: PathBuf,

    /// Bare file name, used as the incremental cache's lookup key.
    pub file_name: String,

    /// Path recorded in the emitted metadata (`location_href`), typically the
    /// full path relative to the repository root.
    pub display_path: String,
}

impl Task {
    pub fn new(
        id: u64,
        full_path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        display_path: impl Into<String>,
    ) -> Self {
        Task {
            id,
            full_path: full_path.into(),
            file_name: file_name.into(),
            display_path: display_path.into(),
        }
    }
}
