//! Error types for the dumping core.
//!
//! Per-Task errors (`Io`, `Extract`, `Render`) move a Task to the fail path: they are
//! logged and do not abort the run. Write-time errors (`Write`, `IndexInsert`) are
//! likewise logged and skipped; the affected sink's cursor still advances. Only
//! `Fatal` — an inability to honor the ordering contract, such as a poisoned lock —
//! aborts the run.
use std::path::PathBuf;

error_chain::error_chain! {
    errors {
        /// Failed to `stat` a package file while checking cache freshness.
        Io(path: PathBuf) {
            description("i/o error")
            display("i/o error while stat-ing '{}'", path.to_string_lossy())
        }
        /// The metadata extractor failed for a given package path.
        Extract(path: PathBuf) {
            description("extraction error")
            display("failed to extract metadata from '{}'", path.to_string_lossy())
        }
        /// The XML renderer failed for a given package name.
        Render(name: String) {
            description("render error")
            display("failed to render metadata for package '{}'", name)
        }
        /// Appending a chunk to one of the three sinks failed.
        Write(sink: &'static str, id: u64) {
            description("write error")
            display("failed to append chunk {} to the {} sink", id, sink)
        }
        /// Inserting a record into a sink's auxiliary indexed store failed.
        IndexInsert(sink: &'static str, id: u64) {
            description("index insert error")
            display("failed to insert record {} into the {} index", id, sink)
        }
        /// The ordering contract itself could not be upheld (e.g. a poisoned mutex).
        /// Unlike every other variant, this one is never logged-and-skipped: it
        /// terminates the run.
        Fatal(reason: String) {
            description("fatal ordering error")
            display("fatal error in the ordered writer: {}", reason)
        }
    }
}
