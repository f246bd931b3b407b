//! Toy collaborators used to assemble a runnable [`crate::dumper::Dumper`] for
//! `src/bin/dumper-cli.rs` and for demonstration purposes.
//!
//! None of this is format-accurate: the XML emitted by [`renderer::FlatTextRenderer`]
//! is not RPM-MD, and [`extractor::HashingExtractor`] derives `pkg_id` by hashing
//! the whole file with SHA-256 regardless of the requested [`crate::config::ChecksumType`].
//! Swap any of these out for real collaborators without touching the core crate.
pub mod extractor;
pub mod file_sink;
pub mod renderer;
pub mod sqlite_index;

pub use extractor::HashingExtractor;
pub use file_sink::FileChunkSink;
pub use renderer::FlatTextRenderer;
pub use sqlite_index::SqliteIndex;
