//! A [`ChunkSink`] that appends chunks to a file on disk.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::sink::ChunkSink;

/// Appends each chunk, in the order it is handed to it, to a buffered file
/// writer. The ordered writer guarantees that order is always id order.
pub struct FileChunkSink {
    writer: BufWriter<File>,
}

impl FileChunkSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(FileChunkSink { writer: BufWriter::new(file) })
    }
}

impl ChunkSink for FileChunkSink {
    fn append(&mut self, chunk: &str) -> io::Result<()> {
        self.writer.write_all(chunk.as_bytes())
    }
}

impl Drop for FileChunkSink {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(error = %e, "failed to flush chunk sink on drop");
        }
    }
}
