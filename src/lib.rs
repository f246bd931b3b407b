//! Ordered, parallel repository-metadata dumping core.
//!
//! This crate implements the hard part of a repository metadata generator: a
//! worker pool that processes package files in any order but serializes writes to
//! three independent ordered streams (`primary`, `filelists`, `other`) while
//! bounding memory via a sorted reorder buffer, plus an incremental cache that
//! lets workers skip per-package extraction when previously computed metadata is
//! still valid.
//!
//! What it deliberately does *not* do: define the package-file format, the XML
//! schema emitted, an indexed store's on-disk schema, configuration loading, file
//! system enumeration, or a CLI — those are external collaborators whose
//! interfaces ([`worker::MetadataExtractor`], [`worker::XmlRenderer`],
//! [`sink::ChunkSink`], [`sink::IndexStore`]) this crate consumes. See
//! `src/demo` and `src/bin/dumper-cli.rs` for a toy assembly of all four.
#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::manual_filter_map,
        clippy::map_unwrap_or,
        clippy::module_name_repetitions,
        clippy::print_stdout,
        clippy::unwrap_used,
    )
)]

pub mod buffer;
pub mod cache;
pub mod config;
pub mod demo;
pub mod dumper;
pub mod errors;
pub mod record;
pub mod rendered;
pub mod sink;
pub mod task;
pub mod worker;
