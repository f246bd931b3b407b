//! The driver: assembles collaborators, accepts Tasks in caller order, and runs
//! them through a fixed-size worker pool (spec §4.1).
use crate::buffer::ReorderBuffer;
use crate::cache::IncrementalCache;
use crate::config::Config;
use crate::errors::*;
use crate::sink::{ChunkSink, IndexStore, OrderedWriter};
use crate::task::Task;
use crate::worker::{process_task, MetadataExtractor, RunContext, TaskOutcome, XmlRenderer};

/// Tallies of how each submitted Task was disposed of. `written + failed` always
/// equals the number of submitted Tasks at quiescence (spec §8, P2); `buffered`
/// is included only as a diagnostic — every buffered entry is eventually drained
/// and counted under `written`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub written: u64,
    pub failed: u64,
    pub total: u64,
}

/// Per-sink collaborators: the chunk sink itself, plus an optional auxiliary
/// indexed store.
pub struct SinkSpec {
    pub chunk_sink: Box<dyn ChunkSink>,
    pub index: Option<Box<dyn IndexStore>>,
}

impl SinkSpec {
    pub fn new(chunk_sink: Box<dyn ChunkSink>, index: Option<Box<dyn IndexStore>>) -> Self {
        SinkSpec { chunk_sink, index }
    }
}

/// Assembles a run: the incremental cache (if any), the external extractor and
/// renderer, the three sinks, and the Tasks to process.
pub struct Dumper<'a> {
    config: Config,
    cache: Option<IncrementalCache>,
    extractor: &'a dyn MetadataExtractor,
    renderer: &'a dyn XmlRenderer,
    writer: OrderedWriter,
    tasks: Vec<Task>,
}

impl<'a> Dumper<'a> {
    pub fn new(
        config: Config,
        cache: Option<IncrementalCache>,
        extractor: &'a dyn MetadataExtractor,
        renderer: &'a dyn XmlRenderer,
        primary: SinkSpec,
        filelists: SinkSpec,
        other: SinkSpec,
    ) -> Self {
        let enable_primary_index = config.enable_primary_index;
        let enable_filelists_index = config.enable_filelists_index;
        let enable_other_index = config.enable_other_index;
        let writer = OrderedWriter::new(
            (
                primary.chunk_sink,
                if enable_primary_index { primary.index } else { None },
            ),
            (
                filelists.chunk_sink,
                if enable_filelists_index { filelists.index } else { None },
            ),
            (
                other.chunk_sink,
                if enable_other_index { other.index } else { None },
            ),
        );

        Dumper {
            config,
            cache,
            extractor,
            renderer,
            writer,
            tasks: Vec::new(),
        }
    }

    /// Enqueues one package file. Ids are assigned densely in submission order,
    /// starting at 0 (spec §3, §4.1).
    pub fn submit_task(
        &mut self,
        full_path: impl Into<std::path::PathBuf>,
        file_name: impl Into<String>,
        display_path: impl Into<String>,
    ) -> u64 {
        let id = self.tasks.len() as u64;
        self.tasks.push(Task::new(id, full_path, file_name, display_path));
        id
    }

    pub fn task_count(&self) -> u64 {
        self.tasks.len() as u64
    }

    /// Runs every submitted Task through a fixed-size pool of `worker_count`
    /// threads (falling back to `self.config.worker_count` if zero is passed)
    /// and returns once every Task has been finalized (spec §4.1, §8 P2).
    pub fn run(self) -> Result<RunSummary> {
        let Dumper {
            config,
            cache,
            extractor,
            renderer,
            writer,
            tasks,
        } = self;

        let package_count = tasks.len() as u64;
        let buffer = ReorderBuffer::new();
        let worker_count = config.worker_count.max(1) as usize;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .chain_err(|| ErrorKind::Fatal("failed to build worker thread pool".to_string()))?;

        let ctx = RunContext {
            config: &config,
            cache: cache.as_ref(),
            extractor,
            renderer,
            writer: &writer,
            buffer: &buffer,
            package_count,
        };

        let outcomes: Vec<TaskOutcome> = pool.install(|| {
            use rayon::prelude::*;
            tasks
                .into_par_iter()
                .map(|task| process_task(&ctx, task))
                .collect()
        });

        debug_assert!(buffer.is_empty(), "reorder buffer must be empty at quiescence");
        debug_assert!(
            writer.is_complete(package_count),
            "every sink cursor must reach package_count at quiescence"
        );

        let written = outcomes.iter().filter(|o| **o != TaskOutcome::Failed).count() as u64;
        let failed = outcomes.iter().filter(|o| **o == TaskOutcome::Failed).count() as u64;

        Ok(RunSummary {
            written,
            failed,
            total: package_count,
        })
    }
}
