//! Command-line driver that assembles the demo collaborators and runs a
//! directory of package files through [`repodata_dumper::dumper::Dumper`].
use std::path::PathBuf;

use clap::Parser;
use repodata_dumper::config::{ChecksumType, Config};
use repodata_dumper::demo::{FileChunkSink, FlatTextRenderer, HashingExtractor, SqliteIndex};
use repodata_dumper::dumper::{Dumper, SinkSpec};
use repodata_dumper::errors::*;

#[derive(Parser, Debug)]
#[command(name = "dumper-cli", about = "Dump repository metadata for a directory of packages")]
struct Args {
    /// Directory to scan for package files (non-recursive).
    #[arg(long)]
    package_dir: PathBuf,

    /// Directory to write primary.xml, filelists.xml and other.xml into.
    #[arg(long)]
    out_dir: PathBuf,

    /// Checksum algorithm name recorded on each package.
    #[arg(long, default_value = "sha256")]
    checksum_type: String,

    /// Number of worker threads. Defaults to the number of available cores.
    #[arg(long, env = "DUMPER_WORKERS")]
    workers: Option<u32>,

    /// Also mirror each sink into a `<sink>.sqlite3` index under `out_dir`.
    #[arg(long)]
    with_index: bool,

    /// Base path recorded as `location_base` on every emitted package.
    #[arg(long, default_value = "")]
    location_base: String,
}

fn parse_checksum_type(name: &str) -> Result<ChecksumType> {
    match name {
        "md5" => Ok(ChecksumType::Md5),
        "sha1" => Ok(ChecksumType::Sha1),
        "sha256" => Ok(ChecksumType::Sha256),
        other => Err(ErrorKind::Fatal(format!("unknown checksum type '{other}'")).into()),
    }
}

fn sink_spec(out_dir: &std::path::Path, name: &str, with_index: bool) -> Result<SinkSpec> {
    let chunk_path = out_dir.join(format!("{name}.xml"));
    let chunk_sink = FileChunkSink::create(&chunk_path)
        .chain_err(|| ErrorKind::Fatal(format!("failed to create {name} sink at {}", chunk_path.display())))?;

    let index = if with_index {
        let index_path = out_dir.join(format!("{name}.sqlite3"));
        let index = SqliteIndex::open(&index_path)
            .map_err(|e| ErrorKind::Fatal(format!("failed to open {name} index: {e}")))?;
        Some(Box::new(index) as Box<dyn repodata_dumper::sink::IndexStore>)
    } else {
        None
    };

    Ok(SinkSpec::new(Box::new(chunk_sink), index))
}

fn run() -> Result<()> {
    let args = Args::parse();

    std::fs::create_dir_all(&args.out_dir)
        .chain_err(|| ErrorKind::Fatal(format!("failed to create {}", args.out_dir.display())))?;

    let checksum_type = parse_checksum_type(&args.checksum_type)?;

    let config = Config {
        checksum_type,
        location_base: args.location_base.clone(),
        worker_count: args.workers.unwrap_or_else(|| num_cpus::get().max(1) as u32),
        use_incremental_cache: false,
        enable_primary_index: args.with_index,
        enable_filelists_index: args.with_index,
        enable_other_index: args.with_index,
        ..Config::default()
    };

    let extractor = HashingExtractor;
    let renderer = FlatTextRenderer;

    let primary = sink_spec(&args.out_dir, "primary", args.with_index)?;
    let filelists = sink_spec(&args.out_dir, "filelists", args.with_index)?;
    let other = sink_spec(&args.out_dir, "other", args.with_index)?;

    let mut dumper = Dumper::new(config, None, &extractor, &renderer, primary, filelists, other);

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&args.package_dir)
        .chain_err(|| ErrorKind::Fatal(format!("failed to read {}", args.package_dir.display())))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for path in &entries {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        dumper.submit_task(path.clone(), file_name.clone(), file_name);
    }

    tracing::info!(count = dumper.task_count(), "submitted tasks");

    let summary = dumper.run()?;
    tracing::info!(?summary, "run complete");
    println!(
        "wrote {} of {} packages ({} failed)",
        summary.written, summary.total, summary.failed
    );

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %e, "dumper-cli failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
