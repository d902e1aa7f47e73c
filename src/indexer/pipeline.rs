//! Incremental scan: walk, mtime gate, parallel parse, single writer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, UNIX_EPOCH};

use crossbeam_channel::{bounded, Receiver};
use rayon::prelude::*;
use serde::Serialize;

use crate::context::IndexContext;
use crate::error::{IndexerError, Result};
use crate::index::{FileMetadata, Symbol};
use crate::indexer::{FileWalker, IndexingProgress, ParseWatchdog, Parser, SymbolExtractor};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub project_paths: Vec<PathBuf>,
    pub excludes: Vec<String>,
    pub include_suffixes: Vec<String>,
    /// `None` or negative: one worker per CPU. 0 or 1: parse on the calling thread.
    pub parallelism: Option<i64>,
    /// Re-parse files even when their mtime is unchanged
    pub force: bool,
    pub batch_size: usize,
    pub channel_capacity: usize,
    pub watchdog_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            project_paths: Vec::new(),
            excludes: Vec::new(),
            include_suffixes: Vec::new(),
            parallelism: None,
            force: false,
            batch_size: 32,
            channel_capacity: 256,
            watchdog_timeout: Duration::from_secs(5),
        }
    }
}

impl ScanOptions {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            project_paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    fn worker_count(&self) -> usize {
        match self.parallelism {
            Some(n) if n >= 0 => n as usize,
            _ => num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub files_purged: usize,
    pub symbols_written: usize,
    pub symbols_pruned: usize,
    pub warnings: usize,
    pub elapsed_ms: u64,
}

/// Parse result of one file, handed from a worker to the writer.
struct ExtractedFile {
    path: PathBuf,
    outcome: Result<(Vec<Symbol>, FileMetadata, usize)>,
}

pub(crate) fn mtime_secs(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0))
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(bytes))
}

struct Worker<'a> {
    parser: &'a Parser,
    extractor: SymbolExtractor,
    watchdog: &'a ParseWatchdog,
}

impl Worker<'_> {
    fn process(&self, path: &Path, last_modified: f64) -> ExtractedFile {
        let _guard = self.watchdog.track(path);
        let outcome = self.extract(path, last_modified);
        ExtractedFile {
            path: path.to_path_buf(),
            outcome,
        }
    }

    fn extract(&self, path: &Path, last_modified: f64) -> Result<(Vec<Symbol>, FileMetadata, usize)> {
        let bytes = std::fs::read(path)?;
        let hash = content_hash(&bytes);
        let source = String::from_utf8(bytes)
            .map_err(|_| IndexerError::Parse(format!("{} is not valid UTF-8", path.display())))?;
        let parsed = self.parser.parse_named(path, &source)?;
        let result = self.extractor.extract(&parsed, path);

        let metadata = FileMetadata {
            file_path: path.to_string_lossy().to_string(),
            last_modified,
            content_hash: hash,
            symbol_count: result.symbols.len(),
        };
        Ok((result.symbols, metadata, result.warnings))
    }
}

/// Scans every project path into the context's store and trie.
pub fn scan(
    ctx: &IndexContext,
    options: &ScanOptions,
    progress: Option<&IndexingProgress>,
) -> Result<ScanReport> {
    let started = Instant::now();

    let mut roots = Vec::with_capacity(options.project_paths.len());
    for path in &options.project_paths {
        if !path.exists() {
            return Err(IndexerError::PathNotFound(path.display().to_string()));
        }
        roots.push(path.canonicalize()?);
    }

    ctx.store().reload_hash_index()?;
    ctx.rebuild_trie()?;

    let walker = FileWalker::new(ctx.registry_arc())
        .with_excludes(&options.excludes)?
        .with_suffixes(&options.include_suffixes);

    let mut files = Vec::new();
    let mut seen = HashSet::new();
    for root in &roots {
        for file in walker.walk(root)? {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    let mut report = ScanReport {
        files_seen: files.len(),
        ..ScanReport::default()
    };
    if let Some(progress) = progress {
        progress.start(files.len());
    }

    let mut pending = Vec::new();
    for file in files {
        let mtime = match mtime_secs(&file) {
            Ok(mtime) => mtime,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", file.display(), e);
                report.files_failed += 1;
                if let Some(progress) = progress {
                    progress.inc_error();
                }
                continue;
            }
        };
        if !options.force {
            let stored = ctx.store().file_metadata(&file.to_string_lossy())?;
            if stored.is_some_and(|m| m.last_modified == mtime) {
                report.files_skipped += 1;
                if let Some(progress) = progress {
                    progress.inc_skipped();
                }
                continue;
            }
        }
        pending.push((file, mtime));
    }

    tracing::debug!(
        "{} of {} files need parsing",
        pending.len(),
        report.files_seen
    );

    let parser = Parser::new(ctx.registry_arc());
    let watchdog = ParseWatchdog::start(options.watchdog_timeout);
    let worker = Worker {
        parser: &parser,
        extractor: SymbolExtractor::new(),
        watchdog: &watchdog,
    };
    let batch_size = options.batch_size.max(1);
    let workers = options.worker_count();

    if workers <= 1 {
        let mut batch = Vec::with_capacity(batch_size);
        for (path, mtime) in &pending {
            batch.push(worker.process(path, *mtime));
            if batch.len() >= batch_size {
                write_batch(ctx, &mut batch, &mut report, progress);
            }
        }
        write_batch(ctx, &mut batch, &mut report, progress);
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("indexer-worker-{}", i))
            .build()
            .map_err(|e| IndexerError::Io(std::io::Error::other(e.to_string())))?;
        let (tx, rx) = bounded::<ExtractedFile>(options.channel_capacity.max(1));

        std::thread::scope(|scope| {
            let worker = &worker;
            let pending = &pending;
            let pool = &pool;
            scope.spawn(move || {
                pool.install(|| {
                    pending.par_iter().for_each_with(tx, |tx, (path, mtime)| {
                        // The writer only stops once every sender is gone.
                        let _ = tx.send(worker.process(path, *mtime));
                    });
                });
            });
            drain(ctx, &rx, batch_size, &mut report, progress);
        });
    }

    report.files_purged = purge_vanished(ctx, &roots)?;
    if report.files_purged > 0 || report.symbols_pruned > 0 {
        ctx.rebuild_trie()?;
    }
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    if let Some(progress) = progress {
        progress.finish();
    }

    tracing::info!(
        "Scan finished in {} ms: {} files, {} parsed, {} unchanged, {} failed, {} purged, {} symbols written",
        report.elapsed_ms,
        report.files_seen,
        report.files_parsed,
        report.files_skipped,
        report.files_failed,
        report.files_purged,
        report.symbols_written
    );
    Ok(report)
}

/// Writer loop: blocks for one result, then takes whatever else is ready up to a batch.
fn drain(
    ctx: &IndexContext,
    rx: &Receiver<ExtractedFile>,
    batch_size: usize,
    report: &mut ScanReport,
    progress: Option<&IndexingProgress>,
) {
    let mut batch = Vec::with_capacity(batch_size);
    while let Ok(first) = rx.recv() {
        batch.push(first);
        while batch.len() < batch_size {
            match rx.try_recv() {
                Ok(next) => batch.push(next),
                Err(_) => break,
            }
        }
        write_batch(ctx, &mut batch, report, progress);
    }
}

fn write_batch(
    ctx: &IndexContext,
    batch: &mut Vec<ExtractedFile>,
    report: &mut ScanReport,
    progress: Option<&IndexingProgress>,
) {
    for item in batch.drain(..) {
        let (symbols, metadata, warnings) = match item.outcome {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", item.path.display(), e);
                report.files_failed += 1;
                if let Some(progress) = progress {
                    progress.inc_error();
                }
                continue;
            }
        };
        report.warnings += warnings;

        match ctx
            .store()
            .index_file(&metadata.file_path, &symbols, &metadata)
        {
            Ok(outcome) => {
                ctx.insert_into_trie(&outcome.written);
                ctx.insert_into_trie(&outcome.promoted);
                report.files_parsed += 1;
                report.symbols_written += outcome.written.len();
                report.symbols_pruned += outcome.pruned;
                if let Some(progress) = progress {
                    progress.inc(outcome.written.len());
                }
                tracing::debug!(
                    "Indexed {}: {} symbols, {} written",
                    metadata.file_path,
                    symbols.len(),
                    outcome.written.len()
                );
            }
            Err(e) => {
                tracing::warn!("{}", e);
                report.files_failed += 1;
                if let Some(progress) = progress {
                    progress.inc_error();
                }
            }
        }
    }
}

/// Drops stored files under `roots` that no longer exist on disk.
fn purge_vanished(ctx: &IndexContext, roots: &[PathBuf]) -> Result<usize> {
    let mut purged = 0;
    for metadata in ctx.store().all_file_metadata()? {
        let path = Path::new(&metadata.file_path);
        if !roots.iter().any(|root| path.starts_with(root)) || path.exists() {
            continue;
        }
        let outcome = ctx.store().remove_file(&metadata.file_path)?;
        ctx.insert_into_trie(&outcome.promoted);
        tracing::debug!("Purged {} ({} symbols)", metadata.file_path, outcome.pruned);
        purged += 1;
    }
    Ok(purged)
}
