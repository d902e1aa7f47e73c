use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use symbol_indexer::config::IndexerConfig;
use symbol_indexer::error::{IndexerError, Result};
use symbol_indexer::indexer::{IndexingProgress, ScanReport, SourceSkeleton};
use symbol_indexer::mcp::McpServer;
use symbol_indexer::patch::{PatchEdit, PatchEngine, PatchRequest};
use symbol_indexer::{IndexContext, LanguageRegistry};

#[derive(Parser)]
#[command(name = "symbol-indexer")]
#[command(about = "Symbol index and byte-range patch tool built on tree-sitter")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Index the current directory
    symbol-indexer index

    # Index two trees, skipping vendored code, with 8 workers
    symbol-indexer index ./src ./lib --exclude '*/vendor/*' --parallelism 8

    # Prefix search and definitions
    symbol-indexer search parse_
    symbol-indexer get Server.Start --file server.go

    # Definitions reachable from a symbol, two calls deep
    symbol-indexer context main --depth 2

    # Completion, including file-scoped composite prefixes
    symbol-indexer complete 'symbol:a.c/main,d'

    # Source of two definitions, then the same as JSON with locations
    symbol-indexer content 'symbol:src/a.c/main,debug'
    symbol-indexer content 'symbol:src/a.c/main,debug' --json

    # Completion against a file as it is on disk right now
    symbol-indexer complete-realtime 'symbol:src/a.c/ma'

    # Outline of a file with bodies elided
    symbol-indexer skeleton src/server.py

    # Preview and apply edits described in a JSON file
    symbol-indexer diff edits.json
    symbol-indexer apply edits.json

    # Start the MCP server on stdio
    symbol-indexer serve
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the index database (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: .symbol-indexer.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan directories into the index
    Index {
        /// Directories to scan (default: config project_paths, else ".")
        paths: Vec<PathBuf>,

        /// Glob pattern of files to skip, matched against absolute paths
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        /// Only index files with this suffix, e.g. .py
        #[arg(long = "suffix")]
        suffixes: Vec<String>,

        /// Worker threads; 0 or 1 parses inline, negative uses every CPU
        #[arg(long, allow_hyphen_values = true)]
        parallelism: Option<i64>,

        /// Re-parse files whose modification time is unchanged
        #[arg(long)]
        force: bool,

        /// Hide the progress bar
        #[arg(long, short)]
        quiet: bool,
    },

    /// Start the MCP server on stdio
    Serve,

    /// Symbols whose name starts with a prefix
    Search {
        prefix: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show the stored definitions of a symbol
    Get {
        name: String,

        /// Fragment of the file path
        #[arg(long)]
        file: Option<String>,
    },

    /// Show a symbol and the definitions it calls
    Context {
        name: String,

        #[arg(long)]
        file: Option<String>,

        /// Call levels to follow (0-10)
        #[arg(long, default_value = "2")]
        depth: u32,
    },

    /// Complete a bare or `symbol:<file>/<name>` prefix
    Complete {
        prefix: String,

        /// Max results (clamped to 1-50)
        #[arg(long)]
        max: Option<usize>,

        /// Print `symbol:<file>/<name>` lines only
        #[arg(long)]
        simple: bool,
    },

    /// Print the current source of `symbol:<file>/<a>,<b>` or of bare names
    Content {
        symbol: String,

        /// File to read, or a fragment of an indexed path
        #[arg(long)]
        file: Option<String>,

        /// Print name, file, content and location of each definition as JSON
        #[arg(long)]
        json: bool,
    },

    /// Complete a prefix, re-parsing the file named by `symbol:<path>/` when it changed
    CompleteRealtime {
        prefix: String,

        #[arg(long)]
        max: Option<usize>,
    },

    /// Print a file outline with every body elided
    Skeleton { path: PathBuf },

    /// List indexed files
    Files,

    /// Show index statistics
    Stats,

    /// Print the unified diff of the edits in a JSON file
    Diff {
        /// JSON array of {file_path, start, end, expected, replacement}
        edits: PathBuf,
    },

    /// Apply the edits in a JSON file
    Apply { edits: PathBuf },
}

pub fn load_config(cli: &Cli) -> Result<IndexerConfig> {
    let mut config = IndexerConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

pub fn open_context(config: &IndexerConfig) -> Result<IndexContext> {
    IndexContext::open(&config.db_path)
}

#[allow(clippy::too_many_arguments)]
pub fn index_directories(
    config: &IndexerConfig,
    paths: Vec<PathBuf>,
    excludes: Vec<String>,
    suffixes: Vec<String>,
    parallelism: Option<i64>,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let mut options = config.scan_options();
    if !paths.is_empty() {
        options.project_paths = paths;
    } else if options.project_paths.is_empty() {
        options.project_paths = vec![PathBuf::from(".")];
    }
    options.excludes.extend(excludes);
    if !suffixes.is_empty() {
        options.include_suffixes = suffixes;
    }
    if parallelism.is_some() {
        options.parallelism = parallelism;
    }
    options.force = force;

    let ctx = open_context(config)?;
    let progress = IndexingProgress::new();

    let report = if quiet {
        ctx.scan_with_progress(&options, &progress)?
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let report = std::thread::scope(|scope| {
            let handle = scope.spawn(|| ctx.scan_with_progress(&options, &progress));
            while !handle.is_finished() {
                let snapshot = progress.snapshot();
                bar.set_length(snapshot.files_total as u64);
                bar.set_position(snapshot.files_processed as u64);
                bar.set_message(format!("{} symbols", snapshot.symbols_written));
                std::thread::sleep(Duration::from_millis(100));
            }
            handle
                .join()
                .unwrap_or_else(|_| Err(IndexerError::Parse("scan thread panicked".to_string())))
        })?;
        bar.finish_and_clear();
        report
    };

    print_report(&report, &config.db_path);
    Ok(())
}

fn print_report(report: &ScanReport, db_path: &Path) {
    println!(
        "Scanned {} files into {}: {} parsed, {} unchanged, {} failed, {} purged",
        report.files_seen,
        db_path.display(),
        report.files_parsed,
        report.files_skipped,
        report.files_failed,
        report.files_purged
    );
    println!(
        "{} symbols written, {} pruned in {} ms",
        report.symbols_written, report.symbols_pruned, report.elapsed_ms
    );
}

pub async fn run_mcp_server(config: &IndexerConfig) -> Result<()> {
    use rmcp::ServiceExt;

    let ctx = Arc::new(open_context(config)?);
    tracing::info!("Serving {} over stdio", config.db_path.display());
    let server = McpServer::new(ctx);

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server
        .serve(transport)
        .await
        .map_err(|e| IndexerError::Mcp(e.to_string()))?;
    service
        .waiting()
        .await
        .map_err(|e| IndexerError::Mcp(e.to_string()))?;

    Ok(())
}

pub fn search(config: &IndexerConfig, prefix: &str, limit: usize) -> Result<()> {
    let ctx = open_context(config)?;
    let results = ctx.search(prefix, limit)?;

    if results.is_empty() {
        println!("No symbols found for prefix: {}", prefix);
        return Ok(());
    }
    for r in results {
        println!("{} - {}", r.name, r.file_path);
    }
    Ok(())
}

pub fn get(config: &IndexerConfig, name: &str, file: Option<&str>) -> Result<()> {
    let ctx = open_context(config)?;
    let symbols = ctx.get(name, file)?;

    if symbols.is_empty() {
        println!("No definition found for: {}", name);
        return Ok(());
    }
    for symbol in symbols {
        println!(
            "{} ({}) - {}:{}",
            symbol.name,
            symbol.kind.as_str(),
            symbol.file_path,
            symbol.start_line + 1
        );
        println!("  Signature: {}", symbol.signature);
        if !symbol.calls.is_empty() {
            println!("  Calls: {}", symbol.calls.join(", "));
        }
    }
    Ok(())
}

pub fn context(config: &IndexerConfig, name: &str, file: Option<&str>, depth: u32) -> Result<()> {
    let ctx = open_context(config)?;
    let context = ctx.context(name, file, depth)?;

    for definition in &context.definitions {
        println!("# {} ({})", definition.name, definition.file_path);
        println!("{}\n", definition.full_definition);
    }
    Ok(())
}

pub fn complete(config: &IndexerConfig, prefix: &str, max: Option<usize>, simple: bool) -> Result<()> {
    let ctx = open_context(config)?;
    if simple {
        for line in ctx.complete_simple(prefix, max)? {
            println!("{}", line);
        }
        return Ok(());
    }
    for completion in ctx.complete(prefix, max)? {
        println!(
            "{}  {}  ({})",
            completion.name, completion.details.signature, completion.details.file_path
        );
    }
    Ok(())
}

pub fn content(config: &IndexerConfig, symbol: &str, file: Option<&str>, json: bool) -> Result<()> {
    let ctx = open_context(config)?;
    if json {
        let contents = ctx.symbol_content(symbol, file)?;
        println!("{}", serde_json::to_string_pretty(&contents)?);
    } else {
        println!("{}", ctx.symbol_text(symbol, file)?);
    }
    Ok(())
}

pub fn complete_realtime(config: &IndexerConfig, prefix: &str, max: Option<usize>) -> Result<()> {
    let ctx = open_context(config)?;
    for completion in ctx.complete_realtime(prefix, max)? {
        println!(
            "{}  {}  ({})",
            completion.name, completion.details.signature, completion.details.file_path
        );
    }
    Ok(())
}

pub fn skeleton(path: &Path) -> Result<()> {
    let skeleton = SourceSkeleton::new(Arc::new(LanguageRegistry::new()));
    print!("{}", skeleton.generate(path)?);
    Ok(())
}

pub fn files(config: &IndexerConfig) -> Result<()> {
    let ctx = open_context(config)?;
    for file in ctx.list_files()? {
        println!("{}", file);
    }
    Ok(())
}

pub fn stats(config: &IndexerConfig) -> Result<()> {
    let ctx = open_context(config)?;
    let stats = ctx.stats()?;

    println!("Index Statistics:");
    println!("  Total files: {}", stats.total_files);
    println!("  Total symbols: {}", stats.total_symbols);
    println!();
    println!("Symbols by kind:");
    for (kind, count) in &stats.symbols_by_kind {
        println!("  {}: {}", kind, count);
    }
    Ok(())
}

fn read_edits(path: &Path) -> Result<PatchRequest> {
    let content = fs::read_to_string(path)?;
    let edits: Vec<PatchEdit> = serde_json::from_str(&content)?;
    Ok(PatchRequest::from_edits(edits))
}

pub fn diff(edits: &Path) -> Result<()> {
    let request = read_edits(edits)?;
    let diff = PatchEngine::new().generate_diff(&request)?;
    if diff.is_empty() {
        println!("No changes");
    } else {
        print!("{}", diff);
    }
    Ok(())
}

pub fn apply(edits: &Path) -> Result<()> {
    let request = read_edits(edits)?;
    let written = PatchEngine::new().apply(&request)?;
    if written.is_empty() {
        println!("No changes");
    }
    for (path, content) in &written {
        println!("Patched {} ({} bytes)", path, content.len());
    }
    Ok(())
}
