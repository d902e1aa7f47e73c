pub mod extractor;
pub mod live;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod skeleton;
pub mod walker;
pub mod watchdog;

pub use extractor::{ExtractionResult, SymbolExtractor};
pub use live::{LiveFile, LiveFiles};
pub use parser::{ParsedFile, Parser};
pub use pipeline::{content_hash, scan, ScanOptions, ScanReport};
pub use progress::{IndexingProgress, ProgressSnapshot};
pub use skeleton::SourceSkeleton;
pub use walker::FileWalker;
pub use watchdog::{ParseGuard, ParseWatchdog};
