pub mod config;
pub mod context;
pub mod error;
pub mod index;
pub mod indexer;
pub mod languages;
pub mod mcp;
pub mod patch;

pub use config::IndexerConfig;
pub use context::{build_index, IndexContext};
pub use error::{IndexerError, Result};
pub use index::sqlite::SqliteIndex;
pub use index::{
    CallContext, Completion, FileMetadata, IndexStats, Symbol, SymbolContent, SymbolKind,
    SymbolLocation, SymbolRef, SymbolStore, SymbolSummary, SymbolTrie,
};
pub use indexer::{
    ExtractionResult, FileWalker, IndexingProgress, Parser, ScanOptions, ScanReport,
    SourceSkeleton, SymbolExtractor,
};
pub use languages::LanguageRegistry;
pub use mcp::McpServer;
pub use patch::{PatchEdit, PatchEngine, PatchRequest};
