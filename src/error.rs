use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to load grammar query for {language}: {message}")]
    GrammarLoad { language: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to write symbols for {file}: {source}")]
    StoreWrite {
        file: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Overlapping edits in {file}: {first:?} and {second:?}")]
    PatchOverlap {
        file: String,
        first: (usize, usize),
        second: (usize, usize),
    },

    #[error("Content mismatch in {file} at bytes {start}..{end}")]
    PatchContentMismatch {
        file: String,
        start: usize,
        end: usize,
    },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("MCP error: {0}")]
    Mcp(String),
}

impl IndexerError {
    /// True for errors raised by patch validation, before any file is touched.
    pub fn is_patch_rejection(&self) -> bool {
        matches!(
            self,
            IndexerError::PatchOverlap { .. }
                | IndexerError::PatchContentMismatch { .. }
                | IndexerError::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
