pub mod models;
pub mod sqlite;
pub mod trie;

use crate::error::{IndexerError, Result};
pub use models::*;
pub use trie::{identifiable_path, qualified_key, SymbolTrie, QUALIFIED_PREFIX};

/// Longest free-form string accepted by the query surface.
pub const MAX_INPUT_LEN: usize = 255;
const DENIED_CHARS: &[char] = &[';', '\'', '"'];

/// Trims `value` and checks it against the length ceiling and the character deny-list.
pub fn validate_input(value: &str) -> Result<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IndexerError::InvalidInput("input must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_INPUT_LEN {
        return Err(IndexerError::InvalidInput(format!(
            "input longer than {} characters",
            MAX_INPUT_LEN
        )));
    }
    if let Some(ch) = trimmed.chars().find(|c| DENIED_CHARS.contains(c)) {
        return Err(IndexerError::InvalidInput(format!(
            "input contains forbidden character {:?}",
            ch
        )));
    }
    Ok(trimmed)
}

/// Result of writing one file's symbols.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Symbols inserted or replaced; these need to reach the prefix index
    pub written: Vec<Symbol>,
    /// Symbols skipped because an identical definition is already stored
    pub skipped: usize,
    /// Rows removed because their names disappeared from the file
    pub pruned: usize,
    /// Identical definitions of other files that replaced removed rows
    pub promoted: Vec<Symbol>,
}

/// Persistent symbol storage used by the scan pipeline and the query surface.
pub trait SymbolStore: Send + Sync {
    /// Writes new and changed symbols of one file in a single transaction.
    fn upsert(&self, symbols: &[Symbol], file_path: &str) -> Result<WriteOutcome>;

    /// Like [`SymbolStore::upsert`], and in the same transaction drops rows of
    /// `file_path` no longer present in `symbols` and records `metadata`.
    fn index_file(
        &self,
        file_path: &str,
        symbols: &[Symbol],
        metadata: &FileMetadata,
    ) -> Result<WriteOutcome>;

    fn search_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<SymbolRef>>;
    fn get(&self, name: &str, file_path: Option<&str>) -> Result<Vec<Symbol>>;
    fn get_call_context(
        &self,
        name: &str,
        file_path: Option<&str>,
        max_depth: u32,
    ) -> Result<CallContext>;

    /// Substring match on names, optionally narrowed by a file path fragment.
    fn fuzzy_search(
        &self,
        name_fragment: &str,
        limit: usize,
        file_fragment: Option<&str>,
    ) -> Result<Vec<SymbolRef>>;
    fn symbols_in_file(&self, file_fragment: &str) -> Result<Vec<Symbol>>;
    fn list_files(&self) -> Result<Vec<String>>;

    fn file_metadata(&self, file_path: &str) -> Result<Option<FileMetadata>>;
    fn all_file_metadata(&self) -> Result<Vec<FileMetadata>>;
    /// Removes every row belonging to `file_path`.
    fn remove_file(&self, file_path: &str) -> Result<WriteOutcome>;

    /// Reloads the in-memory name -> definition hashes index from disk.
    fn reload_hash_index(&self) -> Result<()>;
    /// `(name, summary)` for every stored symbol, for rebuilding the prefix index.
    fn all_summaries(&self) -> Result<Vec<(String, SymbolSummary)>>;
    fn stats(&self) -> Result<IndexStats>;
}
