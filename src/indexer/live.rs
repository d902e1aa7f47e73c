//! Per-file symbol tables kept in step with the file on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::index::{qualified_key, Completion, Symbol, SymbolTrie};
use crate::indexer::extractor::SymbolExtractor;
use crate::indexer::parser::Parser;
use crate::indexer::pipeline::mtime_secs;
use crate::languages::LanguageRegistry;

/// Symbols of one file as of `modified`.
pub struct LiveFile {
    pub path: String,
    /// Seconds since the Unix epoch
    pub modified: f64,
    pub symbols: Vec<Symbol>,
    trie: SymbolTrie,
}

impl LiveFile {
    fn new(path: String, modified: f64, symbols: Vec<Symbol>) -> Self {
        let trie =
            SymbolTrie::from_symbols(symbols.iter().map(|s| (s.name.clone(), s.summary())));
        Self {
            path,
            modified,
            symbols,
            trie,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Names of this file starting with `partial`, in key order.
    pub fn complete(&self, partial: &str, max_results: usize) -> Vec<Completion> {
        let scope = qualified_key(&self.path, "");
        self.trie
            .search_prefix(&format!("{}{}", scope, partial), Some(max_results))
            .into_iter()
            .map(|c| Completion {
                name: c.name[scope.len()..].to_string(),
                details: c.details,
            })
            .collect()
    }
}

/// Parses files on request and re-parses them once their modification time moves.
pub struct LiveFiles {
    parser: Parser,
    extractor: SymbolExtractor,
    files: Mutex<HashMap<PathBuf, Arc<LiveFile>>>,
}

impl LiveFiles {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self {
            parser: Parser::new(registry),
            extractor: SymbolExtractor::new(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// True when `path` is an existing file with a registered grammar.
    pub fn supports(&self, path: &Path) -> bool {
        path.is_file() && self.parser.registry().get_for_file(path).is_some()
    }

    pub fn load(&self, path: &Path) -> Result<Arc<LiveFile>> {
        let modified = mtime_secs(path)?;
        if let Some(file) = self.files.lock().get(path) {
            if file.modified == modified {
                return Ok(Arc::clone(file));
            }
        }

        let parsed = self.parser.parse_file(path)?;
        let symbols = self.extractor.extract(&parsed, path).symbols;
        tracing::debug!(
            "Re-parsed {} ({} symbols)",
            path.display(),
            symbols.len()
        );

        let file = Arc::new(LiveFile::new(
            path.to_string_lossy().to_string(),
            modified,
            symbols,
        ));
        self.files
            .lock()
            .insert(path.to_path_buf(), Arc::clone(&file));
        Ok(file)
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}
