use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{IndexerError, Result};
use crate::index::sqlite::SqliteIndex;
use crate::index::{
    definition_hash, qualified_key, CallContext, Completion, IndexStats, Symbol, SymbolContent,
    SymbolRef, SymbolStore, SymbolTrie, QUALIFIED_PREFIX,
};
use crate::indexer::{scan, IndexingProgress, LiveFiles, ScanOptions, ScanReport, SourceSkeleton};
use crate::languages::LanguageRegistry;

pub const DEFAULT_COMPLETIONS: usize = 10;
pub const MAX_COMPLETIONS: usize = 50;

/// Owns the symbol store, the prefix trie and the grammar registry.
/// Every query, scan and server entry point works against one of these.
pub struct IndexContext {
    store: Arc<dyn SymbolStore>,
    trie: RwLock<SymbolTrie>,
    registry: Arc<LanguageRegistry>,
    live: LiveFiles,
}

/// Splits a composite prefix `symbol:<file>/<a>,<b>,<partial>` into the
/// already-chosen head (`symbol:<file>/<a>,<b>,`), the file scope
/// (`symbol:<file>/`) and the partial name.
fn split_composite(prefix: &str) -> Option<(&str, &str, &str)> {
    if !prefix.starts_with(QUALIFIED_PREFIX) {
        return None;
    }
    let slash = prefix.rfind('/')?;
    let comma = prefix.rfind(',')?;
    if comma < slash {
        return None;
    }
    Some((&prefix[..=comma], &prefix[..=slash], &prefix[comma + 1..]))
}

/// Splits `symbol:<file>/<a>,<b>` into its file and names. Without the
/// `symbol:` form the whole argument is a comma-separated name list.
fn split_symbol_path(symbol_path: &str) -> Result<(Option<&str>, Vec<&str>)> {
    let (file, names) = match symbol_path.strip_prefix(QUALIFIED_PREFIX) {
        Some(rest) => match rest.rsplit_once('/') {
            Some((file, names)) => (Some(file), names),
            None => (None, rest),
        },
        None => (None, symbol_path),
    };
    let names: Vec<&str> = names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Err(IndexerError::InvalidInput(format!(
            "No symbol name in {:?}",
            symbol_path
        )));
    }
    Ok((file.filter(|f| !f.is_empty()), names))
}

fn with_head(head: &str, completions: Vec<Completion>) -> Vec<Completion> {
    completions
        .into_iter()
        .map(|c| Completion {
            name: format!("{}{}", head, c.name),
            details: c.details,
        })
        .collect()
}

impl IndexContext {
    pub fn new(store: Arc<dyn SymbolStore>, registry: Arc<LanguageRegistry>) -> Result<Self> {
        let ctx = Self {
            store,
            trie: RwLock::new(SymbolTrie::new()),
            live: LiveFiles::new(Arc::clone(&registry)),
            registry,
        };
        ctx.rebuild_trie()?;
        Ok(ctx)
    }

    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = SqliteIndex::new(db_path.as_ref())?;
        Self::new(Arc::new(store), Arc::new(LanguageRegistry::new()))
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(
            Arc::new(SqliteIndex::in_memory()?),
            Arc::new(LanguageRegistry::new()),
        )
    }

    pub fn store(&self) -> &dyn SymbolStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn registry_arc(&self) -> Arc<LanguageRegistry> {
        Arc::clone(&self.registry)
    }

    /// Replaces the trie with one built from everything in the store.
    pub fn rebuild_trie(&self) -> Result<()> {
        let trie = SymbolTrie::from_symbols(self.store.all_summaries()?);
        tracing::debug!("Prefix index rebuilt with {} keys", trie.size());
        *self.trie.write() = trie;
        Ok(())
    }

    pub fn insert_into_trie(&self, symbols: &[Symbol]) {
        if symbols.is_empty() {
            return;
        }
        let mut trie = self.trie.write();
        for symbol in symbols {
            trie.insert(&symbol.name, symbol.summary());
        }
    }

    pub fn trie_size(&self) -> usize {
        self.trie.read().size()
    }

    pub fn scan(&self, options: &ScanOptions) -> Result<ScanReport> {
        scan(self, options, None)
    }

    pub fn scan_with_progress(
        &self,
        options: &ScanOptions,
        progress: &IndexingProgress,
    ) -> Result<ScanReport> {
        scan(self, options, Some(progress))
    }

    pub fn search(&self, prefix: &str, limit: usize) -> Result<Vec<SymbolRef>> {
        self.store.search_by_prefix(prefix, limit)
    }

    pub fn get(&self, name: &str, file_path: Option<&str>) -> Result<Vec<Symbol>> {
        self.store.get(name, file_path)
    }

    pub fn context(
        &self,
        name: &str,
        file_path: Option<&str>,
        max_depth: u32,
    ) -> Result<CallContext> {
        self.store.get_call_context(name, file_path, max_depth)
    }

    /// Prefix completion over bare names and `symbol:<file>/<name>` keys.
    ///
    /// A prefix such as `symbol:a.c/main,d` completes its last comma-separated
    /// segment within the same file: `symbol:a.c/main,debug`. When the trie has
    /// nothing, the store's substring search is used instead.
    pub fn complete(&self, prefix: &str, max_results: Option<usize>) -> Result<Vec<Completion>> {
        let max = max_results
            .unwrap_or(DEFAULT_COMPLETIONS)
            .clamp(1, MAX_COMPLETIONS);

        let composite = split_composite(prefix);
        let completions = {
            let trie = self.trie.read();
            match composite {
                Some((head, scope, partial)) => {
                    let mut scoped = trie.search_prefix(&format!("{}{}", scope, partial), Some(max));
                    for c in &mut scoped {
                        c.name.replace_range(..scope.len(), "");
                    }
                    with_head(head, scoped)
                }
                None => trie.search_prefix(prefix, Some(max)),
            }
        };
        if !completions.is_empty() {
            return Ok(completions);
        }

        self.complete_from_store(prefix, composite, max)
    }

    fn complete_from_store(
        &self,
        prefix: &str,
        composite: Option<(&str, &str, &str)>,
        max: usize,
    ) -> Result<Vec<Completion>> {
        let (file_fragment, name_fragment) = match prefix.strip_prefix(QUALIFIED_PREFIX) {
            Some(rest) => match rest.rsplit_once('/') {
                Some((file, name)) => {
                    let name = composite.map(|(_, _, partial)| partial).unwrap_or(name);
                    (Some(file), name)
                }
                None => (Some(rest), ""),
            },
            None => (None, prefix),
        };

        let mut completions = Vec::new();
        for hit in self.store.fuzzy_search(name_fragment, max, file_fragment)? {
            let Some(symbol) = self
                .store
                .get(&hit.name, Some(&hit.file_path))?
                .into_iter()
                .find(|s| s.file_path == hit.file_path)
            else {
                continue;
            };

            let name = match composite {
                Some((head, _, _)) => format!("{}{}", head, symbol.name),
                None if file_fragment.is_some() => qualified_key(&symbol.file_path, &symbol.name),
                None => symbol.name.clone(),
            };
            completions.push(Completion {
                name,
                details: symbol.summary(),
            });
        }
        Ok(completions)
    }

    /// Completions rendered as `symbol:<file>/<name>` lines.
    pub fn complete_simple(&self, prefix: &str, max_results: Option<usize>) -> Result<Vec<String>> {
        Ok(self
            .complete(prefix, max_results)?
            .into_iter()
            .map(|c| {
                if c.name.starts_with(QUALIFIED_PREFIX) {
                    c.name
                } else {
                    qualified_key(&c.details.file_path, &c.name)
                }
            })
            .collect())
    }

    pub fn list_files(&self) -> Result<Vec<String>> {
        self.store.list_files()
    }

    pub fn symbols_in_file(&self, file_fragment: &str) -> Result<Vec<Symbol>> {
        self.store.symbols_in_file(file_fragment)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    /// Like [`complete`](Self::complete), but a `symbol:<path>/...` prefix naming an
    /// existing file completes against that file as it is on disk now. The file is
    /// parsed again whenever its modification time moves.
    pub fn complete_realtime(
        &self,
        prefix: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<Completion>> {
        let max = max_results
            .unwrap_or(DEFAULT_COMPLETIONS)
            .clamp(1, MAX_COMPLETIONS);

        let scoped = prefix
            .strip_prefix(QUALIFIED_PREFIX)
            .and_then(|rest| rest.rsplit_once('/'));
        if let Some((file, names)) = scoped {
            let path = Path::new(file);
            if self.live.supports(path) {
                let live = self.live.load(path)?;
                let split = names.rfind(',').map_or(0, |i| i + 1);
                let head = &prefix[..prefix.len() - names.len() + split];
                return Ok(with_head(head, live.complete(&names[split..], max)));
            }
        }
        self.complete(prefix, Some(max))
    }

    /// Source text of every definition named by `symbol_path`, in request order.
    ///
    /// `symbol_path` is `symbol:<file>/<a>,<b>` or a bare comma-separated name list
    /// narrowed by `file_path`. An existing file is read as it is on disk now;
    /// otherwise the file part is a fragment matched against the index, and each
    /// definition is re-read at its stored byte range, falling back to the stored
    /// text when the file changed underneath.
    pub fn symbol_content(
        &self,
        symbol_path: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<SymbolContent>> {
        let (file, names) = split_symbol_path(symbol_path)?;
        let file = file.or(file_path);
        let live = match file.map(Path::new) {
            Some(path) if self.live.supports(path) => Some(self.live.load(path)?),
            _ => None,
        };

        let mut contents = Vec::with_capacity(names.len());
        for name in names {
            let (symbol, content) = match &live {
                Some(live) => {
                    let symbol = live
                        .get(name)
                        .cloned()
                        .ok_or_else(|| IndexerError::SymbolNotFound(name.to_string()))?;
                    let content = symbol.full_definition.clone();
                    (symbol, content)
                }
                None => {
                    let symbol = self
                        .get(name, file)?
                        .into_iter()
                        .next()
                        .ok_or_else(|| IndexerError::SymbolNotFound(name.to_string()))?;
                    let content = current_text(&symbol);
                    (symbol, content)
                }
            };
            contents.push(SymbolContent {
                location: symbol.location(),
                name: symbol.name,
                file_path: symbol.file_path,
                content,
            });
        }
        Ok(contents)
    }

    /// [`symbol_content`](Self::symbol_content) texts separated by a blank line.
    pub fn symbol_text(&self, symbol_path: &str, file_path: Option<&str>) -> Result<String> {
        Ok(self
            .symbol_content(symbol_path, file_path)?
            .into_iter()
            .map(|c| c.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Outline of a source file with every body elided.
    pub fn skeleton(&self, path: &Path) -> Result<String> {
        SourceSkeleton::new(self.registry_arc()).generate(path)
    }
}

/// Text at the symbol's byte range when it still hashes to the stored definition.
fn current_text(symbol: &Symbol) -> String {
    let (start, end) = symbol.byte_range();
    let current = std::fs::read(&symbol.file_path)
        .ok()
        .and_then(|bytes| bytes.get(start..end).map(<[u8]>::to_vec))
        .and_then(|slice| String::from_utf8(slice).ok());

    match current {
        Some(text) if definition_hash(&text) == symbol.definition_hash => text,
        _ => symbol.full_definition.clone(),
    }
}

/// One-shot build: opens (or creates) the database at `db_path` and scans into it.
pub fn build_index(db_path: impl AsRef<Path>, options: &ScanOptions) -> Result<ScanReport> {
    let ctx = IndexContext::open(db_path)?;
    ctx.scan(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolKind;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn symbol(name: &str, file: &str, signature: &str) -> Symbol {
        let full_definition = format!("{} {{}}", signature);
        Symbol {
            name: name.to_string(),
            file_path: file.to_string(),
            kind: SymbolKind::Function,
            signature: signature.to_string(),
            body: "{}".to_string(),
            definition_hash: definition_hash(&full_definition),
            full_definition,
            calls: Vec::new(),
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 0,
            start_byte: 0,
            end_byte: 0,
        }
    }

    fn context_with(symbols: &[Symbol]) -> IndexContext {
        let ctx = IndexContext::in_memory().unwrap();
        for s in symbols {
            let outcome = ctx.store().upsert(std::slice::from_ref(s), &s.file_path).unwrap();
            ctx.insert_into_trie(&outcome.written);
        }
        ctx
    }

    #[test]
    fn test_split_composite() {
        assert_eq!(
            split_composite("symbol:a.c/main,d"),
            Some(("symbol:a.c/main,", "symbol:a.c/", "d"))
        );
        assert_eq!(split_composite("symbol:a.c/main"), None);
        assert_eq!(split_composite("main,d"), None);
    }

    #[test]
    fn test_composite_completion() {
        let ctx = context_with(&[
            symbol("main", "/src/a.c", "int main(void)"),
            symbol("debug", "/src/a.c", "void debug(void)"),
            symbol("print", "/src/a.c", "void print(void)"),
        ]);

        let names: Vec<String> = ctx
            .complete("symbol:a.c/main,d", None)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["symbol:a.c/main,debug"]);

        let names: Vec<String> = ctx
            .complete("symbol:a.c/main,debug,pr", None)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["symbol:a.c/main,debug,print"]);
    }

    #[test]
    fn test_completion_limit_is_clamped() {
        let symbols: Vec<Symbol> = (0..60)
            .map(|i| symbol(&format!("fn_{:02}", i), "/m.c", &format!("void fn_{:02}(void)", i)))
            .collect();
        let ctx = context_with(&symbols);

        assert_eq!(ctx.complete("fn_", None).unwrap().len(), DEFAULT_COMPLETIONS);
        assert_eq!(ctx.complete("fn_", Some(0)).unwrap().len(), 1);
        assert_eq!(ctx.complete("fn_", Some(500)).unwrap().len(), MAX_COMPLETIONS);
    }

    #[test]
    fn test_completion_falls_back_to_store() {
        let ctx = context_with(&[symbol("parse_header", "/src/http.c", "int parse_header(void)")]);

        // Not a prefix, so only the substring search finds it.
        let results = ctx.complete("header", None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "parse_header");

        let results = ctx.complete("symbol:http/header", None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "symbol:http.c/parse_header");
    }

    #[test]
    fn test_complete_simple_renders_qualified_keys() {
        let ctx = context_with(&[symbol("render", "/ui/view.py", "def render():")]);
        let lines = ctx.complete_simple("ren", None).unwrap();
        assert_eq!(lines, vec!["symbol:view.py/render"]);
    }

    #[test]
    fn test_rebuild_trie_from_store() {
        let ctx = context_with(&[symbol("alpha", "/x.go", "func alpha()")]);
        assert_eq!(ctx.trie_size(), 2);
        ctx.rebuild_trie().unwrap();
        assert_eq!(ctx.trie_size(), 2);
        assert_eq!(ctx.complete("al", None).unwrap()[0].name, "alpha");
    }

    #[test]
    fn test_symbol_content_missing() {
        let ctx = IndexContext::in_memory().unwrap();
        assert!(matches!(
            ctx.symbol_content("nope", None),
            Err(IndexerError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_split_symbol_path() {
        let (file, names) = split_symbol_path("symbol:src/a.c/main, debug").unwrap();
        assert_eq!(file, Some("src/a.c"));
        assert_eq!(names, vec!["main", "debug"]);

        let (file, names) = split_symbol_path("Client.fetch").unwrap();
        assert_eq!(file, None);
        assert_eq!(names, vec!["Client.fetch"]);

        assert!(split_symbol_path("symbol:a.c/").is_err());
        assert!(split_symbol_path(" , ").is_err());
    }

    #[test]
    fn test_composite_content_reads_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.c");
        fs::write(
            &path,
            "int main(void) {\n    return 0;\n}\n\nvoid debug(void) {\n    puts(\"x\");\n}\n",
        )
        .unwrap();
        let ctx = IndexContext::in_memory().unwrap();
        let symbol_path = format!("symbol:{}/main,debug", path.display());

        let text = ctx.symbol_text(&symbol_path, None).unwrap();
        assert_eq!(
            text,
            "int main(void) {\n    return 0;\n}\n\nvoid debug(void) {\n    puts(\"x\");\n}"
        );

        let contents = ctx.symbol_content(&symbol_path, None).unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1].name, "debug");
        assert_eq!(contents[1].location.start_line, 4);
        assert_eq!(contents[1].location.end_line, 6);
        assert_eq!(contents[0].location.start_byte, 0);

        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(json[1]["location"]["start_col"], 0);
        assert_eq!(json[0]["location"]["end_line"], 2);
    }

    #[test]
    fn test_content_of_indexed_symbols_by_fragment() {
        let ctx = context_with(&[
            symbol("main", "/gone/a.c", "int main(void)"),
            symbol("debug", "/gone/a.c", "void debug(void)"),
        ]);
        let text = ctx.symbol_text("symbol:a.c/main,debug", None).unwrap();
        assert_eq!(text, "int main(void) {}\n\nvoid debug(void) {}");

        let contents = ctx.symbol_content("debug", Some("a.c")).unwrap();
        assert_eq!(contents[0].file_path, "/gone/a.c");
        assert!(matches!(
            ctx.symbol_content("symbol:a.c/main,nope", None),
            Err(IndexerError::SymbolNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_realtime_completion_follows_file_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.py");
        fs::write(&path, "def load():\n    pass\n").unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000_000);
        fs::File::options().write(true).open(&path).unwrap().set_modified(stamp).unwrap();

        let ctx = IndexContext::in_memory().unwrap();
        let scope = format!("symbol:{}/", path.display());
        let names = |prefix: &str| -> Vec<String> {
            ctx.complete_realtime(prefix, None)
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect()
        };
        assert_eq!(names(&format!("{}lo", scope)), vec![format!("{}load", scope)]);

        fs::write(&path, "def load():\n    pass\n\ndef log():\n    pass\n").unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(stamp + Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            names(&format!("{}lo", scope)),
            vec![format!("{}load", scope), format!("{}log", scope)]
        );
        assert_eq!(
            names(&format!("{}load,lo", scope)),
            vec![format!("{}load,load", scope), format!("{}load,log", scope)]
        );
    }

    #[test]
    fn test_realtime_completion_without_file_uses_index() {
        let ctx = context_with(&[symbol("render", "/ui/view.py", "def render():")]);
        let results = ctx.complete_realtime("symbol:view.py/re", None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "symbol:view.py/render");
        assert_eq!(ctx.complete_realtime("ren", None).unwrap()[0].name, "render");
    }

    #[test]
    fn test_skeleton_of_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Main.java");
        fs::write(&path, "class Main {\n    void run() {\n        go();\n    }\n}\n").unwrap();

        let ctx = IndexContext::in_memory().unwrap();
        let outline = ctx.skeleton(&path).unwrap();
        assert!(outline.contains("class Main {\n    void run() {\n        // Placeholder\n    }\n}"));
        assert!(!outline.contains("go();"));
    }
}
