use std::collections::BTreeMap;
use std::path::Path;

use crate::index::{Completion, SymbolSummary};

/// Prefix of file-qualified trie keys: `symbol:<file>/<name>`.
pub const QUALIFIED_PREFIX: &str = "symbol:";

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    is_terminal: bool,
    entries: Vec<SymbolSummary>,
}

/// In-memory prefix index over bare and file-qualified symbol names.
/// Append-only: entries are never removed for the lifetime of the trie.
#[derive(Debug, Default)]
pub struct SymbolTrie {
    root: TrieNode,
    size: usize,
}

/// Short, recognizable form of a file path used in qualified keys: the basename,
/// or `<dir>/__init__.py` for package initializers.
pub fn identifiable_path(file_path: &str) -> String {
    let path = Path::new(file_path);
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string());

    if base == "__init__.py" {
        if let Some(dir) = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy())
        {
            return format!("{}/{}", dir, base);
        }
    }
    base
}

/// `symbol:<identifiable path>/<name>`
pub fn qualified_key(file_path: &str, name: &str) -> String {
    format!("{}{}/{}", QUALIFIED_PREFIX, identifiable_path(file_path), name)
}

impl SymbolTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a trie from `(name, summary)` pairs, e.g. everything in the store.
    pub fn from_symbols<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = (String, SymbolSummary)>,
    {
        let mut trie = Self::new();
        for (name, summary) in symbols {
            trie.insert(&name, summary);
        }
        trie
    }

    /// Inserts `name` and, unless it already is one, its file-qualified key.
    /// Returns true when the bare key gained a new entry.
    pub fn insert(&mut self, name: &str, summary: SymbolSummary) -> bool {
        if name.starts_with(QUALIFIED_PREFIX) {
            return self.insert_key(name, summary);
        }
        let qualified = qualified_key(&summary.file_path, name);
        let added = self.insert_key(name, summary.clone());
        self.insert_key(&qualified, summary);
        added
    }

    fn insert_key(&mut self, key: &str, summary: SymbolSummary) -> bool {
        let mut node = &mut self.root;
        for ch in key.chars() {
            node = node.children.entry(ch).or_default();
        }

        if !node.is_terminal {
            node.is_terminal = true;
            self.size += 1;
        }
        if node
            .entries
            .iter()
            .any(|e| e.definition_hash == summary.definition_hash)
        {
            return false;
        }
        node.entries.push(summary);
        true
    }

    fn find(&self, key: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for ch in key.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    /// Every entry whose key starts with `prefix`, depth-first in key order,
    /// stopping after `max_results` when given.
    pub fn search_prefix(&self, prefix: &str, max_results: Option<usize>) -> Vec<Completion> {
        let mut results = Vec::new();
        if max_results == Some(0) {
            return results;
        }
        if let Some(node) = self.find(prefix) {
            let mut key = prefix.to_string();
            Self::collect(node, &mut key, &mut results, max_results);
        }
        results
    }

    fn collect(
        node: &TrieNode,
        key: &mut String,
        results: &mut Vec<Completion>,
        max_results: Option<usize>,
    ) -> bool {
        let full = |results: &Vec<Completion>| max_results.is_some_and(|max| results.len() >= max);

        if node.is_terminal {
            for entry in &node.entries {
                results.push(Completion {
                    name: key.clone(),
                    details: entry.clone(),
                });
                if full(results) {
                    return true;
                }
            }
        }

        for (ch, child) in &node.children {
            key.push(*ch);
            let done = Self::collect(child, key, results, max_results);
            key.pop();
            if done {
                return true;
            }
        }
        false
    }

    /// Number of distinct terminal keys, bare and qualified.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(file: &str, signature: &str, hash: u32) -> SymbolSummary {
        SymbolSummary {
            file_path: file.to_string(),
            signature: signature.to_string(),
            definition_hash: hash,
        }
    }

    #[test]
    fn test_identifiable_path() {
        assert_eq!(identifiable_path("/src/project/a.c"), "a.c");
        assert_eq!(identifiable_path("pkg/sub/__init__.py"), "sub/__init__.py");
        assert_eq!(identifiable_path("__init__.py"), "__init__.py");
    }

    fn keys(trie: &SymbolTrie, prefix: &str) -> Vec<String> {
        trie.search_prefix(prefix, None)
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn test_insert_adds_bare_and_qualified_keys() {
        let mut trie = SymbolTrie::new();
        trie.insert("main", summary("/tmp/a.c", "int main(void)", 1));

        assert_eq!(trie.size(), 2);
        assert_eq!(keys(&trie, ""), vec!["main", "symbol:a.c/main"]);
    }

    #[test]
    fn test_qualified_name_is_not_requalified() {
        let mut trie = SymbolTrie::new();
        trie.insert("symbol:a.c/main", summary("/tmp/a.c", "main()", 1));
        assert_eq!(trie.size(), 1);
        assert_eq!(keys(&trie, ""), vec!["symbol:a.c/main"]);
    }

    #[test]
    fn test_insert_is_idempotent_per_hash() {
        let mut trie = SymbolTrie::new();
        assert!(trie.insert("run", summary("a.py", "def run():", 7)));
        assert!(!trie.insert("run", summary("a.py", "def run():", 7)));
        assert_eq!(trie.search_prefix("run", None).len(), 1);
        assert_eq!(trie.size(), 2);
    }

    #[test]
    fn test_same_name_different_files() {
        let mut trie = SymbolTrie::new();
        trie.insert("init", summary("a.py", "def init():", 1));
        trie.insert("init", summary("b.py", "def init(x):", 2));

        let results = trie.search_prefix("init", None);
        assert_eq!(results.len(), 2);
        assert_eq!(trie.search_prefix("symbol:b.py/", None).len(), 1);
    }

    #[test]
    fn test_search_prefix_order_and_limit() {
        let mut trie = SymbolTrie::new();
        for (i, name) in ["print", "debug", "main", "parse"].iter().enumerate() {
            trie.insert(name, summary("a.c", name, i as u32));
        }

        let names: Vec<String> = trie
            .search_prefix("p", None)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["parse", "print"]);

        assert_eq!(trie.search_prefix("", Some(3)).len(), 3);
        assert!(trie.search_prefix("zzz", None).is_empty());
        assert!(trie.search_prefix("p", Some(0)).is_empty());
    }

    #[test]
    fn test_from_symbols() {
        let trie = SymbolTrie::from_symbols(vec![
            ("alpha".to_string(), summary("x.go", "func alpha()", 1)),
            ("beta".to_string(), summary("x.go", "func beta()", 2)),
        ]);
        assert_eq!(trie.size(), 4);
        let hits = trie.search_prefix("symbol:x.go/beta", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].details.signature, "func beta()");
    }
}
