use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tree_sitter::Query;

use crate::error::{IndexerError, Result};
use crate::languages::{LanguageGrammar, LanguageRegistry};

thread_local! {
    // tree-sitter parsers are not Sync; each worker thread keeps one per language.
    static PARSERS: RefCell<HashMap<&'static str, tree_sitter::Parser>> = RefCell::new(HashMap::new());
}

#[derive(Clone)]
pub struct Parser {
    registry: Arc<LanguageRegistry>,
}

impl Parser {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile> {
        let (grammar, query) = self.registry.resolve(path)?;
        let bytes = std::fs::read(path)?;
        let source = String::from_utf8(bytes)
            .map_err(|_| IndexerError::Parse(format!("{} is not valid UTF-8", path.display())))?;
        self.parse_source(&source, grammar, query)
    }

    pub fn parse_source(
        &self,
        source: &str,
        grammar: Arc<dyn LanguageGrammar>,
        query: &'static Query,
    ) -> Result<ParsedFile> {
        let tree = PARSERS.with(|cell| -> Result<tree_sitter::Tree> {
            let mut parsers = cell.borrow_mut();
            let parser = match parsers.entry(grammar.name()) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    let mut parser = tree_sitter::Parser::new();
                    parser
                        .set_language(&grammar.language())
                        .map_err(|e| IndexerError::GrammarLoad {
                            language: grammar.name().to_string(),
                            message: e.to_string(),
                        })?;
                    e.insert(parser)
                }
            };
            parser
                .parse(source, None)
                .ok_or_else(|| IndexerError::Parse("Failed to parse source".to_string()))
        })?;

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            language: grammar.name(),
            grammar,
            query,
        })
    }

    /// Parses `source` as if it were the contents of `path`.
    pub fn parse_named(&self, path: &Path, source: &str) -> Result<ParsedFile> {
        let (grammar, query) = self.registry.resolve(path)?;
        self.parse_source(source, grammar, query)
    }
}

pub struct ParsedFile {
    pub tree: tree_sitter::Tree,
    pub source: String,
    pub language: &'static str,
    pub grammar: Arc<dyn LanguageGrammar>,
    pub query: &'static Query,
}

impl ParsedFile {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_parser() -> Parser {
        Parser::new(Arc::new(LanguageRegistry::new()))
    }

    #[test]
    fn test_parse_named_python() {
        let parser = create_parser();
        let parsed = parser
            .parse_named(Path::new("app.py"), "def main():\n    pass\n")
            .unwrap();
        assert_eq!(parsed.language, "python");
        assert_eq!(parsed.root_node().kind(), "module");
    }

    #[test]
    fn test_parse_named_c() {
        let parser = create_parser();
        let parsed = parser
            .parse_named(Path::new("main.c"), "int main(void) { return 0; }")
            .unwrap();
        assert_eq!(parsed.language, "c");
        assert_eq!(parsed.root_node().kind(), "translation_unit");
    }

    #[test]
    fn test_parse_empty_source() {
        let parser = create_parser();
        let parsed = parser.parse_named(Path::new("empty.go"), "").unwrap();
        assert_eq!(parsed.source, "");
    }

    #[test]
    fn test_node_text_roundtrip() {
        let parser = create_parser();
        let source = "function hello() { return 1; }";
        let parsed = parser.parse_named(Path::new("a.js"), source).unwrap();
        assert_eq!(parsed.node_text(&parsed.root_node()), source);
    }

    #[test]
    fn test_parse_file_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();

        let err = create_parser().parse_file(&path).err().unwrap();
        assert!(matches!(err, IndexerError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_parse_file_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.py");
        fs::write(&path, [0x64, 0x65, 0x66, 0xff, 0xfe]).unwrap();

        let err = create_parser().parse_file(&path).err().unwrap();
        assert!(matches!(err, IndexerError::Parse(_)));
    }

    #[test]
    fn test_parser_reused_across_files() {
        let parser = create_parser();
        for i in 0..3 {
            let source = format!("def f{}():\n    return {}\n", i, i);
            let parsed = parser.parse_named(Path::new("x.py"), &source).unwrap();
            assert!(!parsed.root_node().has_error());
        }
    }
}
