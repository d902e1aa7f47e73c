pub mod c;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tree_sitter::Query;

use crate::error::{IndexerError, Result};

/// Pieces of a function definition handed to [`LanguageGrammar::format_function_signature`].
#[derive(Debug, Clone, Default)]
pub struct FunctionHeader<'a> {
    /// Dotted symbol path, e.g. `Outer.Inner.method`
    pub qualified_name: &'a str,
    /// Source text between the definition start and its body, collapsed to one line
    pub header: &'a str,
    pub params: &'a str,
    pub return_type: Option<&'a str>,
    pub decorators: Vec<&'a str>,
    pub is_async: bool,
}

/// How a language delimits definition bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Braces,
    Indent,
}

impl BlockStyle {
    pub fn comment_prefix(self) -> &'static str {
        match self {
            BlockStyle::Braces => "//",
            BlockStyle::Indent => "#",
        }
    }
}

pub trait LanguageGrammar: Send + Sync {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn language(&self) -> tree_sitter::Language;

    /// Query producing the capture vocabulary understood by the extractor:
    /// `@class`, `@class.name`, `@class.body`, `@function`, `@function.name`,
    /// `@function.params`, `@function.body`, `@function.return_type`,
    /// `@function.receiver`, `@call`, `@alias`, `@alias.name`.
    fn symbols_query(&self) -> &str;

    /// Compiled symbols query, cached for the process lifetime.
    fn cached_symbols_query(&self) -> Result<&'static Query>;

    /// Node kinds whose `name` field qualifies nested symbols and marks methods.
    fn class_kinds(&self) -> &[&'static str] {
        &[]
    }

    /// Node kinds whose `name` field qualifies nested functions.
    fn function_kinds(&self) -> &[&'static str] {
        &[]
    }

    /// Wrapper node that carries decorators for a definition, if the language has one.
    fn decorator_container(&self) -> Option<&'static str> {
        None
    }

    fn format_function_signature(&self, header: &FunctionHeader<'_>) -> String {
        header.header.to_string()
    }

    /// `header` is the collapsed class header without its trailing `:` or `{`.
    fn format_class_signature(&self, header: &str) -> String {
        header.to_string()
    }

    fn block_style(&self) -> BlockStyle {
        BlockStyle::Braces
    }
}

/// Compiles the grammar's symbols query once into `cell`.
pub(crate) fn compile_cached(
    cell: &'static OnceCell<Query>,
    grammar: &dyn LanguageGrammar,
) -> Result<&'static Query> {
    cell.get_or_try_init(|| Query::new(&grammar.language(), grammar.symbols_query()))
        .map_err(|e| IndexerError::GrammarLoad {
            language: grammar.name().to_string(),
            message: e.to_string(),
        })
}

pub struct LanguageRegistry {
    languages: HashMap<String, Arc<dyn LanguageGrammar>>,
    extension_map: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        };

        registry.register(Arc::new(c::CGrammar));
        registry.register(Arc::new(python::PythonGrammar));
        registry.register(Arc::new(javascript::JavaScriptGrammar));
        registry.register(Arc::new(java::JavaGrammar));
        registry.register(Arc::new(go::GoGrammar));

        registry
    }

    pub fn register(&mut self, grammar: Arc<dyn LanguageGrammar>) {
        let name = grammar.name().to_string();
        for ext in grammar.file_extensions() {
            self.extension_map.insert(ext.to_string(), name.clone());
        }
        self.languages.insert(name, grammar);
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.languages.get(name).cloned()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.extension_map
            .get(ext)
            .and_then(|name| self.languages.get(name))
            .cloned()
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get_by_extension(&ext.to_ascii_lowercase()))
    }

    /// Resolves the grammar for `path` and its compiled query.
    pub fn resolve(&self, path: &Path) -> Result<(Arc<dyn LanguageGrammar>, &'static Query)> {
        let grammar = self
            .get_for_file(path)
            .ok_or_else(|| IndexerError::UnsupportedLanguage(path.display().to_string()))?;
        let query = grammar.cached_symbols_query()?;
        Ok((grammar, query))
    }

    /// Extensions with a leading dot, sorted, usable as default include suffixes.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self
            .extension_map
            .keys()
            .map(|ext| format!(".{}", ext))
            .collect();
        exts.sort();
        exts
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.languages.keys().map(|s| s.as_str()).collect();
        langs.sort_unstable();
        langs
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
