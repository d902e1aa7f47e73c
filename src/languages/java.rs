use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{compile_cached, LanguageGrammar};
use crate::error::Result;

pub struct JavaGrammar;

static JAVA_SYMBOLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for JavaGrammar {
    fn name(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["java"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (class_declaration
            name: (identifier) @class.name
            body: (class_body) @class.body
        ) @class

        (interface_declaration
            name: (identifier) @class.name
            body: (interface_body) @class.body
        ) @class

        (enum_declaration
            name: (identifier) @class.name
            body: (enum_body) @class.body
        ) @class

        (method_declaration
            name: (identifier) @function.name
            parameters: (formal_parameters) @function.params
            body: (block) @function.body
        ) @function

        (constructor_declaration
            name: (identifier) @function.name
            parameters: (formal_parameters) @function.params
            body: (constructor_body) @function.body
        ) @function

        (method_invocation
            name: (identifier) @call
        )

        (object_creation_expression
            type: (type_identifier) @call
        )
        "#
    }

    fn cached_symbols_query(&self) -> Result<&'static Query> {
        compile_cached(&JAVA_SYMBOLS_QUERY, self)
    }

    fn class_kinds(&self) -> &[&'static str] {
        &["class_declaration", "interface_declaration", "enum_declaration"]
    }

    fn function_kinds(&self) -> &[&'static str] {
        &["method_declaration", "constructor_declaration"]
    }
}
