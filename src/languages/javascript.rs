use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{compile_cached, LanguageGrammar};
use crate::error::Result;

/// JavaScript, parsed with the TSX dialect of the TypeScript grammar (a superset of JS + JSX).
pub struct JavaScriptGrammar;

static JS_SYMBOLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for JavaScriptGrammar {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["js", "mjs", "cjs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (class_declaration
            name: (_) @class.name
            body: (class_body) @class.body
        ) @class

        (function_declaration
            name: (identifier) @function.name
            parameters: (formal_parameters) @function.params
            body: (statement_block) @function.body
        ) @function

        (generator_function_declaration
            name: (identifier) @function.name
            parameters: (formal_parameters) @function.params
            body: (statement_block) @function.body
        ) @function

        (method_definition
            name: (_) @function.name
            parameters: (formal_parameters) @function.params
            body: (statement_block) @function.body
        ) @function

        ; const handler = (a, b) => { ... }
        (lexical_declaration
            (variable_declarator
                name: (identifier) @function.name
                value: (arrow_function
                    parameters: (formal_parameters) @function.params
                    body: (statement_block) @function.body
                )
            )
        ) @function

        (call_expression
            function: [(identifier) (member_expression)] @call
        )

        (new_expression
            constructor: (identifier) @call
        )
        "#
    }

    fn cached_symbols_query(&self) -> Result<&'static Query> {
        compile_cached(&JS_SYMBOLS_QUERY, self)
    }

    fn class_kinds(&self) -> &[&'static str] {
        &["class_declaration"]
    }

    fn function_kinds(&self) -> &[&'static str] {
        &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
        ]
    }
}
