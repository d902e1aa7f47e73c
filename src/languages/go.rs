use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{compile_cached, LanguageGrammar};
use crate::error::Result;

pub struct GoGrammar;

static GO_SYMBOLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for GoGrammar {
    fn name(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["go"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (type_declaration
            (type_spec
                name: (type_identifier) @class.name
                type: [(struct_type) (interface_type)] @class.body
            )
        ) @class

        (function_declaration
            name: (identifier) @function.name
            parameters: (parameter_list) @function.params
            result: (_)? @function.return_type
            body: (block) @function.body
        ) @function

        ; Methods are qualified by their receiver type
        (method_declaration
            receiver: (parameter_list
                (parameter_declaration
                    type: [
                        (type_identifier) @function.receiver
                        (pointer_type (type_identifier) @function.receiver)
                    ]
                )
            )
            name: (field_identifier) @function.name
            parameters: (parameter_list) @function.params
            result: (_)? @function.return_type
            body: (block) @function.body
        ) @function

        (call_expression
            function: [(identifier) (selector_expression)] @call
        )
        "#
    }

    fn cached_symbols_query(&self) -> Result<&'static Query> {
        compile_cached(&GO_SYMBOLS_QUERY, self)
    }

    fn function_kinds(&self) -> &[&'static str] {
        &["function_declaration", "method_declaration"]
    }
}
