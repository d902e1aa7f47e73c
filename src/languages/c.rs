use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{compile_cached, LanguageGrammar};
use crate::error::Result;

pub struct CGrammar;

static C_SYMBOLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for CGrammar {
    fn name(&self) -> &'static str {
        "c"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["c", "h"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (function_definition
            type: (_) @function.return_type
            declarator: (function_declarator
                declarator: (identifier) @function.name
                parameters: (parameter_list) @function.params
            )
            body: (compound_statement) @function.body
        ) @function

        ; Functions returning pointers
        (function_definition
            type: (_) @function.return_type
            declarator: (pointer_declarator
                declarator: (function_declarator
                    declarator: (identifier) @function.name
                    parameters: (parameter_list) @function.params
                )
            )
            body: (compound_statement) @function.body
        ) @function

        (struct_specifier
            name: (type_identifier) @class.name
            body: (field_declaration_list) @class.body
        ) @class

        (call_expression
            function: (identifier) @call
        )

        (call_expression
            function: (field_expression
                field: (field_identifier) @call
            )
        )
        "#
    }

    fn cached_symbols_query(&self) -> Result<&'static Query> {
        compile_cached(&C_SYMBOLS_QUERY, self)
    }

    fn function_kinds(&self) -> &[&'static str] {
        &["function_definition"]
    }
}
