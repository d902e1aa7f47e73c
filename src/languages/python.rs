use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{compile_cached, BlockStyle, FunctionHeader, LanguageGrammar};
use crate::error::Result;

pub struct PythonGrammar;

static PYTHON_SYMBOLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for PythonGrammar {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (class_definition
            name: (identifier) @class.name
            body: (block) @class.body
        ) @class

        (function_definition
            name: (identifier) @function.name
            parameters: (parameters) @function.params
            return_type: (_)? @function.return_type
            body: (block) @function.body
        ) @function

        ; Module-level assignments become aliases
        (module
            (expression_statement
                (assignment
                    left: (identifier) @alias.name
                )
            ) @alias
        )

        ; Plain calls; attribute chains are captured whole, including
        ; the objects of nested attributes (A.B.f -> A.B.f, A.B)
        (call
            function: (identifier) @call
        )

        (attribute) @call
        "#
    }

    fn cached_symbols_query(&self) -> Result<&'static Query> {
        compile_cached(&PYTHON_SYMBOLS_QUERY, self)
    }

    fn class_kinds(&self) -> &[&'static str] {
        &["class_definition"]
    }

    fn function_kinds(&self) -> &[&'static str] {
        &["function_definition"]
    }

    fn decorator_container(&self) -> Option<&'static str> {
        Some("decorated_definition")
    }

    fn block_style(&self) -> BlockStyle {
        BlockStyle::Indent
    }

    fn format_function_signature(&self, header: &FunctionHeader<'_>) -> String {
        let mut signature = String::new();
        for decorator in &header.decorators {
            signature.push_str(decorator);
            signature.push(' ');
        }
        if header.is_async {
            signature.push_str("async ");
        }
        signature.push_str("def ");
        signature.push_str(header.qualified_name);
        signature.push_str(header.params);
        if let Some(ret) = header.return_type {
            signature.push_str(" -> ");
            signature.push_str(ret);
        }
        signature.push(':');
        signature
    }

    fn format_class_signature(&self, header: &str) -> String {
        format!("{}:", header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_signature_plain() {
        let header = FunctionHeader {
            qualified_name: "MyClass.run",
            params: "(self, x)",
            ..Default::default()
        };
        assert_eq!(
            PythonGrammar.format_function_signature(&header),
            "def MyClass.run(self, x):"
        );
    }

    #[test]
    fn test_format_class_signature() {
        assert_eq!(
            PythonGrammar.format_class_signature("class Repo(Base)"),
            "class Repo(Base):"
        );
    }

    #[test]
    fn test_format_signature_async_decorated() {
        let header = FunctionHeader {
            qualified_name: "fetch",
            params: "(url)",
            return_type: Some("bytes"),
            decorators: vec!["@retry(3)"],
            is_async: true,
            ..Default::default()
        };
        assert_eq!(
            PythonGrammar.format_function_signature(&header),
            "@retry(3) async def fetch(url) -> bytes:"
        );
    }
}
