//! File outlines: every definition keeps its header, bodies become a placeholder.

use std::path::Path;
use std::sync::Arc;

use tree_sitter::Node;

use crate::error::Result;
use crate::indexer::parser::{ParsedFile, Parser};
use crate::languages::{BlockStyle, LanguageRegistry};

const INDENT_UNIT: &str = "    ";

pub struct SourceSkeleton {
    parser: Parser,
}

impl SourceSkeleton {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self {
            parser: Parser::new(registry),
        }
    }

    pub fn generate(&self, path: &Path) -> Result<String> {
        let parsed = self.parser.parse_file(path)?;
        Ok(Outline::new(&parsed).render())
    }

    /// Outline of `source` parsed with the grammar of `path`.
    pub fn generate_source(&self, path: &Path, source: &str) -> Result<String> {
        let parsed = self.parser.parse_named(path, source)?;
        Ok(Outline::new(&parsed).render())
    }
}

/// A class or function node with a body, plus the node that carries its
/// decorators or `export` keyword.
#[derive(Clone, Copy)]
struct Definition<'t> {
    outer: Node<'t>,
    body: Node<'t>,
    is_class: bool,
}

struct Outline<'p> {
    parsed: &'p ParsedFile,
    style: BlockStyle,
    lines: Vec<String>,
}

fn is_comment(node: &Node) -> bool {
    node.kind().contains("comment")
}

fn indent(depth: usize) -> String {
    INDENT_UNIT.repeat(depth)
}

impl<'p> Outline<'p> {
    fn new(parsed: &'p ParsedFile) -> Self {
        let style = parsed.grammar.block_style();
        Self {
            parsed,
            style,
            lines: vec![
                format!("{} Auto-generated code skeleton", style.comment_prefix()),
                String::new(),
            ],
        }
    }

    fn render(mut self) -> String {
        let parsed = self.parsed;
        let root = parsed.root_node();
        let mut cursor = root.walk();
        let children: Vec<Node> = root.named_children(&mut cursor).collect();

        // Comments directly above a definition stay attached to it.
        let mut leading = vec![false; children.len()];
        for i in (0..children.len().saturating_sub(1)).rev() {
            let (node, next) = (children[i], children[i + 1]);
            let adjacent = next.start_position().row <= node.end_position().row + 1;
            let attaches = leading[i + 1] || self.definition(next).is_some();
            leading[i] = is_comment(&node) && adjacent && attaches;
        }

        let mut after_definition = false;
        for (i, node) in children.iter().enumerate() {
            let follows_leading = i > 0 && leading[i - 1];
            match self.definition(*node) {
                Some(definition) => {
                    if !follows_leading {
                        self.blank();
                    }
                    self.emit_definition(definition, 0);
                    after_definition = true;
                }
                None => {
                    if after_definition || (leading[i] && !follows_leading) {
                        self.blank();
                    }
                    after_definition = false;
                    for line in parsed.node_text(node).trim_end().lines() {
                        self.lines.push(line.trim_end().to_string());
                    }
                }
            }
        }

        let mut out = self.lines.join("\n").trim_end().to_string();
        out.push('\n');
        out
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(String::new());
        }
    }

    /// Wrappers such as decorators or `export` carry the definition in a
    /// `definition` or `declaration` field.
    fn definition<'t>(&self, node: Node<'t>) -> Option<Definition<'t>> {
        let grammar = &self.parsed.grammar;
        let inner = node
            .child_by_field_name("definition")
            .or_else(|| node.child_by_field_name("declaration"))
            .unwrap_or(node);

        let is_class = grammar.class_kinds().contains(&inner.kind());
        if !is_class && !grammar.function_kinds().contains(&inner.kind()) {
            return None;
        }
        let body = inner.child_by_field_name("body")?;
        Some(Definition {
            outer: node,
            body,
            is_class,
        })
    }

    fn emit_definition(&mut self, definition: Definition, depth: usize) {
        self.emit_header(&definition, depth);
        if definition.is_class {
            self.emit_members(definition.body, depth + 1);
        } else {
            if let Some(doc) = self.docstring(definition.body) {
                self.emit_single(doc, depth + 1);
            }
            let placeholder = match self.style {
                BlockStyle::Indent => "pass  # Placeholder",
                BlockStyle::Braces => "// Placeholder",
            };
            self.lines.push(format!("{}{}", indent(depth + 1), placeholder));
        }
        if self.style == BlockStyle::Braces {
            self.lines.push(format!("{}}}", indent(depth)));
        }
    }

    /// Source between the definition start and its body, one trimmed line each.
    fn emit_header(&mut self, definition: &Definition, depth: usize) {
        let source = &self.parsed.source;
        let header = &source[definition.outer.start_byte()..definition.body.start_byte()];
        let prefix = indent(depth);

        let mut lines: Vec<String> = Vec::new();
        for line in header.lines().map(str::trim).filter(|l| !l.is_empty()) {
            lines.push(format!("{}{}", prefix, line));
            if self.style == BlockStyle::Indent && line.ends_with(':') {
                break;
            }
        }
        if self.style == BlockStyle::Braces {
            match lines.last_mut() {
                Some(last) => last.push_str(" {"),
                None => lines.push(format!("{}{{", prefix)),
            }
        }
        self.lines.extend(lines);
    }

    /// Nested definitions are outlined; other single-line members are kept as is.
    fn emit_members(&mut self, body: Node, depth: usize) {
        let mut cursor = body.walk();
        let members: Vec<Node> = body.named_children(&mut cursor).collect();
        let mut emitted = 0;

        if let Some(doc) = self.docstring(body) {
            self.emit_single(doc, depth);
            emitted += 1;
        }
        for member in members.iter().skip(emitted) {
            if let Some(definition) = self.definition(*member) {
                self.emit_definition(definition, depth);
                emitted += 1;
            } else {
                let text = self.parsed.node_text(member).trim();
                if !text.is_empty() && !text.contains('\n') {
                    self.lines.push(format!("{}{}", indent(depth), text));
                    emitted += 1;
                }
            }
        }

        if emitted == 0 && self.style == BlockStyle::Indent {
            self.lines.push(format!("{}pass  # Placeholder", indent(depth)));
        }
    }

    /// Leading string statement of an indentation-delimited body.
    fn docstring<'t>(&self, body: Node<'t>) -> Option<Node<'t>> {
        if self.style != BlockStyle::Indent {
            return None;
        }
        let first = body.named_child(0)?;
        let value = first.named_child(0)?;
        (first.kind() == "expression_statement" && value.kind() == "string").then_some(first)
    }

    fn emit_single(&mut self, node: Node, depth: usize) {
        let prefix = indent(depth);
        for line in self.parsed.node_text(&node).lines() {
            self.lines.push(format!("{}{}", prefix, line.trim()));
        }
    }
}
