use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Node, Point, QueryMatch, StreamingIterator};

use crate::index::{definition_hash, Symbol, SymbolKind};
use crate::indexer::parser::ParsedFile;
use crate::languages::FunctionHeader;

/// Symbols extracted from one file, in source order.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub symbols: Vec<Symbol>,
    /// Matches skipped because an expected sub-capture was missing
    pub warnings: usize,
}

impl ExtractionResult {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.symbols.iter().map(|s| s.name.as_str()).collect()
    }
}

/// One recognized syntactic shape per query match.
#[derive(Debug, Clone, Copy)]
enum CaptureShape<'t> {
    Class {
        node: Node<'t>,
        name: Node<'t>,
        body: Node<'t>,
    },
    Function {
        node: Node<'t>,
        name: Node<'t>,
        params: Node<'t>,
        body: Node<'t>,
        return_type: Option<Node<'t>>,
        receiver: Option<Node<'t>>,
    },
    Call {
        node: Node<'t>,
    },
    Alias {
        node: Node<'t>,
        name: Node<'t>,
    },
}

/// Sorts a match into a [`CaptureShape`]. `Err` names the missing capture.
fn classify<'t>(
    capture_names: &[&str],
    m: &QueryMatch<'_, 't>,
) -> Option<Result<CaptureShape<'t>, &'static str>> {
    let mut captures: HashMap<&str, Node<'t>> = HashMap::new();
    for capture in m.captures {
        captures
            .entry(capture_names[capture.index as usize])
            .or_insert(capture.node);
    }
    let get = |key: &'static str| captures.get(key).copied().ok_or(key);

    let shape = if let Some(&node) = captures.get("class") {
        build_shape(|| {
            Ok(CaptureShape::Class {
                node,
                name: get("class.name")?,
                body: get("class.body")?,
            })
        })
    } else if let Some(&node) = captures.get("function") {
        build_shape(|| {
            Ok(CaptureShape::Function {
                node,
                name: get("function.name")?,
                params: get("function.params")?,
                body: get("function.body")?,
                return_type: captures.get("function.return_type").copied(),
                receiver: captures.get("function.receiver").copied(),
            })
        })
    } else if let Some(&node) = captures.get("alias") {
        get("alias.name").map(|name| CaptureShape::Alias { node, name })
    } else if let Some(&node) = captures.get("call") {
        Ok(CaptureShape::Call { node })
    } else {
        return None;
    };
    Some(shape)
}

fn build_shape<'t>(
    build: impl FnOnce() -> Result<CaptureShape<'t>, &'static str>,
) -> Result<CaptureShape<'t>, &'static str> {
    build()
}

/// Body ranges of extracted symbols, sorted by start line, used to attribute calls
/// to the innermost enclosing symbol.
#[derive(Debug, Default)]
struct BlockIndex {
    blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    owner: usize,
    start: Point,
    end: Point,
    len: usize,
}

impl Block {
    fn contains(&self, start: Point, end: Point) -> bool {
        if start.row < self.start.row || start.row > self.end.row {
            return false;
        }
        if start.row == self.start.row && start.column < self.start.column {
            return false;
        }
        if end.row > self.end.row || (end.row == self.end.row && end.column > self.end.column) {
            return false;
        }
        true
    }
}

impl BlockIndex {
    fn push(&mut self, owner: usize, body: &Node) {
        self.blocks.push(Block {
            owner,
            start: body.start_position(),
            end: body.end_position(),
            len: body.end_byte() - body.start_byte(),
        });
    }

    fn sort(&mut self) {
        self.blocks.sort_by_key(|b| (b.start.row, b.start.column));
    }

    /// Symbol index owning the innermost block that contains `start..end`.
    fn innermost(&self, start: Point, end: Point) -> Option<usize> {
        // Blocks at or left of the partition point start on or before the call line.
        let upper = self.blocks.partition_point(|b| b.start.row <= start.row);
        let mut best: Option<&Block> = None;

        for block in self.blocks[..upper].iter().rev() {
            if let Some(found) = best {
                // Anything starting on an earlier line can only enclose `found`.
                if block.start.row < found.start.row {
                    break;
                }
            }
            if block.contains(start, end) && best.map_or(true, |found| block.len < found.len) {
                best = Some(block);
            }
        }

        best.map(|b| b.owner)
    }
}

#[derive(Default)]
pub struct SymbolExtractor;

impl SymbolExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Turns the query matches of `parsed` into symbol records keyed by symbol path.
    /// A later definition with the same path replaces the earlier one.
    pub fn extract(&self, parsed: &ParsedFile, file_path: &Path) -> ExtractionResult {
        let file_path = file_path.to_string_lossy().to_string();
        let query = parsed.query;
        let capture_names = query.capture_names();

        let mut result = ExtractionResult::default();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut blocks = BlockIndex::default();
        let mut calls: Vec<(String, Point, Point)> = Vec::new();

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, parsed.root_node(), parsed.source_bytes());

        while let Some(m) = matches.next() {
            let shape = match classify(capture_names, m) {
                Some(Ok(shape)) => shape,
                Some(Err(missing)) => {
                    tracing::warn!(
                        "Skipping malformed match in {} (pattern {}): missing @{}",
                        file_path,
                        m.pattern_index,
                        missing
                    );
                    result.warnings += 1;
                    continue;
                }
                None => continue,
            };

            let (symbol, body) = match shape {
                CaptureShape::Call { node } => {
                    let name = collapse(parsed.node_text(&node), "");
                    if !name.is_empty() {
                        calls.push((name, node.start_position(), node.end_position()));
                    }
                    continue;
                }
                CaptureShape::Class { node, name, body } => {
                    (self.class_symbol(parsed, &file_path, node, name, body), Some(body))
                }
                CaptureShape::Function {
                    node,
                    name,
                    params,
                    body,
                    return_type,
                    receiver,
                } => (
                    self.function_symbol(
                        parsed,
                        &file_path,
                        node,
                        name,
                        params,
                        body,
                        return_type,
                        receiver,
                    ),
                    Some(body),
                ),
                CaptureShape::Alias { node, name } => {
                    (self.alias_symbol(parsed, &file_path, node, name), None)
                }
            };

            let Some(symbol) = symbol else {
                tracing::warn!("Skipping symbol with empty name in {}", file_path);
                result.warnings += 1;
                continue;
            };

            let slot = match by_name.get(&symbol.name) {
                Some(&slot) => {
                    result.symbols[slot] = symbol;
                    slot
                }
                None => {
                    by_name.insert(symbol.name.clone(), result.symbols.len());
                    result.symbols.push(symbol);
                    result.symbols.len() - 1
                }
            };
            if let Some(body) = body {
                blocks.push(slot, &body);
            }
        }

        blocks.sort();
        for (name, start, end) in calls {
            if let Some(owner) = blocks.innermost(start, end) {
                let symbol_calls = &mut result.symbols[owner].calls;
                if !symbol_calls.contains(&name) {
                    symbol_calls.push(name);
                }
            }
        }

        result
    }

    fn class_symbol(
        &self,
        parsed: &ParsedFile,
        file_path: &str,
        node: Node,
        name: Node,
        body: Node,
    ) -> Option<Symbol> {
        let short_name = parsed.node_text(&name);
        if short_name.is_empty() {
            return None;
        }
        let (qualified, _) = qualify(parsed, &node, short_name);
        let outer = self.definition_node(parsed, node);
        let header = collapse(header_text(parsed, &node, &body), ":{");
        let signature = parsed.grammar.format_class_signature(&header);

        Some(self.build_symbol(
            parsed,
            file_path,
            qualified,
            SymbolKind::Class,
            signature,
            parsed.node_text(&body),
            outer,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn function_symbol(
        &self,
        parsed: &ParsedFile,
        file_path: &str,
        node: Node,
        name: Node,
        params: Node,
        body: Node,
        return_type: Option<Node>,
        receiver: Option<Node>,
    ) -> Option<Symbol> {
        let short_name = parsed.node_text(&name);
        if short_name.is_empty() {
            return None;
        }

        let (qualified, kind) = match receiver {
            Some(receiver) => (
                format!("{}.{}", parsed.node_text(&receiver), short_name),
                SymbolKind::Method,
            ),
            None => qualify(parsed, &node, short_name),
        };

        let outer = self.definition_node(parsed, node);
        let decorators: Vec<String> = if outer.id() != node.id() {
            let mut walker = outer.walk();
            outer
                .named_children(&mut walker)
                .filter(|child| child.kind() == "decorator")
                .map(|child| collapse(parsed.node_text(&child), ""))
                .collect()
        } else {
            Vec::new()
        };
        let header = collapse(header_text(parsed, &node, &body), ":{");
        let return_type = return_type.map(|n| collapse(parsed.node_text(&n), ""));
        let params = collapse(parsed.node_text(&params), "");

        let signature = parsed.grammar.format_function_signature(&FunctionHeader {
            qualified_name: &qualified,
            header: &header,
            params: &params,
            return_type: return_type.as_deref(),
            decorators: decorators.iter().map(String::as_str).collect(),
            is_async: node.child(0).is_some_and(|first| first.kind() == "async"),
        });

        Some(self.build_symbol(
            parsed,
            file_path,
            qualified,
            kind,
            signature,
            parsed.node_text(&body),
            outer,
        ))
    }

    fn alias_symbol(
        &self,
        parsed: &ParsedFile,
        file_path: &str,
        node: Node,
        name: Node,
    ) -> Option<Symbol> {
        let name = parsed.node_text(&name);
        if name.is_empty() {
            return None;
        }
        let text = parsed.node_text(&node);
        let signature = collapse(text.lines().next().unwrap_or(""), "");
        Some(self.build_symbol(
            parsed,
            file_path,
            name.to_string(),
            SymbolKind::Alias,
            signature,
            text,
            node,
        ))
    }

    /// The node spanning a definition including its decorators.
    fn definition_node<'t>(&self, parsed: &ParsedFile, node: Node<'t>) -> Node<'t> {
        match (parsed.grammar.decorator_container(), node.parent()) {
            (Some(container), Some(parent)) if parent.kind() == container => parent,
            _ => node,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_symbol(
        &self,
        parsed: &ParsedFile,
        file_path: &str,
        name: String,
        kind: SymbolKind,
        signature: String,
        body: &str,
        outer: Node,
    ) -> Symbol {
        let full_definition = parsed.node_text(&outer).to_string();
        let start = outer.start_position();
        let end = outer.end_position();
        Symbol {
            name,
            file_path: file_path.to_string(),
            kind,
            signature,
            body: body.to_string(),
            definition_hash: definition_hash(&full_definition),
            full_definition,
            calls: Vec::new(),
            start_line: start.row as u32,
            start_col: start.column as u32,
            end_line: end.row as u32,
            end_col: end.column as u32,
            start_byte: outer.start_byte(),
            end_byte: outer.end_byte(),
        }
    }
}

/// Prefixes `short_name` with the names of enclosing classes and functions.
/// The kind is `Method` when the nearest enclosing definition is a class.
fn qualify(parsed: &ParsedFile, node: &Node, short_name: &str) -> (String, SymbolKind) {
    let class_kinds = parsed.grammar.class_kinds();
    let function_kinds = parsed.grammar.function_kinds();
    let is_class = class_kinds.contains(&node.kind());

    let mut parts = vec![short_name.to_string()];
    let mut kind = if is_class {
        SymbolKind::Class
    } else {
        SymbolKind::Function
    };
    let mut nearest = true;

    let mut current = node.parent();
    while let Some(ancestor) = current {
        let ancestor_kind = ancestor.kind();
        let is_class_scope = class_kinds.contains(&ancestor_kind);
        if is_class_scope || function_kinds.contains(&ancestor_kind) {
            if let Some(name) = ancestor.child_by_field_name("name") {
                parts.push(parsed.node_text(&name).to_string());
            }
            if nearest && !is_class && is_class_scope {
                kind = SymbolKind::Method;
            }
            nearest = false;
        }
        current = ancestor.parent();
    }

    parts.reverse();
    (parts.join("."), kind)
}

/// Source between the start of a definition and the start of its body.
fn header_text<'a>(parsed: &'a ParsedFile, node: &Node, body: &Node) -> &'a str {
    let start = node.start_byte();
    let end = body.start_byte().max(start);
    parsed.source.get(start..end).unwrap_or("")
}

/// Collapses whitespace runs to one space, then strips trailing `trim` characters.
fn collapse(text: &str, trim: &str) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    joined
        .trim_end_matches(|c: char| trim.contains(c) || c.is_whitespace())
        .to_string()
}
