use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Alias,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Alias => "alias",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "class" => Some(SymbolKind::Class),
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "alias" => Some(SymbolKind::Alias),
            _ => None,
        }
    }
}

/// 32-bit checksum of a symbol's full definition text.
pub fn definition_hash(full_definition: &str) -> u32 {
    crc32fast::hash(full_definition.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Dotted symbol path, e.g. `Outer.Inner.method`
    pub name: String,
    pub file_path: String,
    pub kind: SymbolKind,
    /// Single-line declaration
    pub signature: String,
    pub body: String,
    /// Decorators, signature and body exactly as they appear in the file
    pub full_definition: String,
    pub definition_hash: u32,
    /// Referenced names in first-seen order, without duplicates
    pub calls: Vec<String>,
    /// 0-based row/column positions
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Symbol {
    pub fn byte_range(&self) -> (usize, usize) {
        (self.start_byte, self.end_byte)
    }

    pub fn location(&self) -> SymbolLocation {
        SymbolLocation {
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: self.end_line,
            end_col: self.end_col,
            start_byte: self.start_byte,
            end_byte: self.end_byte,
        }
    }

    pub fn summary(&self) -> SymbolSummary {
        SymbolSummary {
            file_path: self.file_path.clone(),
            signature: self.signature.clone(),
            definition_hash: self.definition_hash,
        }
    }
}

/// What the prefix index remembers about one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub file_path: String,
    pub signature: String,
    pub definition_hash: u32,
}

/// Where a definition sits in its file: 0-based rows and columns plus the byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// Source text of one definition as it currently reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolContent {
    pub name: String,
    pub file_path: String,
    pub content: String,
    pub location: SymbolLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_path: String,
    /// Seconds since the Unix epoch
    pub last_modified: f64,
    pub content_hash: String,
    pub symbol_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDefinition {
    pub name: String,
    pub file_path: String,
    pub full_definition: String,
}

/// A symbol together with the definitions it reaches through its calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub symbol_name: String,
    pub file_path: Option<String>,
    pub max_depth: u32,
    pub definitions: Vec<ContextDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub name: String,
    pub details: SymbolSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_symbols: usize,
    pub symbols_by_kind: Vec<(String, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_kind_roundtrip_names() {
        for kind in [
            SymbolKind::Class,
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Alias,
        ] {
            assert_eq!(SymbolKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::from_str("struct"), None);
    }

    #[test]
    fn test_definition_hash_is_crc32() {
        // Standard CRC-32 check value
        assert_eq!(definition_hash("123456789"), 0xCBF4_3926);
        assert_ne!(definition_hash("def a(): pass"), definition_hash("def a(): return"));
    }
}
