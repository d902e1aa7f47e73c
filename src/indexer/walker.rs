use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use ignore::WalkBuilder;

use crate::error::{IndexerError, Result};
use crate::languages::LanguageRegistry;

/// Collects indexable files under a root, honoring ignore files, suffix
/// filters and glob excludes.
pub struct FileWalker {
    registry: Arc<LanguageRegistry>,
    excludes: Vec<Pattern>,
    suffixes: Vec<String>,
}

impl FileWalker {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        let suffixes = registry.supported_extensions();
        Self {
            registry,
            excludes: Vec::new(),
            suffixes,
        }
    }

    /// Glob patterns matched against the absolute path of each file.
    pub fn with_excludes(mut self, excludes: &[String]) -> Result<Self> {
        self.excludes = excludes
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    IndexerError::InvalidInput(format!("invalid exclude pattern {:?}: {}", p, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// Restricts the walk to these suffixes (`.py` or `py`), compared without
    /// regard to case. Empty keeps every supported extension.
    pub fn with_suffixes(mut self, suffixes: &[String]) -> Self {
        if !suffixes.is_empty() {
            self.suffixes = suffixes
                .iter()
                .map(|s| {
                    let s = s.to_ascii_lowercase();
                    if s.starts_with('.') {
                        s
                    } else {
                        format!(".{}", s)
                    }
                })
                .collect();
        }
        self
    }

    /// Absolute paths of every matching file under `root`, sorted.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let root = root.canonicalize()?;
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if path.is_file() && self.is_included(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn is_included(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_ascii_lowercase(),
            None => return false,
        };
        if !self.suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        if self.registry.get_for_file(path).is_none() {
            return false;
        }
        !self.is_excluded(path)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.excludes.iter().any(|p| p.matches(&text))
    }
}
