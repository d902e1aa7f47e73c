//! Byte-range patches checked against the bytes the caller expects to replace.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tempfile::NamedTempFile;

use crate::error::{IndexerError, Result};

const DIFF_CONTEXT_LINES: usize = 3;

/// Leading bytes of common binary formats.
const BINARY_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG", "PNG"),
    (b"\xFF\xD8\xFF", "JPEG"),
    (b"GIF8", "GIF"),
    (b"BM", "BMP"),
    (b"%PDF", "PDF"),
    (b"MZ", "PE"),
    (b"\x7FELF", "ELF"),
    (b"PK\x03\x04", "ZIP"),
    (b"Rar!", "RAR"),
];

/// One text edit, the shape accepted from JSON callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatchEdit {
    pub file_path: String,
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Text currently at `start..end`
    pub expected: String,
    pub replacement: String,
}

/// Parallel lists: edit `i` replaces `ranges[i]` of `file_paths[i]`, whose
/// current bytes must equal `expected[i]`, with `replacements[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub file_paths: Vec<String>,
    pub ranges: Vec<(usize, usize)>,
    pub expected: Vec<Vec<u8>>,
    pub replacements: Vec<Vec<u8>>,
}

impl PatchRequest {
    pub fn new(
        file_paths: Vec<String>,
        ranges: Vec<(usize, usize)>,
        expected: Vec<Vec<u8>>,
        replacements: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let request = Self {
            file_paths,
            ranges,
            expected,
            replacements,
        };
        request.check_shape()?;
        Ok(request)
    }

    pub fn from_edits(edits: impl IntoIterator<Item = PatchEdit>) -> Self {
        let mut request = Self::default();
        for edit in edits {
            request.push(edit.file_path, (edit.start, edit.end), edit.expected, edit.replacement);
        }
        request
    }

    /// Appends one edit.
    pub fn push(
        &mut self,
        file_path: impl Into<String>,
        range: (usize, usize),
        expected: impl Into<Vec<u8>>,
        replacement: impl Into<Vec<u8>>,
    ) {
        self.file_paths.push(file_path.into());
        self.ranges.push(range);
        self.expected.push(expected.into());
        self.replacements.push(replacement.into());
    }

    pub fn len(&self) -> usize {
        self.file_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_paths.is_empty()
    }

    fn check_shape(&self) -> Result<()> {
        let n = self.file_paths.len();
        if self.ranges.len() != n || self.expected.len() != n || self.replacements.len() != n {
            return Err(IndexerError::InvalidInput(format!(
                "patch lists differ in length: {} paths, {} ranges, {} expected, {} replacements",
                n,
                self.ranges.len(),
                self.expected.len(),
                self.replacements.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Edit<'r> {
    start: usize,
    end: usize,
    expected: &'r [u8],
    replacement: &'r [u8],
}

/// Validated edits of one file together with its current contents.
#[derive(Debug)]
struct FilePlan<'r> {
    original: Vec<u8>,
    edits: Vec<Edit<'r>>,
}

impl FilePlan<'_> {
    fn is_noop(&self) -> bool {
        self.edits.is_empty()
    }

    /// Splices the edits back to front so earlier offsets stay valid.
    fn patched(&self) -> Vec<u8> {
        let mut content = self.original.clone();
        for edit in self.edits.iter().rev() {
            content.splice(edit.start..edit.end, edit.replacement.iter().copied());
        }
        content
    }
}

fn binary_kind(bytes: &[u8]) -> Option<&'static str> {
    BINARY_SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, kind)| *kind)
}

fn not_found_as_path_error(path: &str) -> impl FnOnce(std::io::Error) -> IndexerError + '_ {
    move |e| match e.kind() {
        ErrorKind::NotFound => IndexerError::PathNotFound(path.to_string()),
        _ => IndexerError::Io(e),
    }
}

/// Absolute path with `.`/`..` and symlinks resolved, so aliases of one
/// file land in the same plan.
fn canonical(path: &str) -> Result<String> {
    let resolved = fs::canonicalize(path).map_err(not_found_as_path_error(path))?;
    Ok(resolved.to_string_lossy().into_owned())
}

fn load_text(path: &str) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(not_found_as_path_error(path))?;
    if let Some(kind) = binary_kind(&bytes) {
        return Err(IndexerError::InvalidInput(format!(
            "{} looks like a {} file; refusing to patch binary content",
            path, kind
        )));
    }
    if std::str::from_utf8(&bytes).is_err() {
        return Err(IndexerError::InvalidInput(format!(
            "{} is not valid UTF-8",
            path
        )));
    }
    Ok(bytes)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PatchEngine;

impl PatchEngine {
    pub fn new() -> Self {
        Self
    }

    /// Checks every edit of every file without touching the disk beyond reads.
    fn plan<'r>(&self, request: &'r PatchRequest) -> Result<BTreeMap<String, FilePlan<'r>>> {
        request.check_shape()?;

        let mut resolved: BTreeMap<&str, String> = BTreeMap::new();
        let mut grouped: BTreeMap<String, Vec<Edit<'r>>> = BTreeMap::new();
        for i in 0..request.len() {
            let (start, end) = request.ranges[i];
            let raw = request.file_paths[i].as_str();
            let path = match resolved.get(raw) {
                Some(path) => path.clone(),
                None => {
                    let path = canonical(raw)?;
                    resolved.insert(raw, path.clone());
                    path
                }
            };
            grouped.entry(path).or_default().push(Edit {
                start,
                end,
                expected: &request.expected[i],
                replacement: &request.replacements[i],
            });
        }

        let mut plans = BTreeMap::new();
        for (path, mut edits) in grouped {
            let original = load_text(&path)?;

            for edit in &edits {
                if edit.start > edit.end || edit.end > original.len() {
                    return Err(IndexerError::InvalidInput(format!(
                        "range ({}, {}) is outside {} ({} bytes)",
                        edit.start,
                        edit.end,
                        path,
                        original.len()
                    )));
                }
            }

            edits.sort_by_key(|e| (e.start, e.end));
            for pair in edits.windows(2) {
                if pair[1].start < pair[0].end {
                    return Err(IndexerError::PatchOverlap {
                        file: path.to_string(),
                        first: (pair[0].start, pair[0].end),
                        second: (pair[1].start, pair[1].end),
                    });
                }
            }

            for edit in &edits {
                if &original[edit.start..edit.end] != edit.expected {
                    return Err(IndexerError::PatchContentMismatch {
                        file: path.to_string(),
                        start: edit.start,
                        end: edit.end,
                    });
                }
            }

            edits.retain(|e| e.expected != e.replacement);
            plans.insert(path, FilePlan { original, edits });
        }
        Ok(plans)
    }

    /// Unified diff of what `apply` would write, one section per changed file.
    /// Empty when every edit is a no-op.
    pub fn generate_diff(&self, request: &PatchRequest) -> Result<String> {
        let plans = self.plan(request)?;
        let mut out = String::new();

        for (path, plan) in &plans {
            if plan.is_noop() {
                continue;
            }
            let old = String::from_utf8_lossy(&plan.original);
            let patched = plan.patched();
            let new = String::from_utf8_lossy(&patched);

            let diff = TextDiff::from_lines(&*old, &*new);
            out.push_str(
                &diff
                    .unified_diff()
                    .context_radius(DIFF_CONTEXT_LINES)
                    .header(path, path)
                    .to_string(),
            );
        }
        Ok(out)
    }

    /// Validates the whole request, then replaces each changed file.
    /// Returns the new contents of every written file, keyed by canonical path.
    pub fn apply(&self, request: &PatchRequest) -> Result<BTreeMap<String, Vec<u8>>> {
        let plans = self.plan(request)?;

        let updates: BTreeMap<String, Vec<u8>> = plans
            .into_iter()
            .filter(|(_, plan)| !plan.is_noop())
            .map(|(path, plan)| {
                let patched = plan.patched();
                (path, patched)
            })
            .collect();

        for (path, content) in &updates {
            write_atomic(Path::new(path), content)?;
            tracing::info!("Patched {} ({} bytes)", path, content.len());
        }
        Ok(updates)
    }
}

/// Writes `content` to a sibling temp file and renames it over `path`.
/// The original permissions are carried over.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        IndexerError::InvalidInput(format!("{} has no parent directory", path.display()))
    })?;
    let permissions = fs::metadata(path)?.permissions();

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|e| IndexerError::Io(e.error))?;
    Ok(())
}
