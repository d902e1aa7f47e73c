//! End-to-end tests for scanning source trees into an index.
//!
//! Fixtures are written into temporary directories and scanned into
//! on-disk SQLite databases, then queried through `IndexContext`.

use std::fs;
use std::path::{Path, PathBuf};

use symbol_indexer::{build_index, IndexContext, ScanOptions, SymbolKind};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn options(root: &Path) -> ScanOptions {
    ScanOptions {
        parallelism: Some(2),
        ..ScanOptions::new([root])
    }
}

const PYTHON_APP: &str = r#"
def some_function():
    pass

class A:
    class B:
        @staticmethod
        def f():
            pass

class MyClass:
    def other_method(self):
        pass

    @A.B.f()
    def my_method(self):
        A.B.f()
        self.other_method()
        some_function()
        self.attr
        A.B.f
"#;

const C_SOURCE: &str = r#"
#include <stdio.h>

static void debug(const char *msg) {
    fprintf(stderr, "%s\n", msg);
}

static void print(int x) {
    printf("%d\n", x);
}

int main(void) {
    debug("start");
    print(42);
    return 0;
}
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app/calls.py", PYTHON_APP);
    write(dir.path(), "native/a.c", C_SOURCE);
    write(
        dir.path(),
        "web/util.js",
        "function greet(name) {\n  return format(name);\n}\n",
    );
    write(
        dir.path(),
        "svc/server.go",
        "package svc\n\ntype Server struct{}\n\nfunc (s *Server) Start() error {\n\treturn listen()\n}\n",
    );
    write(
        dir.path(),
        "java/Calculator.java",
        "public class Calculator {\n    public int add(int a, int b) {\n        return Math.addExact(a, b);\n    }\n}\n",
    );
    dir
}

// ============================================================================
// Scanning
// ============================================================================

mod scanning {
    use super::*;

    #[test]
    fn test_scan_indexes_every_language() {
        let dir = project();
        let db = dir.path().join("index.db");
        let report = build_index(&db, &options(dir.path())).unwrap();

        assert_eq!(report.files_seen, 5);
        assert_eq!(report.files_parsed, 5);
        assert_eq!(report.files_failed, 0);

        let ctx = IndexContext::open(&db).unwrap();
        assert_eq!(ctx.list_files().unwrap().len(), 5);
        assert_eq!(ctx.get("main", None).unwrap().len(), 1);
        assert_eq!(ctx.get("greet", None).unwrap().len(), 1);
        assert_eq!(ctx.get("Server.Start", None).unwrap().len(), 1);
        assert_eq!(ctx.get("Calculator.add", None).unwrap().len(), 1);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let dir = project();
        let db = dir.path().join("index.db");
        build_index(&db, &options(dir.path())).unwrap();

        let ctx = IndexContext::open(&db).unwrap();
        let before = ctx.stats().unwrap();
        let trie_before = ctx.trie_size();

        let forced = ScanOptions {
            force: true,
            ..options(dir.path())
        };
        let report = ctx.scan(&forced).unwrap();
        assert_eq!(report.symbols_written, 0);
        assert_eq!(report.symbols_pruned, 0);

        let after = ctx.stats().unwrap();
        assert_eq!(before.total_symbols, after.total_symbols);
        assert_eq!(before.total_files, after.total_files);
        assert_eq!(trie_before, ctx.trie_size());
    }

    #[test]
    fn test_unchanged_files_are_skipped() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        let report = ctx.scan(&options(dir.path())).unwrap();
        assert_eq!(report.files_skipped, 5);
        assert_eq!(report.files_parsed, 0);
    }

    #[test]
    fn test_excludes_and_suffixes() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        let options = ScanOptions {
            excludes: vec!["*/java/*".to_string()],
            include_suffixes: vec![".java".to_string(), ".go".to_string()],
            ..options(dir.path())
        };
        let report = ctx.scan(&options).unwrap();

        assert_eq!(report.files_seen, 1);
        assert!(ctx.list_files().unwrap()[0].ends_with("server.go"));
    }
}

// ============================================================================
// Deduplication and pruning
// ============================================================================

mod store_contents {
    use super::*;

    #[test]
    fn test_identical_definitions_stored_once() {
        let dir = TempDir::new().unwrap();
        let body = "def shared():\n    return 1\n";
        write(dir.path(), "one.py", body);
        write(dir.path(), "two.py", body);

        let ctx = IndexContext::in_memory().unwrap();
        let report = ctx.scan(&options(dir.path())).unwrap();

        assert_eq!(report.symbols_written, 1);
        assert_eq!(ctx.get("shared", None).unwrap().len(), 1);
    }

    #[test]
    fn test_identical_copy_survives_deleted_file() {
        let dir = TempDir::new().unwrap();
        let body = "def util():\n    return 1\n";
        let first = write(dir.path(), "a.py", body);
        write(dir.path(), "b.py", body);

        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();
        assert_eq!(ctx.get("util", None).unwrap().len(), 1);

        fs::remove_file(first).unwrap();
        let report = ctx.scan(&options(dir.path())).unwrap();
        assert_eq!(report.files_purged, 1);
        assert_eq!(report.files_skipped, 1);

        let found = ctx.get("util", None).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].file_path.ends_with("b.py"));
        assert!(ctx.complete("uti", None).unwrap()[0]
            .details
            .file_path
            .ends_with("b.py"));
    }

    #[test]
    fn test_identical_copy_survives_removed_definition() {
        let dir = TempDir::new().unwrap();
        let body = "def util():\n    return 1\n";
        let first = write(dir.path(), "a.py", body);
        let second = write(dir.path(), "b.py", body);

        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        // Whichever file won the row, dropping util from it keeps the other copy.
        let stored = ctx.get("util", None).unwrap()[0].file_path.clone();
        let (owner, other) = if stored.ends_with("a.py") {
            (first, "b.py")
        } else {
            (second, "a.py")
        };
        fs::write(&owner, "def other():\n    return 2\n").unwrap();
        let forced = ScanOptions {
            force: true,
            ..options(dir.path())
        };
        ctx.scan(&forced).unwrap();

        let found = ctx.get("util", None).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].file_path.ends_with(other));
        assert_eq!(ctx.get("other", None).unwrap().len(), 1);
    }

    #[test]
    fn test_changed_and_removed_symbols() {
        let dir = TempDir::new().unwrap();
        let file = write(
            dir.path(),
            "mod.py",
            "def keep():\n    return 1\n\ndef drop():\n    return 2\n",
        );

        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();
        assert_eq!(ctx.get("drop", None).unwrap().len(), 1);

        fs::write(&file, "def keep():\n    return 10\n").unwrap();
        let forced = ScanOptions {
            force: true,
            ..options(dir.path())
        };
        let report = ctx.scan(&forced).unwrap();

        assert_eq!(report.symbols_written, 1);
        assert_eq!(report.symbols_pruned, 1);
        assert!(ctx.get("drop", None).unwrap().is_empty());
        assert!(ctx.get("keep", None).unwrap()[0]
            .full_definition
            .contains("return 10"));
    }

    #[test]
    fn test_deleted_file_is_purged() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        fs::remove_file(dir.path().join("web/util.js")).unwrap();
        let report = ctx.scan(&options(dir.path())).unwrap();

        assert_eq!(report.files_purged, 1);
        assert!(ctx.get("greet", None).unwrap().is_empty());
        assert_eq!(ctx.stats().unwrap().total_files, 4);
    }
}

// ============================================================================
// Queries over a scanned tree
// ============================================================================

mod queries {
    use super::*;

    #[test]
    fn test_call_attribution() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        let method = &ctx.get("MyClass.my_method", None).unwrap()[0];
        assert_eq!(method.kind, SymbolKind::Method);
        let mut calls = method.calls.clone();
        calls.sort();
        assert_eq!(
            calls,
            vec!["A.B", "A.B.f", "self.attr", "self.other_method", "some_function"]
        );

        let main = &ctx.get("main", Some("a.c")).unwrap()[0];
        assert_eq!(main.calls, vec!["debug", "print"]);
    }

    #[test]
    fn test_composite_completion() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        let completions = ctx.complete("symbol:a.c/main,d", None).unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].name, "symbol:a.c/main,debug");
        assert_eq!(completions[0].details.signature, "static void debug(const char *msg)");
    }

    #[test]
    fn test_call_context_follows_self_calls() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        let context = ctx.context("MyClass.my_method", None, 1).unwrap();
        let names: Vec<&str> = context.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names[0], "MyClass.my_method");
        assert!(names.contains(&"MyClass.other_method"));
        assert!(names.contains(&"some_function"));
        assert!(names.contains(&"A.B.f"));
    }

    #[test]
    fn test_symbol_content_reads_current_source() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        let content = ctx.symbol_text("greet", None).unwrap();
        assert!(content.starts_with("function greet(name)"));
        assert!(content.ends_with('}'));

        let located = ctx.symbol_content("greet", None).unwrap();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].content, content);
        assert!(located[0].location.end_byte > located[0].location.start_byte);
    }

    #[test]
    fn test_prefix_search() {
        let dir = project();
        let ctx = IndexContext::in_memory().unwrap();
        ctx.scan(&options(dir.path())).unwrap();

        let names: Vec<String> = ctx
            .search("MyClass", 10)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(
            names,
            vec!["MyClass", "MyClass.my_method", "MyClass.other_method"]
        );
    }
}
