//! Benchmarks for scanning source trees.
//!
//! Run with: `cargo bench --bench indexing`
//!
//! Projects are generated into a temporary directory, so no downloads are needed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use symbol_indexer::{FileWalker, IndexContext, LanguageRegistry, ScanOptions};
use tempfile::TempDir;

/// Writes `modules` Python files, each with a class and `functions` functions.
fn generate_project(root: &Path, modules: usize, functions: usize) {
    for m in 0..modules {
        let mut source = format!("class Service{m}:\n    def run(self):\n        return helper_{m}_0()\n\n");
        for f in 0..functions {
            source.push_str(&format!(
                "def helper_{m}_{f}(x=0):\n    value = x * {f}\n    return compute(value)\n\n"
            ));
        }
        let dir = root.join(format!("pkg_{}", m % 8));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("module_{m}.py")), source).unwrap();
    }
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    let project = TempDir::new().unwrap();
    generate_project(project.path(), 200, 20);

    for parallelism in [1i64, 4] {
        group.bench_with_input(
            BenchmarkId::new("cold", parallelism),
            &parallelism,
            |b, &parallelism| {
                b.iter(|| {
                    let ctx = IndexContext::in_memory().unwrap();
                    let options = ScanOptions {
                        parallelism: Some(parallelism),
                        ..ScanOptions::new([project.path()])
                    };
                    black_box(ctx.scan(&options).unwrap())
                });
            },
        );
    }

    // Second scan of an unchanged tree: walk plus mtime gate only.
    let ctx = IndexContext::in_memory().unwrap();
    let options = ScanOptions::new([project.path()]);
    ctx.scan(&options).unwrap();
    group.bench_function("warm", |b| {
        b.iter(|| black_box(ctx.scan(&options).unwrap()));
    });

    group.finish();
}

fn bench_file_walking(c: &mut Criterion) {
    let project = TempDir::new().unwrap();
    generate_project(project.path(), 500, 1);

    c.bench_function("file_walking", |b| {
        let walker = FileWalker::new(Arc::new(LanguageRegistry::new()));
        b.iter(|| black_box(walker.walk(project.path()).unwrap().len()));
    });
}

criterion_group!(benches, bench_scan, bench_file_walking);
criterion_main!(benches);
