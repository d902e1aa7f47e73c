//! Benchmarks for query operations over a populated index.
//!
//! Run with: `cargo bench --bench search`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use symbol_indexer::index::definition_hash;
use symbol_indexer::{IndexContext, Symbol, SymbolKind, SymbolStore};

struct SearchPattern {
    name: &'static str,
    query: &'static str,
}

const PREFIX_PATTERNS: &[SearchPattern] = &[
    SearchPattern {
        name: "short",
        query: "get",
    },
    SearchPattern {
        name: "long",
        query: "get_value_1",
    },
    SearchPattern {
        name: "qualified",
        query: "symbol:file_3.py/get",
    },
    SearchPattern {
        name: "composite",
        query: "symbol:file_3.py/get_value_30,set",
    },
    SearchPattern {
        name: "fallback",
        query: "value_42",
    },
];

fn populated_context() -> IndexContext {
    let ctx = IndexContext::in_memory().unwrap();
    for file in 0..50 {
        let path = format!("/bench/file_{}.py", file);
        let symbols: Vec<Symbol> = (0..100)
            .flat_map(|i| ["get", "set"].map(|verb| (verb, i)))
            .map(|(verb, i)| {
                let name = format!("{}_value_{}", verb, file * 100 + i);
                let full_definition = format!("def {}():\n    return {}", name, i);
                Symbol {
                    signature: format!("def {}():", name),
                    body: format!("return {}", i),
                    definition_hash: definition_hash(&full_definition),
                    full_definition,
                    kind: SymbolKind::Function,
                    file_path: path.clone(),
                    calls: Vec::new(),
                    start_line: 0,
                    start_col: 0,
                    end_line: 1,
                    end_col: 0,
                    start_byte: 0,
                    end_byte: 0,
                    name,
                }
            })
            .collect();
        ctx.store().upsert(&symbols, &path).unwrap();
    }
    ctx.rebuild_trie().unwrap();
    ctx
}

fn bench_complete(c: &mut Criterion) {
    let ctx = populated_context();
    let mut group = c.benchmark_group("complete");

    for pattern in PREFIX_PATTERNS {
        group.bench_with_input(
            BenchmarkId::from_parameter(pattern.name),
            &pattern.query,
            |b, query| b.iter(|| black_box(ctx.complete(query, Some(10)).unwrap())),
        );
    }
    group.finish();
}

fn bench_store_queries(c: &mut Criterion) {
    let ctx = populated_context();
    let mut group = c.benchmark_group("store");

    group.bench_function("search_by_prefix", |b| {
        b.iter(|| black_box(ctx.search("get_value_1", 100).unwrap()))
    });
    group.bench_function("get", |b| {
        b.iter(|| black_box(ctx.get("set_value_2042", None).unwrap()))
    });
    group.bench_function("rebuild_trie", |b| b.iter(|| ctx.rebuild_trie().unwrap()));
    group.finish();
}

criterion_group!(benches, bench_complete, bench_store_queries);
criterion_main!(benches);
