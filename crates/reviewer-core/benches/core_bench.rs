//! Criterion benchmarks for reviewer-core.
//!
//! Everything here is pure Rust; the `python` feature is not needed.
//!
//! ## Benchmark groups
//!
//! 1. **schema**: DDL init and migration overhead.
//! 2. **indexing**: tree-sitter extraction on generated modules.
//! 3. **diff**: unified diff parsing.
//! 4. **ownership**: blame coalescing and range fractions.
//! 5. **fusion**: competition ranking and rank-sum fusion.
//! 6. **engine**: a full index, classify and rank run in memory.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/reviewer-core/Cargo.toml
//! # Run only the fusion group:
//! cargo bench --manifest-path crates/reviewer-core/Cargo.toml -- fusion
//! ```

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use rusqlite::Connection;

use _reviewer_core::diff::parse_unified_diff;
use _reviewer_core::indexer::symbols::index_source;
use _reviewer_core::models::{BlameEntry, LineRange, RankMap, ScoreMap, SourceFile};
use _reviewer_core::ownership::{coalesce_blame, ownership_fractions, PrecomputedBlame};
use _reviewer_core::scoring::{competition_rank, fuse};
use _reviewer_core::store::schema::{init_schema, migrate_schema};
use _reviewer_core::{Engine, EngineConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A module with `n` top-level functions and one class, each calling the
/// previous function through an imported alias.
fn generated_module(n: usize) -> String {
    let mut src = String::from("import json as j\nfrom os import path\n\n\nclass Holder:\n    def run(self):\n        return self.value\n\n\n");
    for i in 0..n {
        src.push_str(&format!(
            "def func_{i}(arg):\n    data = j.dumps(arg)\n    path.join(data, 'x')\n    return func_{prev}(data)\n\n\n",
            prev = i.saturating_sub(1)
        ));
    }
    src
}

fn generated_diff(files: usize, hunks: usize) -> String {
    let mut diff = String::new();
    for f in 0..files {
        diff.push_str(&format!(
            "diff --git a/pkg/mod_{f}.py b/pkg/mod_{f}.py\n--- a/pkg/mod_{f}.py\n+++ b/pkg/mod_{f}.py\n"
        ));
        for h in 0..hunks {
            let line = h * 20 + 1;
            diff.push_str(&format!(
                "@@ -{line},3 +{line},4 @@ def func_{h}(arg):\n context\n-old\n+new\n+extra\n context\n"
            ));
        }
    }
    diff
}

fn generated_blame(lines: usize, authors: usize) -> Vec<BlameEntry> {
    (0..lines)
        .map(|i| BlameEntry::new(format!("dev{}", (i / 7) % authors), vec![String::new()]))
        .collect()
}

fn generated_scores(n: usize) -> ScoreMap {
    (0..n)
        .map(|i| (format!("dev{i}"), ((i * 37) % 11) as f64 / 11.0))
        .collect::<IndexMap<_, _>>()
}

// ---------------------------------------------------------------------------
// 1. Schema
// ---------------------------------------------------------------------------

fn bench_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema");

    group.bench_function("init_and_migrate", |b| {
        b.iter(|| {
            let conn = Connection::open_in_memory().unwrap();
            init_schema(&conn).unwrap();
            black_box(conn);
        });
    });

    group.bench_function("migrate_noop_on_current", |b| {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        b.iter(|| migrate_schema(black_box(&conn)).unwrap());
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Indexing
// ---------------------------------------------------------------------------

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");

    for n in [10usize, 100, 500] {
        let source = generated_module(n);
        group.bench_with_input(BenchmarkId::new("index_source", n), &source, |b, src| {
            b.iter(|| index_source(black_box("pkg/gen.py"), src.clone(), 32).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Diff parsing
// ---------------------------------------------------------------------------

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");

    for (files, hunks) in [(1usize, 5usize), (20, 10), (200, 10)] {
        let text = generated_diff(files, hunks);
        group.bench_with_input(
            BenchmarkId::new("parse_unified_diff", format!("{files}x{hunks}")),
            &text,
            |b, text| b.iter(|| parse_unified_diff(black_box(text))),
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 4. Ownership
// ---------------------------------------------------------------------------

fn bench_ownership(c: &mut Criterion) {
    let mut group = c.benchmark_group("ownership");

    for lines in [100usize, 5_000] {
        let entries = generated_blame(lines, 5);
        group.bench_with_input(BenchmarkId::new("coalesce_blame", lines), &entries, |b, e| {
            b.iter(|| coalesce_blame(black_box("pkg/gen.py"), e));
        });

        let intervals = coalesce_blame("pkg/gen.py", &entries);
        let range = LineRange::new(1, lines as u32 / 2);
        group.bench_with_input(
            BenchmarkId::new("ownership_fractions", lines),
            &intervals,
            |b, iv| b.iter(|| ownership_fractions(iv, black_box(range))),
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 5. Fusion
// ---------------------------------------------------------------------------

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");

    for n in [10usize, 1_000] {
        let scores = generated_scores(n);
        group.bench_with_input(BenchmarkId::new("competition_rank", n), &scores, |b, s| {
            b.iter(|| competition_rank(black_box(s)));
        });

        let ranks: Vec<RankMap> = (0..3)
            .map(|shift| {
                let shifted: ScoreMap = scores
                    .iter()
                    .map(|(k, v)| (k.clone(), (v + shift as f64 * 0.1) % 1.0))
                    .collect();
                competition_rank(&shifted)
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("fuse", n), &ranks, |b, r| {
            b.iter(|| fuse(black_box(r)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 6. End to end
// ---------------------------------------------------------------------------

fn bench_engine(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let modules = 20usize;
    let mut files = Vec::new();
    let mut blame = PrecomputedBlame::new();
    let mut sources = HashMap::new();
    for m in 0..modules {
        let rel = format!("pkg/mod_{m}.py");
        let full = dir.path().join(format!("mod_{m}.py"));
        let body = generated_module(30);
        std::fs::write(&full, &body).unwrap();
        blame.insert(rel.clone(), generated_blame(body.lines().count(), 4));
        sources.insert(rel.clone(), body);
        files.push(SourceFile::new(full.to_string_lossy(), rel));
    }
    let diff = generated_diff(modules, 3);

    c.bench_function("engine_full_run_20_modules", |b| {
        b.iter(|| {
            let mut engine = Engine::in_memory(EngineConfig::default());
            engine.index_snapshot(&files).unwrap();
            engine.attribute_ownership(&files, "base", &blame).unwrap();
            engine.classify_changes(&diff, &sources).unwrap();
            black_box(engine.score_and_rank().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_schema,
    bench_indexing,
    bench_diff,
    bench_ownership,
    bench_fusion,
    bench_engine,
);
criterion_main!(benches);
