//! Criterion benchmarks for Tessera.
//!
//! Covers the hot paths of the engine:
//! - Text analysis
//! - Indexing and committing
//! - Term, boolean, range and fuzzy search

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tessera::analysis::{Analyzer, StandardAnalyzer};
use tessera::prelude::*;

/// Generate test documents for benchmarking.
fn generate_test_documents(count: usize) -> Vec<String> {
    let words = [
        "search", "engine", "full", "text", "index", "query", "document", "field", "term",
        "boolean", "range", "fuzzy", "spatial", "relevance", "score", "analysis", "segment",
        "commit", "posting", "dictionary", "storage", "retrieval", "ranking", "filtering",
    ];

    (0..count)
        .map(|i| {
            let doc_length = 20 + (i % 60);
            (0..doc_length)
                .map(|j| words[(i * 7 + j * 13) % words.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn build_index(texts: &[String]) -> Directory {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default()).unwrap();
    for (i, text) in texts.iter().enumerate() {
        let doc = Document::builder()
            .add(Field::text("body", text.as_str(), Store::No))
            .add(Field::int64("rank", i as i64, Store::No))
            .add(Field::geo_point(
                "location",
                GeoPoint::new((i % 170) as f64 - 85.0, (i % 350) as f64 - 175.0).unwrap(),
                Store::No,
            ))
            .build()
            .unwrap();
        writer.add_document(&doc).unwrap();
    }
    writer.commit().unwrap();
    directory
}

/// Benchmark text analysis.
fn bench_text_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_analysis");

    let analyzer = StandardAnalyzer::new();
    let texts = generate_test_documents(1000);

    group.throughput(Throughput::Elements(100));
    group.bench_function("analyze_batch_documents", |b| {
        b.iter(|| {
            for text in texts.iter().take(100) {
                let _ = black_box(analyzer.analyze(black_box(text)));
            }
        })
    });

    group.finish();
}

/// Benchmark indexing and committing.
fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");
    group.sample_size(20);

    let texts = generate_test_documents(1000);
    group.throughput(Throughput::Elements(texts.len() as u64));
    group.bench_function("index_and_commit_1000", |b| {
        b.iter(|| black_box(build_index(&texts)))
    });

    group.finish();
}

/// Benchmark query evaluation.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    let texts = generate_test_documents(5000);
    let directory = build_index(&texts);
    let reader = Arc::new(IndexReader::open(&directory).unwrap());
    let searcher = IndexSearcher::new(reader, SearchConfig::default());
    let options = SearchOptions::default();

    let term = TermQuery::new("body", "segment");
    group.bench_function("term_top10", |b| {
        b.iter(|| black_box(searcher.search(&term, 10, &options).unwrap()))
    });

    let boolean = BooleanQuery::builder()
        .must(TermQuery::new("body", "search"))
        .should(TermQuery::new("body", "ranking"))
        .must_not(TermQuery::new("body", "fuzzy"))
        .build();
    group.bench_function("boolean_top10", |b| {
        b.iter(|| black_box(searcher.search(&boolean, 10, &options).unwrap()))
    });

    let range = NumericRangeQuery::inclusive("rank", 1000i64, 2000i64);
    group.bench_function("numeric_range_top10", |b| {
        b.iter(|| black_box(searcher.search(&range, 10, &options).unwrap()))
    });

    let fuzzy = FuzzyQuery::new("body", "serch", 1);
    group.bench_function("fuzzy_top10", |b| {
        b.iter(|| black_box(searcher.search(&fuzzy, 10, &options).unwrap()))
    });

    let spatial = SpatialWithinQuery::new("location", GeoPoint::new(0.0, 0.0).unwrap(), 4);
    group.bench_function("spatial_top10", |b| {
        b.iter(|| black_box(searcher.search(&spatial, 10, &options).unwrap()))
    });

    let parallel = IndexSearcher::new(
        Arc::clone(searcher.reader()),
        SearchConfig {
            parallel: true,
            ..SearchConfig::default()
        },
    );
    group.bench_function("term_top10_parallel", |b| {
        b.iter(|| black_box(parallel.search(&term, 10, &options).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_text_analysis, bench_indexing, bench_search);
criterion_main!(benches);
