//! Query semantics over a small committed corpus.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

use tessera::prelude::*;

struct Row {
    body: &'static str,
    lang: &'static str,
    year: i32,
    price: f64,
    stock: Option<i64>,
}

const ROWS: &[Row] = &[
    Row { body: "rust search engine", lang: "rust", year: 2015, price: 10.5, stock: Some(3) },
    Row { body: "java search server", lang: "java", year: 1995, price: 20.0, stock: Some(0) },
    Row { body: "rust web server", lang: "rust", year: 2015, price: 5.25, stock: Some(12) },
    Row { body: "python data search", lang: "python", year: 1991, price: -1.5, stock: Some(7) },
    Row { body: "rust systems", lang: "rust", year: 2010, price: 30.0, stock: None },
];

fn corpus(config: SearchConfig) -> Result<IndexSearcher> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let writer_config = WriterConfig {
        max_buffered_docs: 2,
        ..WriterConfig::default()
    };
    let mut writer = IndexWriter::open(directory.clone(), writer_config)?;
    for row in ROWS {
        let mut builder = Document::builder()
            .add(Field::text("body", row.body, Store::Yes))
            .add(Field::string("lang", row.lang, Store::Yes))
            .add(Field::int32("year", row.year, Store::Yes))
            .add(Field::double("price", row.price, Store::Yes));
        if let Some(stock) = row.stock {
            builder = builder.add(Field::numeric_doc_value("stock", stock));
        }
        writer.add_document(&builder.build()?)?;
    }
    writer.commit()?;

    let reader = Arc::new(IndexReader::open(&directory)?);
    Ok(IndexSearcher::new(reader, config))
}

fn matches(searcher: &IndexSearcher, query: &dyn Query) -> Result<BTreeSet<DocId>> {
    let top = searcher.search(query, 100, &SearchOptions::default())?;
    assert!(top.complete);
    assert_eq!(top.total_hits as usize, top.hits.len());
    Ok(top.hits.iter().map(|hit| hit.doc_id).collect())
}

fn set(ids: &[DocId]) -> BTreeSet<DocId> {
    ids.iter().copied().collect()
}

fn term(field: &str, token: &str) -> TermQuery {
    TermQuery::new(field, token)
}

#[test]
fn test_boolean_set_algebra() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;
    let rust = matches(&searcher, &term("body", "rust"))?;
    let server = matches(&searcher, &term("body", "server"))?;
    let search = matches(&searcher, &term("body", "search"))?;

    let must = BooleanQuery::builder()
        .must(term("body", "rust"))
        .must(term("body", "server"))
        .build();
    assert_eq!(matches(&searcher, &must)?, &rust & &server);

    let should = BooleanQuery::builder()
        .should(term("body", "rust"))
        .should(term("body", "server"))
        .build();
    assert_eq!(matches(&searcher, &should)?, &rust | &server);

    let must_not = BooleanQuery::builder()
        .must(term("body", "search"))
        .must_not(term("body", "rust"))
        .build();
    assert_eq!(matches(&searcher, &must_not)?, &search - &rust);
    assert_eq!(matches(&searcher, &must_not)?, set(&[1, 3]));
    Ok(())
}

#[test]
fn test_should_beside_must_only_scores() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;
    let query = BooleanQuery::builder()
        .must(term("lang", "rust"))
        .should(term("body", "server"))
        .build();

    assert_eq!(matches(&searcher, &query)?, matches(&searcher, &term("lang", "rust"))?);

    let top = searcher.search(&query, 10, &SearchOptions::default())?;
    let ids: Vec<DocId> = top.hits.iter().map(|hit| hit.doc_id).collect();
    assert_eq!(ids, vec![2, 0, 4]);
    assert!(top.hits[0].score > top.hits[1].score);
    assert_eq!(top.hits[1].score, top.hits[2].score);
    Ok(())
}

#[test]
fn test_nested_boolean() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;
    let languages = BooleanQuery::builder()
        .should(term("lang", "java"))
        .should(term("lang", "python"))
        .build();
    let query = BooleanQuery::builder()
        .must(languages)
        .must(term("body", "search"))
        .build();
    assert_eq!(matches(&searcher, &query)?, set(&[1, 3]));
    Ok(())
}

#[test]
fn test_inclusive_and_open_int_ranges() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;

    let closed = NumericRangeQuery::inclusive("year", 1995, 2010);
    assert_eq!(matches(&searcher, &closed)?, set(&[1, 4]));

    let above = NumericRangeQuery::with_bounds("year", Some(NumericValue::Int(2010)), None, false, true);
    assert_eq!(matches(&searcher, &above)?, set(&[0, 2]));

    let below = NumericRangeQuery::with_bounds("year", None, Some(NumericValue::Int(1995)), true, false);
    assert_eq!(matches(&searcher, &below)?, set(&[3]));

    let fractional = NumericRangeQuery::inclusive("year", 1994.5, 2010.0);
    assert_eq!(matches(&searcher, &fractional)?, set(&[1, 4]));

    let everything = NumericRangeQuery::new("year", Bound::Unbounded, Bound::Unbounded);
    assert_eq!(matches(&searcher, &everything)?, set(&[0, 1, 2, 3, 4]));
    Ok(())
}

#[test]
fn test_double_ranges() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;

    let closed = NumericRangeQuery::inclusive("price", -2.0, 10.5);
    assert_eq!(matches(&searcher, &closed)?, set(&[0, 2, 3]));

    let half_open = NumericRangeQuery::with_bounds(
        "price",
        Some(NumericValue::Float(-2.0)),
        Some(NumericValue::Float(10.5)),
        true,
        false,
    );
    assert_eq!(matches(&searcher, &half_open)?, set(&[2, 3]));

    let negative = NumericRangeQuery::with_bounds("price", None, Some(NumericValue::Float(0.0)), true, true);
    assert_eq!(matches(&searcher, &negative)?, set(&[3]));
    Ok(())
}

#[test]
fn test_doc_value_range() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;

    let query = NumericRangeQuery::inclusive("stock", 1, 10);
    assert_eq!(matches(&searcher, &query)?, set(&[0, 3]));

    let boosted = NumericRangeQuery::inclusive("stock", 0, 100).with_boost(2.5);
    let top = searcher.search(&boosted, 10, &SearchOptions::default())?;
    assert_eq!(top.total_hits, 4);
    assert!(top.hits.iter().all(|hit| hit.score == 2.5));
    Ok(())
}

#[test]
fn test_range_on_text_field_matches_nothing() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;
    let query = NumericRangeQuery::inclusive("body", 0, 10);
    assert!(matches(&searcher, &query)?.is_empty());
    Ok(())
}

#[test]
fn test_inverted_range_is_rejected() -> Result<()> {
    let searcher = corpus(SearchConfig::default())?;
    let err = searcher
        .search(&NumericRangeQuery::inclusive("year", 2020, 2000), 10, &SearchOptions::default())
        .unwrap_err();
    assert!(matches!(err, TesseraError::QueryParse(_)));
    Ok(())
}

#[test]
fn test_boosts_scale_scores() -> Result<()> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    let plain = Document::builder()
        .add(Field::text("title", "tessera", Store::No))
        .build()?;
    let boosted = Document::builder()
        .add(Field::text("title", "tessera", Store::No).with_boost(2.0))
        .build()?;
    writer.add_document(&plain)?;
    writer.add_document(&boosted)?;
    writer.commit()?;

    let reader = Arc::new(IndexReader::open(&directory)?);
    let searcher = IndexSearcher::new(reader, SearchConfig::default());
    let options = SearchOptions::default();

    let top = searcher.search(&term("title", "tessera"), 10, &options)?;
    assert_eq!(top.hits[0].doc_id, 1);
    let base = top.hits[1].score;
    assert!((top.hits[0].score - 2.0 * base).abs() < 1e-6);

    let idf = (1.0f32 + 2.0 / 2.0).ln();
    assert!((base - idf).abs() < 1e-6);

    let top = searcher.search(&term("title", "tessera").with_boost(3.0), 10, &options)?;
    assert!((top.hits[1].score - 3.0 * base).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_top_k_ties_and_truncation() -> Result<()> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    for _ in 0..10 {
        let doc = Document::builder()
            .add(Field::text("body", "same words", Store::No))
            .build()?;
        writer.add_document(&doc)?;
    }
    writer.commit()?;

    let reader = Arc::new(IndexReader::open(&directory)?);
    let searcher = IndexSearcher::new(reader, SearchConfig::default());
    let top = searcher.search(&term("body", "same"), 3, &SearchOptions::default())?;

    assert_eq!(top.total_hits, 10);
    let ids: Vec<DocId> = top.hits.iter().map(|hit| hit.doc_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn test_fuzzy_prefix_and_expansions() -> Result<()> {
    let directory = Directory::create_or_open(Arc::new(MemoryStorage::new_default()));
    let mut writer = IndexWriter::open(directory.clone(), WriterConfig::default())?;
    for body in ["hello", "hallx", "jello"] {
        let doc = Document::builder()
            .add(Field::text("body", body, Store::No))
            .build()?;
        writer.add_document(&doc)?;
    }
    writer.commit()?;

    let reader = Arc::new(IndexReader::open(&directory)?);
    let searcher = IndexSearcher::new(reader, SearchConfig::default());

    let all = FuzzyQuery::new("body", "hallo", 2);
    assert_eq!(matches(&searcher, &all)?, set(&[0, 1, 2]));

    let prefixed = FuzzyQuery::new("body", "hallo", 2).prefix_length(2);
    assert_eq!(matches(&searcher, &prefixed)?, set(&[1]));

    let capped = FuzzyQuery::new("body", "hallo", 1).max_expansions(1);
    assert_eq!(matches(&searcher, &capped)?, set(&[1]));
    Ok(())
}

#[test]
fn test_configured_budget_applies() -> Result<()> {
    let limited = corpus(SearchConfig {
        max_postings: Some(1),
        ..SearchConfig::default()
    })?;
    let top = limited.search(&term("lang", "rust"), 10, &SearchOptions::default())?;
    assert!(!top.complete);
    assert!(top.total_hits < 3);

    let expired = SearchOptions::default().with_deadline(Instant::now());
    let unlimited = corpus(SearchConfig::default())?;
    let top = unlimited.search(&term("lang", "rust"), 10, &expired)?;
    assert!(!top.complete);
    Ok(())
}
