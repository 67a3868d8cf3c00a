// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic search-sync usage example.
//!
//! Demonstrates:
//! 1. Compiling a listing request into an engine query body
//! 2. Capturing host mutations in a sync session and draining it
//! 3. Running a resumable full reindex
//! 4. Searching with fallback to the host listing
//! 5. Displaying metrics
//!
//! # Prerequisites
//!
//! An Elasticsearch-compatible engine on localhost:9200:
//! ```bash
//! docker run -p 9200:9200 -e discovery.type=single-node -e xpack.security.enabled=false \
//!     docker.elastic.co/elasticsearch/elasticsearch:7.17.22
//! ```
//! Without one, steps 2-4 log transport failures and the search falls back.
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=search_sync=debug cargo run --example basic_usage
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use search_sync::query::{MetaClause, MetaCompare, MetaQuery, MetaType, Relation};
use search_sync::{
    CallerContext, ChangeCapture, ContentError, ContentStore, Document, HttpTransport, InMemoryStateStore, Indexer,
    IndexerConfig, Mutation, PageRequest, QueryCompiler, QueryRequest, SearchOutcome, SyncSession, TermRef,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// A tiny content store standing in for the host's database.
struct Library {
    books: BTreeMap<u64, Document>,
}

impl Library {
    fn new() -> Self {
        let titles = [
            (1, "The Rust Programming Language", "29.95", "2018-08-12 10:00:00"),
            (2, "Zero To Production", "39.00", "2022-03-01 09:30:00"),
            (3, "Rust for Rustaceans", "34.50", "2021-12-14 16:45:00"),
            (4, "Programming Rust", "49.99", "2021-07-06 08:00:00"),
            (5, "Rust Atomics and Locks", "44.00", "2023-01-10 12:15:00"),
        ];
        let books = titles
            .iter()
            .filter_map(|&(id, title, price, date)| {
                let date = NaiveDate::parse_from_str(&date[..10], "%Y-%m-%d")
                    .ok()?
                    .and_hms_opt(0, 0, 0)?;
                let doc = Document::new(id, "post", date)
                    .with_title(title)
                    .with_content(format!("{} is a book about Rust.", title))
                    .with_meta("price", &[price])
                    .with_terms("category", vec![TermRef::new(7, "books", "Books")]);
                Some((id, doc))
            })
            .collect();
        Self { books }
    }
}

#[async_trait]
impl ContentStore for Library {
    async fn prepare(&self, id: u64) -> Result<Option<Document>, ContentError> {
        Ok(self.books.get(&id).cloned())
    }

    async fn is_eligible(&self, id: u64) -> Result<bool, ContentError> {
        Ok(self.books.contains_key(&id))
    }

    async fn query_ids(&self, page: &PageRequest) -> Result<Vec<u64>, ContentError> {
        Ok(self
            .books
            .keys()
            .rev()
            .skip(page.offset as usize)
            .take(page.limit)
            .copied()
            .collect())
    }

    async fn count(&self, _scope: Option<&str>) -> Result<u64, ContentError> {
        Ok(self.books.len() as u64)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("search_sync=info")))
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║             search-sync: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    let config = IndexerConfig {
        hosts: vec!["http://localhost:9200".into()],
        index_name: "books".into(),
        bulk_page_size: 2,
        ..Default::default()
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Compile a query (no engine needed)
    // ─────────────────────────────────────────────────────────────────────────
    println!("🧮 Compiling a request...");
    let mut request = QueryRequest::new().search("rust");
    request.meta_query = Some(MetaQuery::new(Relation::And).clause(
        MetaClause::new("price", json!(40))
            .compare(MetaCompare::Less)
            .typed(MetaType::Numeric),
    ));
    let compiled = QueryCompiler::new(config.clone()).compile(&request, &CallerContext::default());
    println!("{}\n", serde_json::to_string_pretty(&compiled.to_value())?);

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Wire up the indexer
    // ─────────────────────────────────────────────────────────────────────────
    let content = Arc::new(Library::new());
    let transport = Arc::new(HttpTransport::new(&config)?);
    let state = Arc::new(InMemoryStateStore::new());
    let indexer = Indexer::new(config.clone(), transport, content.clone(), state)?;

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Full reindex
    // ─────────────────────────────────────────────────────────────────────────
    println!("🔁 Running full reindex...");
    match indexer.full_reindex(&[]).await {
        Ok(summary) => println!("   └─ synced={} failed={}", summary.synced, summary.failed),
        Err(e) => println!("   └─ ⚠️  reindex failed: {}", e),
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Capture mutations in a session
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Recording mutations...");
    let capture = Arc::new(ChangeCapture::new(&config, content));
    let mut session = SyncSession::new(capture);
    for id in [3, 5, 3] {
        let outcome = session
            .record(Mutation::Saved {
                id,
                status: "publish".into(),
                post_type: "post".into(),
                is_revision: false,
            })
            .await?;
        println!("   └─ saved {} → {:?}", id, outcome);
    }
    session
        .record(Mutation::MetaChanged {
            id: 4,
            key: "_edit_lock".into(),
        })
        .await?;
    match session.finish(&indexer).await {
        Ok(report) => println!("   └─ flushed: indexed={} removed={}", report.indexed.indexed, report.removed),
        Err(e) => println!("   └─ ⚠️  flush failed: {}", e),
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Search
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔎 Searching...");
    match indexer.search(&request, &CallerContext::default()).await {
        SearchOutcome::Indexed(results) => {
            println!("   └─ {} hits", results.total);
            for hit in &results.hits {
                let title = hit.document.as_ref().map(|d| d.post_title.as_str()).unwrap_or("?");
                println!("      └─ #{} {} (score {:?})", hit.id, title, hit.score);
            }
        }
        SearchOutcome::Fallback(reason) => println!("   └─ falling back to host listing: {}", reason),
    }

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let label_str = if labels.is_empty() {
                String::new()
            } else {
                format!("{{{}}}", labels.join(","))
            };
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => {
                    let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                    format!("count={} sum={:.4}", samples.len(), sum)
                }
            };
            format!("{}{} = {}", key.name(), label_str, rendered)
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
