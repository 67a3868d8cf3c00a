// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! End-to-end tests against an in-process engine.
//!
//! `FakeEngine` implements [`Transport`] and keeps indices and documents in
//! memory, so the full write path (bulk encoding, partial failures, index
//! lifecycle, cursor persistence) and the read path run without Docker.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: reindex, sessions, search
//! - `failure_*` - Partial bulk failures, cancel, engine outages

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};

use search_sync::query::{DateQuery, DateUnit, ValueFilter};
use search_sync::{
    CallerContext, ChangeCapture, ContentError, ContentStore, Document, FailureLedger, FallbackReason,
    InMemoryStateStore, IndexError, IndexPhase, IndexState, Indexer, IndexerConfig, Mutation, PageRequest,
    ProgressCursor, QueryCompiler, QueryRequest, ReindexStep, SearchOutcome, StateStore, SyncQueue, SyncSession,
    Transport, TransportError, TransportRequest, TransportResponse,
};
use search_sync::transport::Method;

// =============================================================================
// Fake engine
// =============================================================================

#[derive(Default)]
struct EngineState {
    indices: BTreeMap<String, BTreeMap<u64, Value>>,
    /// id → how many more times a bulk item for it is rejected
    rejections: BTreeMap<u64, usize>,
    requests: Vec<TransportRequest>,
    down: bool,
    bulk_down: bool,
}

/// Cancels the run through the state store once this many bulk requests
/// have been answered.
struct CancelAfter {
    bulk_requests: usize,
    store: Arc<dyn StateStore>,
    keys: search_sync::StateKeys,
}

#[derive(Default)]
struct FakeEngine {
    inner: Mutex<EngineState>,
    cancel: Mutex<Option<CancelAfter>>,
}

impl FakeEngine {
    fn reject(&self, id: u64, times: usize) {
        self.inner.lock().rejections.insert(id, times);
    }

    fn set_down(&self, down: bool) {
        self.inner.lock().down = down;
    }

    fn set_bulk_down(&self, down: bool) {
        self.inner.lock().bulk_down = down;
    }

    fn create_index(&self, index: &str) {
        self.inner.lock().indices.entry(index.to_string()).or_default();
    }

    fn documents(&self, index: &str) -> Vec<u64> {
        self.inner
            .lock()
            .indices
            .get(index)
            .map(|docs| docs.keys().copied().collect())
            .unwrap_or_default()
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.inner.lock().requests.clone()
    }

    fn bulk_requests(&self) -> Vec<TransportRequest> {
        self.requests().into_iter().filter(|r| r.path.ends_with("/_bulk")).collect()
    }

    fn handle(&self, req: &TransportRequest) -> TransportResponse {
        let mut inner = self.inner.lock();
        let (index, rest) = match req.path.split_once('/') {
            Some((index, rest)) => (index.to_string(), Some(rest.to_string())),
            None => (req.path.clone(), None),
        };

        match (req.method, rest.as_deref()) {
            (Method::Head, None) => status_only(inner.indices.contains_key(&index)),
            (Method::Put, None) => {
                inner.indices.insert(index, BTreeMap::new());
                TransportResponse::new(200, json!({"acknowledged": true}).to_string())
            }
            (Method::Delete, None) => status_only(inner.indices.remove(&index).is_some()),
            (Method::Post, Some("_bulk")) => {
                let body = req.body.clone().unwrap_or_default();
                let lines: Vec<Value> = body.lines().filter_map(|l| serde_json::from_str(l).ok()).collect();
                let mut items = Vec::new();
                let mut errors = false;
                for pair in lines.chunks(2) {
                    let id = pair[0]["index"]["_id"].as_u64().unwrap_or(0);
                    let rejected = match inner.rejections.get_mut(&id) {
                        Some(left) if *left > 0 => {
                            *left -= 1;
                            true
                        }
                        _ => false,
                    };
                    if rejected {
                        errors = true;
                        items.push(json!({"index": {"_id": id.to_string(), "status": 429,
                            "error": {"type": "es_rejected_execution_exception", "reason": "queue full"}}}));
                    } else {
                        inner.indices.entry(index.clone()).or_default().insert(id, pair[1].clone());
                        items.push(json!({"index": {"_id": id.to_string(), "status": 201}}));
                    }
                }
                TransportResponse::new(200, json!({"errors": errors, "items": items}).to_string())
            }
            (Method::Post, Some("_search")) => match inner.indices.get(&index) {
                Some(docs) => {
                    let hits: Vec<Value> = docs
                        .iter()
                        .rev()
                        .map(|(id, source)| json!({"_id": id.to_string(), "_score": 1.0, "_source": source}))
                        .collect();
                    TransportResponse::new(200, json!({"hits": {"total": {"value": hits.len()}, "hits": hits}}).to_string())
                }
                None => TransportResponse::new(404, json!({"error": "index_not_found_exception"}).to_string()),
            },
            (Method::Put, Some(doc)) | (Method::Delete, Some(doc)) => {
                let id = doc.rsplit('/').next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                let docs = inner.indices.entry(index).or_default();
                if req.method == Method::Delete {
                    status_only(docs.remove(&id).is_some())
                } else {
                    let source = req.body.as_deref().and_then(|b| serde_json::from_str(b).ok()).unwrap_or(Value::Null);
                    docs.insert(id, source);
                    TransportResponse::new(201, "{}")
                }
            }
            _ => TransportResponse::new(400, json!({"error": "unsupported"}).to_string()),
        }
    }
}

fn status_only(found: bool) -> TransportResponse {
    if found {
        TransportResponse::new(200, "{}")
    } else {
        TransportResponse::new(404, "{}")
    }
}

#[async_trait]
impl Transport for FakeEngine {
    async fn request(&self, req: TransportRequest) -> Result<TransportResponse, TransportError> {
        let down = {
            let mut inner = self.inner.lock();
            inner.requests.push(req.clone());
            inner.down || (inner.bulk_down && req.path.ends_with("/_bulk"))
        };
        if down {
            return Err(TransportError::Exhausted {
                attempts: 3,
                last: "connection refused".into(),
            });
        }

        let response = self.handle(&req);

        if req.path.ends_with("/_bulk") {
            let bulk_count = self.bulk_requests().len();
            let cancel = {
                let mut guard = self.cancel.lock();
                match guard.as_ref() {
                    Some(c) if c.bulk_requests == bulk_count => guard.take(),
                    _ => None,
                }
            };
            if let Some(c) = cancel {
                IndexState::cancelled().save(c.store.as_ref(), &c.keys).await.ok();
            }
        }
        Ok(response)
    }
}

// =============================================================================
// Fake content store
// =============================================================================

#[derive(Default)]
struct Catalog {
    docs: Mutex<BTreeMap<u64, Document>>,
}

impl Catalog {
    fn with_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        let catalog = Self::default();
        for id in ids {
            catalog.put(article(id));
        }
        catalog
    }

    fn put(&self, doc: Document) {
        self.docs.lock().insert(doc.id, doc);
    }
}

#[async_trait]
impl ContentStore for Catalog {
    async fn prepare(&self, id: u64) -> Result<Option<Document>, ContentError> {
        Ok(self.docs.lock().get(&id).cloned())
    }

    async fn is_eligible(&self, id: u64) -> Result<bool, ContentError> {
        Ok(self.docs.lock().get(&id).is_some_and(|d| d.post_status == "publish"))
    }

    async fn query_ids(&self, page: &PageRequest) -> Result<Vec<u64>, ContentError> {
        Ok(self
            .docs
            .lock()
            .keys()
            .rev()
            .skip(page.offset as usize)
            .take(page.limit)
            .copied()
            .collect())
    }

    async fn count(&self, _scope: Option<&str>) -> Result<u64, ContentError> {
        Ok(self.docs.lock().len() as u64)
    }
}

fn article(id: u64) -> Document {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap();
    Document::new(id, "post", date).with_title(format!("Article {}", id))
}

struct Harness {
    indexer: Indexer,
    engine: Arc<FakeEngine>,
    catalog: Arc<Catalog>,
    state: Arc<InMemoryStateStore>,
}

fn harness(config: IndexerConfig, catalog: Catalog) -> Harness {
    let engine = Arc::new(FakeEngine::default());
    let catalog = Arc::new(catalog);
    let state = Arc::new(InMemoryStateStore::new());
    let indexer = Indexer::new(config, engine.clone(), catalog.clone(), state.clone()).unwrap();
    Harness {
        indexer,
        engine,
        catalog,
        state,
    }
}

fn saved(id: u64) -> Mutation {
    Mutation::Saved {
        id,
        status: "publish".into(),
        post_type: "post".into(),
        is_revision: false,
    }
}

// =============================================================================
// Happy paths
// =============================================================================

#[tokio::test]
async fn happy_full_reindex_builds_index_then_serves_reads() {
    let config = IndexerConfig {
        bulk_page_size: 3,
        ..Default::default()
    };
    let h = harness(config, Catalog::with_ids(1..=7));

    let summary = h.indexer.full_reindex(&[]).await.unwrap();
    assert_eq!((summary.synced, summary.failed), (7, 0));
    assert_eq!(h.engine.documents("content"), (1..=7).collect::<Vec<_>>());
    assert_eq!(h.engine.bulk_requests().len(), 3);

    assert!(matches!(h.indexer.status().await.unwrap(), IndexPhase::Completed { synced: 7, .. }));

    match h.indexer.search(&QueryRequest::new().search("article"), &CallerContext::default()).await {
        SearchOutcome::Indexed(results) => {
            assert_eq!(results.total, 7);
            assert_eq!(results.ids()[0], 7);
            assert_eq!(results.hits[0].document.as_ref().map(|d| d.post_title.as_str()), Some("Article 7"));
        }
        SearchOutcome::Fallback(reason) => panic!("unexpected fallback: {}", reason),
    }
}

#[tokio::test]
async fn happy_session_collapses_repeated_mutations() {
    let h = harness(IndexerConfig::default(), Catalog::with_ids([1, 2, 3]));
    h.engine.create_index("content");

    let capture = Arc::new(ChangeCapture::new(h.indexer.config(), h.catalog.clone()));
    let mut session = SyncSession::new(capture);
    for id in [1, 2, 1, 1, 3] {
        session.record(saved(id)).await.unwrap();
    }
    session.record(Mutation::TermsChanged { id: 2 }).await.unwrap();
    session.record(Mutation::Deleted { id: 9 }).await.unwrap();

    let report = session.finish(&h.indexer).await.unwrap();
    assert_eq!(report.indexed.indexed, 3);
    assert_eq!(report.removed, 1);

    let bulks = h.engine.bulk_requests();
    assert_eq!(bulks.len(), 1);
    assert_eq!(bulks[0].body.as_deref().map(|b| b.lines().count()), Some(6));
    assert_eq!(h.engine.documents("content"), vec![1, 2, 3]);
}

#[tokio::test]
async fn happy_unpublished_item_is_removed_from_index() {
    let h = harness(IndexerConfig::default(), Catalog::with_ids([1, 2]));
    h.indexer.full_reindex(&[]).await.unwrap();

    let capture = Arc::new(ChangeCapture::new(h.indexer.config(), h.catalog.clone()));
    let mut session = SyncSession::new(capture);
    session
        .record(Mutation::Saved {
            id: 2,
            status: "draft".into(),
            post_type: "post".into(),
            is_revision: false,
        })
        .await
        .unwrap();
    let report = session.finish(&h.indexer).await.unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(h.engine.documents("content"), vec![1]);
}

#[tokio::test]
async fn happy_enqueue_is_idempotent() {
    let mut queue = SyncQueue::new();
    assert!(queue.enqueue(5));
    assert!(!queue.enqueue(5));
    assert!(queue.enqueue(3));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.drain(), vec![5, 3]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn happy_index_one_and_delete_one() {
    let h = harness(IndexerConfig::default(), Catalog::default());
    h.engine.create_index("content");

    assert!(h.indexer.index_one(article(42)).await.unwrap());
    assert_eq!(h.engine.documents("content"), vec![42]);

    assert!(h.indexer.delete_one(42).await.unwrap());
    // already gone still counts as removed
    assert!(h.indexer.delete_one(42).await.unwrap());
    assert!(h.engine.documents("content").is_empty());
}

#[test]
fn happy_date_units_compile_to_two_terms() {
    let request = QueryRequest {
        date_query: Some(DateQuery::units(vec![(DateUnit::Year, 2024), (DateUnit::Month, 3)])),
        post_status: Some(ValueFilter::Any),
        ..Default::default()
    };
    let body = QueryCompiler::new(IndexerConfig::default())
        .compile(&request, &CallerContext::default())
        .to_value();
    assert_eq!(
        body["post_filter"]["bool"]["must"],
        json!([{"term": {"date_terms.year": 2024}}, {"term": {"date_terms.month": 3}}])
    );
}

#[test]
fn happy_host_args_compile() {
    let request = QueryRequest::from_value(&json!({
        "s": "rust",
        "year": 2024,
        "monthnum": 3,
        "post_status": "any",
    }));
    let body = QueryCompiler::new(IndexerConfig::default())
        .compile(&request, &CallerContext::default())
        .to_value();
    assert_eq!(body["query"]["bool"]["should"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["post_filter"]["bool"]["must"].as_array().map(Vec::len), Some(2));
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[tokio::test]
async fn failure_partial_bulk_rejection_is_retried() {
    let h = harness(IndexerConfig::default(), Catalog::with_ids(1..=10));
    h.engine.create_index("content");
    h.engine.reject(4, 1);
    h.engine.reject(8, 1);

    let ids: Vec<u64> = (1..=10).collect();
    let outcome = h.indexer.bulk_index(&ids).await.unwrap();
    assert_eq!((outcome.indexed, outcome.failed, outcome.retries), (10, 0, 1));

    let bulks = h.engine.bulk_requests();
    assert_eq!(bulks.len(), 2);
    let retried: BTreeSet<u64> = bulks[1]
        .body
        .as_deref()
        .unwrap_or_default()
        .lines()
        .step_by(2)
        .filter_map(|l| serde_json::from_str::<Value>(l).ok())
        .filter_map(|v| v["index"]["_id"].as_u64())
        .collect();
    assert_eq!(retried, BTreeSet::from([4, 8]));

    let ledger = FailureLedger::load(h.state.as_ref(), h.indexer.state_keys()).await.unwrap();
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn failure_persistent_rejection_lands_in_ledger() {
    let config = IndexerConfig::default();
    let h = harness(config.clone(), Catalog::with_ids(1..=5));
    h.engine.create_index("content");
    h.engine.reject(3, usize::MAX);

    let outcome = h.indexer.bulk_index(&[1, 2, 3, 4, 5]).await.unwrap();
    assert_eq!(outcome.failed_ids, vec![3]);
    assert_eq!(h.engine.bulk_requests().len(), config.bulk_max_attempts);

    let ledger = FailureLedger::load(h.state.as_ref(), h.indexer.state_keys()).await.unwrap();
    assert_eq!(ledger.items, BTreeSet::from([3]));
    assert!(ledger.offsets.is_empty());
}

#[tokio::test]
async fn failure_resume_picks_up_at_persisted_offset() {
    let h = harness(IndexerConfig::default(), Catalog::with_ids(1..=400));
    h.engine.create_index("content");

    let mut cursor = ProgressCursor::start(Vec::new(), 400);
    cursor.advance(350, 350, 0);
    IndexState::running(cursor.clone())
        .save(h.state.as_ref(), h.indexer.state_keys())
        .await
        .unwrap();

    // reads stay off while the run is pending
    let outcome = h.indexer.search(&QueryRequest::new(), &CallerContext::default()).await;
    assert_eq!(outcome, SearchOutcome::Fallback(FallbackReason::ReindexRunning));

    let summary = h.indexer.full_reindex(&[]).await.unwrap();
    assert_eq!(summary.run_id, cursor.run_id);
    assert_eq!(summary.synced, 400);

    let requests = h.engine.requests();
    assert!(requests.iter().all(|r| !(r.method == Method::Delete && r.path == "content")));
    assert_eq!(h.engine.bulk_requests().len(), 1);
    assert_eq!(h.engine.documents("content"), (1..=50).collect::<Vec<_>>());
}

#[tokio::test]
async fn failure_resume_without_index_is_refused() {
    let h = harness(IndexerConfig::default(), Catalog::with_ids(1..=3));
    let cursor = ProgressCursor::start(Vec::new(), 3);
    IndexState::running(cursor).save(h.state.as_ref(), h.indexer.state_keys()).await.unwrap();

    let err = h.indexer.full_reindex(&[]).await.unwrap_err();
    assert!(matches!(err, IndexError::IndexMissing(ref index) if index == "content"));
}

#[tokio::test]
async fn failure_cancel_between_pages_stops_run_and_disables_reads() {
    let config = IndexerConfig {
        bulk_page_size: 2,
        ..Default::default()
    };
    let h = harness(config, Catalog::with_ids(1..=6));
    *h.engine.cancel.lock() = Some(CancelAfter {
        bulk_requests: 1,
        store: h.state.clone(),
        keys: h.indexer.state_keys().clone(),
    });

    let err = h.indexer.full_reindex(&[]).await.unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));
    assert_eq!(h.engine.bulk_requests().len(), 1);

    let state = h.indexer.state().await.unwrap();
    assert_eq!(state.phase, IndexPhase::NotStarted);
    assert!(!state.read_enabled);

    let outcome = h.indexer.search(&QueryRequest::new(), &CallerContext::default()).await;
    assert_eq!(outcome, SearchOutcome::Fallback(FallbackReason::ReadDisabled));

    h.indexer.enable_reads().await.unwrap();
    assert!(!h.indexer.search(&QueryRequest::new(), &CallerContext::default()).await.is_fallback());
}

#[tokio::test]
async fn failure_enable_reads_refused_while_running() {
    let h = harness(IndexerConfig { bulk_page_size: 2, ..Default::default() }, Catalog::with_ids(1..=4));
    let step = h.indexer.reindex_step(&[]).await.unwrap();
    assert!(matches!(step, ReindexStep::Progress(_)));

    assert!(matches!(h.indexer.enable_reads().await, Err(IndexError::ReindexInProgress)));
}

#[tokio::test]
async fn failure_engine_outage_falls_back_and_records_offsets() {
    let config = IndexerConfig {
        bulk_page_size: 2,
        ..Default::default()
    };
    let h = harness(config, Catalog::with_ids(1..=4));
    h.indexer.reindex_step(&[]).await.unwrap();
    h.engine.set_bulk_down(true);

    let step = h.indexer.reindex_step(&[]).await.unwrap();
    let ReindexStep::Progress(cursor) = step else {
        panic!("expected progress");
    };
    assert_eq!(cursor.offset, 4);

    let ledger = FailureLedger::load(h.state.as_ref(), h.indexer.state_keys()).await.unwrap();
    assert_eq!(ledger.offsets, BTreeSet::from([2]));
    assert!(ledger.items.is_empty());

    h.indexer.cancel().await.unwrap();
    h.indexer.enable_reads().await.unwrap();
    h.engine.set_down(true);
    let outcome = h.indexer.search(&QueryRequest::new(), &CallerContext::default()).await;
    assert!(matches!(outcome, SearchOutcome::Fallback(FallbackReason::EngineUnavailable(_))));
}

#[tokio::test]
async fn failure_missing_index_on_search_falls_back() {
    let h = harness(IndexerConfig::default(), Catalog::default());
    let outcome = h.indexer.search(&QueryRequest::new(), &CallerContext::default()).await;
    assert_eq!(outcome, SearchOutcome::Fallback(FallbackReason::IndexMissing));
}
