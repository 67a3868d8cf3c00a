// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk indexing engine.
//!
//! [`Indexer`] owns the write and read paths against the search engine:
//!
//! - `bulk_index` / `index_one` / `delete_one` for incremental sync
//! - `full_reindex` / `reindex_step` for the resumable full rebuild
//! - `cancel` / `enable_reads` / `status` for run control
//! - `search` for the read path with fallback
//!
//! # Full reindex state machine
//!
//! ```text
//!            ┌──────────────┐ no cursor: delete index, put mapping
//!  start ──► │    Start     │────────────────────────────┐
//!            └──────────────┘                            ▼
//!                                      ┌──────────────────────────┐
//!        cursor found (resume) ──────► │ Running: page @ offset   │◄─┐
//!                                      └──────────────────────────┘  │
//!                                        │ ids         │ no ids      │
//!                                        ▼             ▼             │
//!                               ┌────────────┐  ┌───────────────┐    │
//!                               │   Flush    │  │ Complete scope│    │
//!                               │ offset += n│  │ report ledger │    │
//!                               └─────┬──────┘  └──────┬────────┘    │
//!                                     └── persist ─────┴─ next scope ┘
//! ```
//!
//! Cancel writes one record that clears the cursor and disables reads.
//! A running reindex notices between pages and stops with
//! [`IndexError::Cancelled`].

mod bulk;
mod flush;
mod mapping;
mod reindex;
mod types;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use bulk::{encode_body, BulkBatch, BulkEntry, BulkItemResult, BulkResponse, FlushReason};
pub use mapping::{mapping_body, EnginePaths, LEGACY_MAPPING_TYPE};
pub use types::{BulkOutcome, FallbackReason, ReindexStep, ReindexSummary, SearchOutcome};

use crate::config::IndexerConfig;
use crate::content::{ContentError, ContentStore, LogNotificationSink, NotificationSink};
use crate::document::Document;
use crate::hooks::HookRegistry;
use crate::metrics::{self, LatencyTimer};
use crate::query::{CallerContext, QueryCompiler, QueryRequest, SearchResults};
use crate::resilience::retry::{retry, RetryConfig};
use crate::state::{IndexPhase, IndexState, StateError, StateKeys, StateStore};
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("index {0} does not exist")]
    IndexMissing(String),
    #[error("a full reindex is in progress")]
    ReindexInProgress,
    #[error("full reindex was cancelled")]
    Cancelled,
    #[error("invalid engine response: {0}")]
    InvalidResponse(String),
    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Write and read paths against one engine cluster.
///
/// Cheap to clone; [`Indexer::scoped`] derives an indexer bound to a
/// tenant index.
#[derive(Clone)]
pub struct Indexer {
    config: Arc<IndexerConfig>,
    transport: Arc<dyn Transport>,
    content: Arc<dyn ContentStore>,
    state: Arc<dyn StateStore>,
    hooks: Arc<HookRegistry>,
    notifier: Arc<dyn NotificationSink>,
    compiler: Arc<QueryCompiler>,
    keys: StateKeys,
    scope: Option<String>,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        transport: Arc<dyn Transport>,
        content: Arc<dyn ContentStore>,
        state: Arc<dyn StateStore>,
    ) -> Result<Self, IndexError> {
        config.validate()?;
        let keys = StateKeys::new(&config.state_key_prefix);
        let hooks = Arc::new(HookRegistry::new());
        let compiler = Arc::new(QueryCompiler::new(config.clone()).with_hooks(Arc::clone(&hooks)));

        Ok(Self {
            config: Arc::new(config),
            transport,
            content,
            state,
            hooks,
            notifier: Arc::new(LogNotificationSink),
            compiler,
            keys,
            scope: None,
        })
    }

    /// Use `hooks` for documents and compiled queries.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.compiler = Arc::new(QueryCompiler::new((*self.config).clone()).with_hooks(Arc::clone(&hooks)));
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Indexer bound to the index of `scope`.
    #[must_use]
    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        let mut scoped = self.clone();
        scoped.scope = Some(scope.into());
        scoped
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    pub fn state_keys(&self) -> &StateKeys {
        &self.keys
    }

    pub fn paths(&self) -> EnginePaths {
        EnginePaths::new(&self.config, self.scope.as_deref())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Single-document writes: request timeout, no retry
    // ═══════════════════════════════════════════════════════════════════

    /// Index one prepared document. Engine failures are logged and
    /// reported as `Ok(false)`.
    pub async fn index_one(&self, mut doc: Document) -> Result<bool, IndexError> {
        if self.hooks.skip_index(&doc) {
            debug!(id = doc.id, "Document vetoed by skip hook");
            metrics::record_documents_skipped(1);
            return Ok(false);
        }
        self.hooks.prepare(&mut doc);

        let body = serde_json::to_string(&doc)?;
        let req = TransportRequest::put(self.paths().document(doc.id), body).with_timeout(self.config.request_timeout());

        match self.transport.request(req).await {
            Ok(resp) if resp.is_success() => {
                metrics::record_documents_indexed(1);
                Ok(true)
            }
            Ok(resp) => {
                warn!(id = doc.id, status = resp.status, body = %resp.body, "Engine rejected document");
                metrics::record_documents_failed(1);
                Ok(false)
            }
            Err(e) => {
                warn!(id = doc.id, error = %e, "Document write failed");
                metrics::record_documents_failed(1);
                Ok(false)
            }
        }
    }

    /// Remove one document. A document that is already gone counts as removed.
    pub async fn delete_one(&self, id: u64) -> Result<bool, IndexError> {
        let req = TransportRequest::delete(self.paths().document(id)).with_timeout(self.config.request_timeout());

        match self.transport.request(req).await {
            Ok(resp) if resp.is_success() || resp.status == 404 => Ok(true),
            Ok(resp) => {
                warn!(id, status = resp.status, "Engine refused document removal");
                Ok(false)
            }
            Err(e) => {
                warn!(id, error = %e, "Document removal failed");
                Ok(false)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Index lifecycle
    // ═══════════════════════════════════════════════════════════════════

    pub async fn index_exists(&self) -> Result<bool, IndexError> {
        self.index_exists_at(&self.paths()).await
    }

    pub async fn put_mapping(&self) -> Result<(), IndexError> {
        self.put_mapping_at(&self.paths()).await
    }

    pub async fn delete_index(&self) -> Result<(), IndexError> {
        self.delete_index_at(&self.paths()).await
    }

    async fn admin_request(&self, name: &str, req: TransportRequest) -> Result<TransportResponse, IndexError> {
        let response = retry(name, &RetryConfig::admin(), || self.transport.request(req.clone())).await?;
        Ok(response)
    }

    pub(crate) async fn index_exists_at(&self, paths: &EnginePaths) -> Result<bool, IndexError> {
        let resp = self.admin_request("index_exists", TransportRequest::head(paths.index())).await?;
        match resp.status {
            200..=299 => Ok(true),
            404 => Ok(false),
            status => Err(TransportError::Status { status, body: resp.body }.into()),
        }
    }

    pub(crate) async fn put_mapping_at(&self, paths: &EnginePaths) -> Result<(), IndexError> {
        let body = mapping_body(&self.config).to_string();
        let req = TransportRequest::put(paths.index(), body);
        self.admin_request("put_mapping", req).await?.error_for_status()?;
        info!(index = paths.index(), "Index created with mapping");
        Ok(())
    }

    pub(crate) async fn delete_index_at(&self, paths: &EnginePaths) -> Result<(), IndexError> {
        let resp = self.admin_request("delete_index", TransportRequest::delete(paths.index())).await?;
        if resp.status == 404 {
            debug!(index = paths.index(), "No index to delete");
            return Ok(());
        }
        resp.error_for_status()?;
        info!(index = paths.index(), "Index deleted");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Run control
    // ═══════════════════════════════════════════════════════════════════

    pub async fn state(&self) -> Result<IndexState, IndexError> {
        Ok(IndexState::load(self.state.as_ref(), &self.keys).await?)
    }

    /// Whether a full reindex has never run, is running, or completed.
    pub async fn status(&self) -> Result<IndexPhase, IndexError> {
        Ok(self.state().await?.phase)
    }

    /// Stop a running full reindex and turn the read path off.
    ///
    /// One write: the cursor and the read flag live in the same record.
    pub async fn cancel(&self) -> Result<(), IndexError> {
        IndexState::cancelled().save(self.state.as_ref(), &self.keys).await?;
        info!("Full reindex cancelled, read path disabled");
        Ok(())
    }

    /// Serve searches from the index again.
    pub async fn enable_reads(&self) -> Result<(), IndexError> {
        let mut state = self.state().await?;
        if state.is_running() {
            return Err(IndexError::ReindexInProgress);
        }
        state.read_enabled = true;
        state.save(self.state.as_ref(), &self.keys).await?;
        info!("Read path enabled");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Read path
    // ═══════════════════════════════════════════════════════════════════

    /// Run a query against the index, or tell the host to use its own
    /// listing when the index cannot answer.
    #[tracing::instrument(skip(self, request, ctx), fields(scope = ?self.scope))]
    pub async fn search(&self, request: &QueryRequest, ctx: &CallerContext) -> SearchOutcome {
        let outcome = self.search_index(request, ctx).await;
        match outcome {
            SearchOutcome::Indexed(ref results) => {
                debug!(total = results.total, hits = results.hits.len(), "Search answered from index");
                metrics::record_search("indexed");
            }
            SearchOutcome::Fallback(ref reason) => {
                info!(reason = %reason, "Search falling back to host listing");
                metrics::record_search("fallback");
            }
        }
        outcome
    }

    async fn search_index(&self, request: &QueryRequest, ctx: &CallerContext) -> SearchOutcome {
        let state = match self.state().await {
            Ok(state) => state,
            Err(e) => return SearchOutcome::Fallback(FallbackReason::StateUnavailable(e.to_string())),
        };
        if state.is_running() {
            return SearchOutcome::Fallback(FallbackReason::ReindexRunning);
        }
        if !state.read_enabled {
            return SearchOutcome::Fallback(FallbackReason::ReadDisabled);
        }

        let compiled = self.compiler.compile(request, ctx);
        let req = TransportRequest::post(self.paths().search(), compiled.to_json())
            .with_timeout(self.config.request_timeout());

        let sent = {
            let _timer = LatencyTimer::new("search");
            self.transport.request(req).await
        };
        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => return SearchOutcome::Fallback(FallbackReason::EngineUnavailable(e.to_string())),
        };
        if resp.status == 404 {
            return SearchOutcome::Fallback(FallbackReason::IndexMissing);
        }
        if !resp.is_success() {
            return SearchOutcome::Fallback(FallbackReason::EngineUnavailable(format!("HTTP {}", resp.status)));
        }
        match resp.json() {
            Ok(body) => SearchOutcome::Indexed(SearchResults::from_response(&body)),
            Err(e) => SearchOutcome::Fallback(FallbackReason::InvalidResponse(e.to_string())),
        }
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("index", &self.paths().index())
            .field("hosts", &self.config.hosts)
            .field("scope", &self.scope)
            .finish()
    }
}
