// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Search Sync
//!
//! Keeps an external search index in step with a host content store, and
//! compiles listing/search requests into engine query bodies.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Change Capture                         │
//! │  • Host mutations filtered by eligibility rules             │
//! │  • SyncQueue per unit of work (set semantics)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  (SyncSession::finish drains once)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Bulk Indexing Engine                       │
//! │  • NDJSON bulk batches, retry of rejected items only        │
//! │  • Resumable full reindex with a persisted cursor           │
//! │  • Failure ledger reported at the end of a run              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Transport                            │
//! │  • Host failover, per-host circuit breakers                 │
//! │  • API key / basic auth headers                             │
//! └─────────────────────────────────────────────────────────────┘
//!
//!   QueryRequest ──► QueryCompiler ──► CompiledQuery ──► Indexer::search
//!                                                      (or host fallback)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use search_sync::{
//!     CallerContext, HttpTransport, Indexer, IndexerConfig, QueryRequest, RedisStateStore, SearchOutcome,
//! };
//! # use search_sync::content::{ContentError, ContentStore, PageRequest};
//! # use search_sync::Document;
//! # struct Posts;
//! # #[async_trait::async_trait]
//! # impl ContentStore for Posts {
//! #     async fn prepare(&self, _id: u64) -> Result<Option<Document>, ContentError> { Ok(None) }
//! #     async fn is_eligible(&self, _id: u64) -> Result<bool, ContentError> { Ok(false) }
//! #     async fn query_ids(&self, _p: &PageRequest) -> Result<Vec<u64>, ContentError> { Ok(vec![]) }
//! #     async fn count(&self, _s: Option<&str>) -> Result<u64, ContentError> { Ok(0) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IndexerConfig {
//!         hosts: vec!["http://es-1:9200".into(), "http://es-2:9200".into()],
//!         ..Default::default()
//!     };
//!
//!     let transport = Arc::new(HttpTransport::new(&config)?);
//!     let state = Arc::new(RedisStateStore::new("redis://localhost:6379").await?);
//!     let indexer = Indexer::new(config, transport, Arc::new(Posts), state)?;
//!
//!     // Rebuild the index, resuming if a previous run was interrupted
//!     let summary = indexer.full_reindex(&[]).await?;
//!     println!("synced {} items", summary.synced);
//!
//!     match indexer.search(&QueryRequest::new().search("rust"), &CallerContext::default()).await {
//!         SearchOutcome::Indexed(results) => println!("{} hits", results.total),
//!         SearchOutcome::Fallback(reason) => println!("use host listing: {}", reason),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`query`]: request model, clause AST, query compiler, response mapping
//! - [`capture`]: eligibility rules and the sync queue
//! - [`session`]: unit-of-work wrapper that drains the queue
//! - [`indexing`]: the [`Indexer`]: bulk writes, full reindex, read path
//! - [`transport`]: engine HTTP client with failover
//! - [`state`]: cursor and failure ledger persistence (memory, Redis, SQL)
//! - [`resilience`]: circuit breakers and retry policies
//! - [`hooks`]: extension points

pub mod capture;
pub mod config;
pub mod content;
pub mod document;
pub mod hooks;
pub mod indexing;
pub mod metrics;
pub mod query;
pub mod resilience;
pub mod session;
pub mod state;
pub mod transport;

pub use capture::{CaptureContext, CaptureOutcome, ChangeCapture, Mutation, SyncQueue};
pub use config::{BasicAuth, IndexerConfig};
pub use content::{ContentError, ContentStore, LogNotificationSink, NotificationSink, PageRequest};
pub use document::{AuthorRef, DateTerms, Document, MetaValue, TermRef};
pub use hooks::{ExtensionPoint, Hook, HookRegistry};
pub use indexing::{BulkOutcome, FallbackReason, IndexError, Indexer, ReindexStep, ReindexSummary, SearchOutcome};
pub use metrics::LatencyTimer;
pub use query::{CallerContext, CompiledQuery, QueryCompiler, QueryRequest, RecursionTooDeep, SearchResults};
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError, HostCircuits};
pub use resilience::retry::RetryConfig;
pub use session::{SessionReport, SyncSession};
pub use state::{
    FailureLedger, FailureReport, InMemoryStateStore, IndexPhase, IndexState, ProgressCursor, RedisStateStore,
    SqlStateStore, StateError, StateKeys, StateStore,
};
pub use transport::{HttpTransport, Transport, TransportError, TransportRequest, TransportResponse};
