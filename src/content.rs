// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content store and notification boundaries.
//!
//! The content store is owned by the host. The indexer only asks it to
//! prepare documents (with typed meta projection already applied), page
//! through eligible ids, and drop per-page caches.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::document::Document;
use crate::state::FailureReport;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("content store error: {0}")]
pub struct ContentError(pub String);

/// One page of eligible ids, ordered by id descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub scope: Option<String>,
    pub offset: u64,
    pub limit: usize,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Build the engine document, `None` when the item no longer exists.
    async fn prepare(&self, id: u64) -> Result<Option<Document>, ContentError>;

    async fn is_eligible(&self, id: u64) -> Result<bool, ContentError>;

    /// Eligible ids for a full reindex page, highest id first.
    async fn query_ids(&self, page: &PageRequest) -> Result<Vec<u64>, ContentError>;

    /// Estimated number of eligible items in a scope.
    async fn count(&self, scope: Option<&str>) -> Result<u64, ContentError>;

    /// Drop per-page caches between reindex pages.
    fn release_caches(&self) {}
}

/// Fire-and-forget sink for end-of-run failure reports.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, report: &FailureReport);
}

/// Writes reports to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, report: &FailureReport) {
        warn!(
            scope = report.scope.as_deref().unwrap_or("-"),
            failed_items = report.failed_items.len(),
            failed_offsets = ?report.failed_offsets,
            "Indexing run finished with failures"
        );
    }
}
