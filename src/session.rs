// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Unit-of-work wrapper around change capture.
//!
//! A [`SyncSession`] lives for one host request (or job). Mutations are
//! recorded as they happen and written in one go by [`SyncSession::finish`],
//! which consumes the session so the queue drains exactly once.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capture::{CaptureOutcome, ChangeCapture, Mutation, SyncQueue};
use crate::content::ContentError;
use crate::indexing::{BulkOutcome, IndexError, Indexer};
use crate::metrics;

/// What a finished session wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub indexed: BulkOutcome,
    pub removed: usize,
    pub removal_failures: usize,
}

pub struct SyncSession {
    capture: Arc<ChangeCapture>,
    queue: SyncQueue,
}

impl SyncSession {
    pub fn new(capture: Arc<ChangeCapture>) -> Self {
        Self {
            capture,
            queue: SyncQueue::new(),
        }
    }

    pub async fn record(&mut self, mutation: Mutation) -> Result<CaptureOutcome, ContentError> {
        self.capture.capture(&mut self.queue, mutation).await
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Queue an index write directly, bypassing eligibility checks.
    pub fn enqueue(&mut self, id: u64) -> bool {
        self.queue.enqueue(id)
    }

    /// Drain the queue into the index.
    ///
    /// The queue is gone afterwards whatever the per-item outcome; failures
    /// end up in the failure ledger. Removals are applied even when the
    /// bulk write errors, and the first error is returned after them.
    pub async fn finish(mut self, indexer: &Indexer) -> Result<SessionReport, IndexError> {
        let ids = self.queue.drain();
        let removals = self.queue.drain_removals();
        metrics::record_queue_drain(ids.len(), removals.len());

        if ids.is_empty() && removals.is_empty() {
            debug!("Sync session finished with nothing queued");
            return Ok(SessionReport::default());
        }

        let mut report = SessionReport::default();
        let mut first_error = None;
        if !ids.is_empty() {
            match indexer.bulk_index(&ids).await {
                Ok(outcome) => report.indexed = outcome,
                Err(e) => {
                    warn!(error = %e, count = ids.len(), "Session bulk write failed, still applying removals");
                    first_error = Some(e);
                }
            }
        }
        for id in removals {
            match indexer.delete_one(id).await {
                Ok(true) => report.removed += 1,
                Ok(false) => report.removal_failures += 1,
                Err(e) => {
                    report.removal_failures += 1;
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            indexed = report.indexed.indexed,
            failed = report.indexed.failed,
            removed = report.removed,
            "Sync session flushed"
        );
        Ok(report)
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            warn!(
                pending = self.queue.len(),
                removals = self.queue.removal_len(),
                "Sync session dropped without finish, queued changes lost"
            );
        }
    }
}
