// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resumable full reindex.

use tracing::{info, warn};
use uuid::Uuid;

use super::mapping::EnginePaths;
use super::types::{ReindexStep, ReindexSummary};
use super::{IndexError, Indexer};
use crate::content::PageRequest;
use crate::metrics;
use crate::state::{FailureLedger, IndexPhase, IndexState, ProgressCursor};

impl Indexer {
    /// Rebuild the index for `scopes` (the base index when empty), one page
    /// at a time until every scope is done.
    ///
    /// Resumes a persisted run instead of starting over. Returns
    /// [`IndexError::Cancelled`] if [`Indexer::cancel`] is called while it
    /// runs; the cancel takes effect after the page in flight.
    #[tracing::instrument(skip(self), fields(scopes = ?scopes))]
    pub async fn full_reindex(&self, scopes: &[&str]) -> Result<ReindexSummary, IndexError> {
        let mut step = self.reindex_step(scopes).await?;
        loop {
            match step {
                ReindexStep::Completed(summary) => return Ok(summary),
                ReindexStep::Progress(cursor) => step = self.continue_run(cursor.run_id).await?,
            }
        }
    }

    /// Process a single page of the current run, starting one if none is
    /// persisted. Hosts that spread a reindex over many short invocations
    /// call this repeatedly.
    pub async fn reindex_step(&self, scopes: &[&str]) -> Result<ReindexStep, IndexError> {
        let state = self.state().await?;
        let cursor = match state.phase {
            IndexPhase::Running(cursor) => {
                self.resume_run(&cursor).await?;
                cursor
            }
            _ => self.start_run(scopes).await?,
        };
        self.advance(cursor).await
    }

    async fn continue_run(&self, run_id: Uuid) -> Result<ReindexStep, IndexError> {
        match self.state().await?.phase {
            IndexPhase::Running(cursor) if cursor.run_id == run_id => self.advance(cursor).await,
            _ => {
                warn!(%run_id, "Full reindex stopped: cursor cleared by cancel");
                Err(IndexError::Cancelled)
            }
        }
    }

    async fn start_run(&self, scopes: &[&str]) -> Result<ProgressCursor, IndexError> {
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
        let first = scopes.first().map(String::as_str);

        self.recreate_index(first).await?;
        FailureLedger::clear(self.state.as_ref(), &self.keys).await?;

        let total = self.content.count(first).await?;
        let cursor = ProgressCursor::start(scopes, total);
        IndexState::running(cursor.clone()).save(self.state.as_ref(), &self.keys).await?;

        info!(run_id = %cursor.run_id, total, scope = ?cursor.current_scope, "Full reindex started");
        Ok(cursor)
    }

    async fn resume_run(&self, cursor: &ProgressCursor) -> Result<(), IndexError> {
        let paths = EnginePaths::new(&self.config, cursor.current_scope.as_deref());
        if !self.index_exists_at(&paths).await? {
            return Err(IndexError::IndexMissing(paths.index().to_string()));
        }
        info!(
            run_id = %cursor.run_id,
            offset = cursor.offset,
            synced = cursor.synced,
            scope = ?cursor.current_scope,
            "Resuming full reindex"
        );
        Ok(())
    }

    async fn recreate_index(&self, scope: Option<&str>) -> Result<(), IndexError> {
        let paths = EnginePaths::new(&self.config, scope);
        self.delete_index_at(&paths).await?;
        self.put_mapping_at(&paths).await
    }

    /// Index the page at the cursor, or finish the scope when it is empty.
    async fn advance(&self, mut cursor: ProgressCursor) -> Result<ReindexStep, IndexError> {
        let scope = cursor.current_scope.clone();
        let page_size = self.config.bulk_page_size;
        let page = PageRequest {
            scope: scope.clone(),
            offset: cursor.offset,
            limit: page_size,
        };

        let ids = self.content.query_ids(&page).await?;
        if ids.is_empty() {
            return self.complete_scope(cursor).await;
        }

        let paths = EnginePaths::new(&self.config, scope.as_deref());
        let outcome = self.bulk_index_into(&paths, &ids, Some(cursor.offset)).await?;
        self.content.release_caches();

        cursor.advance(page_size as u64, outcome.indexed as u64, outcome.failed as u64);
        metrics::set_reindex_offset(cursor.offset);
        metrics::set_reindex_synced(cursor.synced);
        info!(
            offset = cursor.offset,
            total = cursor.total,
            synced = cursor.synced,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Full reindex page done"
        );

        self.persist_cursor(&cursor).await?;
        Ok(ReindexStep::Progress(cursor))
    }

    /// Save the cursor unless the run was cancelled meanwhile.
    async fn persist_cursor(&self, cursor: &ProgressCursor) -> Result<(), IndexError> {
        let current = self.state().await?;
        if current.cursor().map(|c| c.run_id) != Some(cursor.run_id) {
            warn!(run_id = %cursor.run_id, offset = cursor.offset, "Full reindex cancelled between pages");
            return Err(IndexError::Cancelled);
        }
        IndexState::running(cursor.clone()).save(self.state.as_ref(), &self.keys).await?;
        Ok(())
    }

    async fn complete_scope(&self, mut cursor: ProgressCursor) -> Result<ReindexStep, IndexError> {
        let ledger = FailureLedger::load(self.state.as_ref(), &self.keys).await?;
        if !ledger.is_empty() {
            self.notifier
                .notify(&ledger.report(cursor.current_scope.as_deref(), Some(cursor.run_id)));
        }
        FailureLedger::clear(self.state.as_ref(), &self.keys).await?;
        info!(scope = ?cursor.current_scope, synced = cursor.synced, "Full reindex scope complete");

        let next = cursor.scopes.get(1).cloned();
        if let Some(ref scope) = next {
            let total = self.content.count(Some(scope)).await?;
            cursor.next_scope(total);
            self.recreate_index(Some(scope)).await?;
            self.persist_cursor(&cursor).await?;
            return Ok(ReindexStep::Progress(cursor));
        }

        let current = self.state().await?;
        if current.cursor().map(|c| c.run_id) != Some(cursor.run_id) {
            return Err(IndexError::Cancelled);
        }
        IndexState::completed(cursor.synced).save(self.state.as_ref(), &self.keys).await?;
        info!(run_id = %cursor.run_id, synced = cursor.synced, failed = cursor.failed, "Full reindex complete");

        Ok(ReindexStep::Completed(ReindexSummary {
            run_id: cursor.run_id,
            synced: cursor.synced,
            failed: cursor.failed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::IndexerConfig;
    use crate::content::NotificationSink;
    use crate::state::FailureReport;
    use crate::transport::Method;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<FailureReport>>);

    impl NotificationSink for RecordingSink {
        fn notify(&self, report: &FailureReport) {
            self.0.lock().push(report.clone());
        }
    }

    fn small_pages() -> IndexerConfig {
        IndexerConfig {
            bulk_page_size: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_reindex_pages_by_id_descending() {
        let content = Arc::new(MemoryContent::with_ids(1..=5));
        let (indexer, transport, _) = indexer(small_pages(), content.clone());
        // delete index, put mapping, then three bulk pages
        transport.push_ok(404, serde_json::json!({}));
        transport.push_ok(200, serde_json::json!({"acknowledged": true}));
        transport.push_ok(200, bulk_response(&[5, 4], &[]));
        transport.push_ok(200, bulk_response(&[3, 2], &[]));
        transport.push_ok(200, bulk_response(&[1], &[]));

        let summary = indexer.full_reindex(&[]).await.unwrap();
        assert_eq!((summary.synced, summary.failed), (5, 0));

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Delete);
        assert_eq!(requests[1].method, Method::Put);
        assert_eq!(requests[1].path, "content");
        let first_page = requests[2].body.clone().unwrap();
        assert!(first_page.starts_with(r#"{"index":{"_id":5}}"#));
        assert_eq!(requests.len(), 5);

        assert_eq!(*content.releases.lock(), 3);
        let state = indexer.state().await.unwrap();
        assert!(matches!(state.phase, IndexPhase::Completed { synced: 5, .. }));
        assert!(state.read_enabled);
    }

    #[tokio::test]
    async fn test_resume_continues_at_persisted_offset() {
        let content = Arc::new(MemoryContent::with_ids(1..=400));
        let (indexer, transport, state) = indexer(IndexerConfig::default(), content);

        let mut cursor = ProgressCursor::start(vec!["1".into()], 400);
        cursor.advance(350, 350, 0);
        IndexState::running(cursor.clone()).save(state.as_ref(), indexer.state_keys()).await.unwrap();
        let remaining: Vec<u64> = (1..=50).rev().collect();
        transport.push_ok(200, serde_json::json!({}));
        transport.push_ok(200, bulk_response(&remaining, &[]));

        let step = indexer.reindex_step(&["1"]).await.unwrap();
        let ReindexStep::Progress(next) = step else {
            panic!("expected progress");
        };
        assert_eq!(next.run_id, cursor.run_id);
        assert_eq!(next.offset, 700);
        assert_eq!(next.synced, 400);

        let requests = transport.requests();
        // index existence check, then one bulk page; no delete or mapping
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Head);
        assert_eq!(requests[1].path, "content-1/_bulk");
        let body = requests[1].body.clone().unwrap();
        assert_eq!(body.lines().count(), 100);
        assert!(body.starts_with(r#"{"index":{"_id":50}}"#));
    }

    #[tokio::test]
    async fn test_cancel_between_pages_stops_the_run() {
        let content = Arc::new(MemoryContent::with_ids(1..=6));
        let (indexer, _, _) = indexer(small_pages(), content);

        let first = indexer.reindex_step(&[]).await.unwrap();
        assert!(!first.is_completed());
        indexer.cancel().await.unwrap();

        let ReindexStep::Progress(cursor) = first else {
            panic!("expected progress");
        };
        assert!(matches!(indexer.continue_run(cursor.run_id).await, Err(IndexError::Cancelled)));
        let state = indexer.state().await.unwrap();
        assert_eq!(state.phase, IndexPhase::NotStarted);
        assert!(!state.read_enabled);
    }

    #[tokio::test]
    async fn test_completion_reports_and_clears_ledger() {
        let content = Arc::new(MemoryContent::with_ids(1..=2));
        let sink = Arc::new(RecordingSink::default());
        let config = IndexerConfig {
            bulk_max_attempts: 1,
            ..Default::default()
        };
        let (indexer, transport, state) = indexer(config, content);
        let indexer = indexer.with_notifier(sink.clone());

        transport.push_ok(200, serde_json::json!({}));
        transport.push_ok(200, serde_json::json!({}));
        transport.push_ok(200, bulk_response(&[2, 1], &[2]));

        let summary = indexer.full_reindex(&[]).await.unwrap();
        assert_eq!((summary.synced, summary.failed), (1, 1));

        let reports = sink.0.lock().clone();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].failed_items, vec![2]);
        assert_eq!(reports[0].failed_offsets, vec![0]);
        assert!(FailureLedger::load(state.as_ref(), indexer.state_keys()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpreparable_item_does_not_stall_the_run() {
        let content = Arc::new(MemoryContent::with_ids(1..=4));
        content.fail_prepare(3);
        let sink = Arc::new(RecordingSink::default());
        let (indexer, transport, state) = indexer(small_pages(), content);
        let indexer = indexer.with_notifier(sink.clone());

        transport.push_ok(404, serde_json::json!({}));
        transport.push_ok(200, serde_json::json!({"acknowledged": true}));
        transport.push_ok(200, bulk_response(&[4], &[]));
        transport.push_ok(200, bulk_response(&[2, 1], &[]));

        let summary = indexer.full_reindex(&[]).await.unwrap();
        assert_eq!((summary.synced, summary.failed), (3, 1));

        let reports = sink.0.lock().clone();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].failed_items, vec![3]);
        assert_eq!(reports[0].failed_offsets, vec![0]);
        assert!(FailureLedger::load(state.as_ref(), indexer.state_keys()).await.unwrap().is_empty());
        assert!(matches!(indexer.status().await.unwrap(), IndexPhase::Completed { synced: 3, .. }));
    }

    #[tokio::test]
    async fn test_multiple_scopes_run_in_order() {
        let content = Arc::new(MemoryContent::with_ids(1..=1));
        let (indexer, transport, _) = indexer(IndexerConfig::default(), content);
        for _ in 0..2 {
            transport.push_ok(200, serde_json::json!({"acknowledged": true}));
            transport.push_ok(200, serde_json::json!({"acknowledged": true}));
            transport.push_ok(200, bulk_response(&[1], &[]));
        }

        let summary = indexer.full_reindex(&["1", "2"]).await.unwrap();
        assert_eq!(summary.synced, 2);

        let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec!["content-1", "content-1", "content-1/_bulk", "content-2", "content-2", "content-2/_bulk"]
        );
    }
}
