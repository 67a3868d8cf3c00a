// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk writes with partial-failure retry.
//!
//! Each flushed batch gets up to `bulk_max_attempts` attempts. After every
//! attempt the accepted items leave the pending set, so a retry only
//! resubmits what the engine rejected. Items still failing after the last
//! attempt go into the failure ledger together with the batch offset. A
//! transport failure ends the batch at once and only records the offset.

use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::bulk::{encode_body, BulkBatch, BulkEntry, BulkResponse};
use super::mapping::EnginePaths;
use super::types::BulkOutcome;
use super::{IndexError, Indexer};
use crate::metrics::{self, LatencyTimer};
use crate::resilience::retry::RetryConfig;
use crate::state::FailureLedger;
use crate::transport::TransportRequest;

impl Indexer {
    /// Prepare, encode and write `ids` to the indexer's index.
    ///
    /// Missing ids and ids vetoed by a skip hook are counted as skipped.
    /// An id the content store fails to prepare is counted as failed and
    /// goes into the failure ledger; the rest of the batch still goes out.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn bulk_index(&self, ids: &[u64]) -> Result<BulkOutcome, IndexError> {
        self.bulk_index_into(&self.paths(), ids, None).await
    }

    pub(super) async fn bulk_index_into(
        &self,
        paths: &EnginePaths,
        ids: &[u64],
        offset: Option<u64>,
    ) -> Result<BulkOutcome, IndexError> {
        let mut outcome = BulkOutcome::default();
        let mut batch = BulkBatch::new(self.config.bulk_page_size, self.config.bulk_flush_bytes);

        for &id in ids {
            let mut doc = match self.content.prepare(id).await {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    debug!(id, "Item vanished before indexing");
                    outcome.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(id, error = %e, offset = ?offset, "Could not prepare item, recording failure");
                    FailureLedger::record(self.state.as_ref(), &self.keys, [id], offset).await?;
                    metrics::record_documents_failed(1);
                    outcome.failed += 1;
                    outcome.failed_ids.push(id);
                    continue;
                }
            };
            if self.hooks.skip_index(&doc) {
                debug!(id, "Document vetoed by skip hook");
                outcome.skipped += 1;
                continue;
            }
            self.hooks.prepare(&mut doc);

            if let Some(reason) = batch.push_document(&doc)? {
                debug!(?reason, "Bulk batch threshold reached");
                let entries = batch.take();
                outcome.merge(self.flush_entries(paths, entries, offset).await?);
            }
        }

        if !batch.is_empty() {
            let entries = batch.take();
            outcome.merge(self.flush_entries(paths, entries, offset).await?);
        }

        metrics::record_documents_skipped(outcome.skipped);
        Ok(outcome)
    }

    /// Write one batch, retrying rejected items.
    pub(super) async fn flush_entries(
        &self,
        paths: &EnginePaths,
        entries: Vec<BulkEntry>,
        offset: Option<u64>,
    ) -> Result<BulkOutcome, IndexError> {
        let policy = RetryConfig::bulk(
            self.config.bulk_max_attempts,
            Duration::from_millis(self.config.bulk_retry_delay_ms),
        );
        let max_attempts = self.config.bulk_max_attempts;
        let submitted = entries.len();
        let mut pending = entries;
        let mut retries = 0;
        let mut attempt = 1;

        loop {
            let wait = policy.delay_for(attempt);
            if !wait.is_zero() {
                sleep(wait).await;
            }

            match self.submit_bulk(paths, &pending, attempt).await {
                Ok(rejected) => {
                    pending.retain(|entry| rejected.contains(&entry.id));
                    if pending.is_empty() {
                        break;
                    }
                    if attempt >= max_attempts {
                        warn!(
                            attempt,
                            failed = pending.len(),
                            offset = ?offset,
                            "Bulk retries exhausted, recording failures"
                        );
                        FailureLedger::record(
                            self.state.as_ref(),
                            &self.keys,
                            pending.iter().map(|e| e.id),
                            offset,
                        )
                        .await?;
                        break;
                    }
                    attempt += 1;
                    retries += 1;
                    metrics::record_bulk_retry(attempt, pending.len());
                    debug!(attempt, pending = pending.len(), "Retrying rejected bulk items");
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        attempt,
                        pending = pending.len(),
                        offset = ?offset,
                        "Bulk request failed, skipping batch"
                    );
                    // Without a page offset the ids are the only way back to these items.
                    let items: Vec<u64> = match offset {
                        Some(_) => Vec::new(),
                        None => pending.iter().map(|e| e.id).collect(),
                    };
                    FailureLedger::record(self.state.as_ref(), &self.keys, items, offset).await?;
                    break;
                }
            }
        }

        let failed_ids: Vec<u64> = pending.iter().map(|e| e.id).collect();
        metrics::record_documents_indexed(submitted - failed_ids.len());
        metrics::record_documents_failed(failed_ids.len());

        Ok(BulkOutcome {
            indexed: submitted - failed_ids.len(),
            failed: failed_ids.len(),
            skipped: 0,
            retries,
            failed_ids,
        })
    }

    /// One bulk request. Returns the ids the engine rejected or left
    /// unanswered.
    async fn submit_bulk(
        &self,
        paths: &EnginePaths,
        entries: &[BulkEntry],
        attempt: usize,
    ) -> Result<BTreeSet<u64>, IndexError> {
        let body = encode_body(entries);
        metrics::record_bulk_bytes(body.len());

        let req = TransportRequest::post(paths.bulk(), body)
            .ndjson()
            .with_timeout(self.config.bulk_timeout());

        let response = {
            let _timer = LatencyTimer::new("bulk");
            self.transport.request(req).await?.error_for_status()?
        };
        let json = response.json()?;
        let parsed = BulkResponse::parse(&json)
            .ok_or_else(|| IndexError::InvalidResponse("bulk response has no items".into()))?;

        let rejected = parsed.rejected_of(entries.iter().map(|e| e.id));
        debug!(
            attempt,
            items = entries.len(),
            rejected = rejected.len(),
            "Bulk request done"
        );
        Ok(rejected)
    }
}
