// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Counters, gauges and histograms for the indexer, the transport and the
//! search read path.
//!
//! Only the `metrics` facade is used here; the host installs whichever
//! exporter it runs (Prometheus, OTEL, a debugging recorder in tests).
//!
//! # Metric Naming Convention
//! - `search_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: bulk, index, delete, search, mapping
//! - `status`: success, error, rejected, fallback

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record an engine request outcome
pub fn record_request(operation: &str, status: &str) {
    counter!(
        "search_sync_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record engine request latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "search_sync_request_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Documents accepted by the engine
pub fn record_documents_indexed(count: usize) {
    counter!("search_sync_documents_indexed_total").increment(count as u64);
}

/// Documents that exhausted their retries
pub fn record_documents_failed(count: usize) {
    counter!("search_sync_documents_failed_total").increment(count as u64);
}

/// Documents skipped before encoding (missing or vetoed)
pub fn record_documents_skipped(count: usize) {
    counter!("search_sync_documents_skipped_total").increment(count as u64);
}

/// Bulk retry attempt (attempt 2 onwards)
pub fn record_bulk_retry(attempt: usize, pending: usize) {
    counter!("search_sync_bulk_retries_total").increment(1);
    histogram!(
        "search_sync_bulk_retry_items",
        "attempt" => attempt.to_string()
    )
    .record(pending as f64);
}

/// Bulk request body size
pub fn record_bulk_bytes(bytes: usize) {
    histogram!("search_sync_bulk_bytes").record(bytes as f64);
}

/// A host failed and the transport moved to the next one
pub fn record_failover(host: &str) {
    counter!(
        "search_sync_transport_failovers_total",
        "host" => host.to_string()
    )
    .increment(1);
}

/// Record circuit breaker call outcome
pub fn record_circuit_breaker_call(circuit: &str, outcome: &str) {
    counter!(
        "search_sync_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Ids handed to the indexer when a sync queue drains
pub fn record_queue_drain(index_count: usize, removal_count: usize) {
    histogram!("search_sync_queue_drain_size", "kind" => "index").record(index_count as f64);
    histogram!("search_sync_queue_drain_size", "kind" => "remove").record(removal_count as f64);
}

/// Full reindex progress
pub fn set_reindex_offset(offset: u64) {
    gauge!("search_sync_reindex_offset").set(offset as f64);
}

pub fn set_reindex_synced(synced: u64) {
    gauge!("search_sync_reindex_synced").set(synced as f64);
}

/// Search read path outcome (`indexed` or `fallback`)
pub fn record_search(outcome: &str) {
    counter!(
        "search_sync_searches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}
