// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk wire format.
//!
//! A bulk body is newline-delimited JSON: one action line and one source
//! line per document, with a trailing newline after the last pair.
//!
//! ```text
//! {"index":{"_id":42}}
//! {"post_id":42,"post_title":"Hello",...}
//! ```
//!
//! [`BulkBatch`] accumulates encoded pairs and reports when a count or
//! byte threshold is reached, whichever comes first.

use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::debug;

use crate::document::Document;

/// Flush trigger reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Item count threshold reached
    Count,
    /// Byte size threshold reached
    Size,
    /// End of input
    Final,
}

/// One encoded document: action line and source line, both newline-terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEntry {
    pub id: u64,
    pub lines: String,
}

impl BulkEntry {
    pub fn index(doc: &Document) -> Result<Self, serde_json::Error> {
        let action = json!({ "index": { "_id": doc.id } });
        let source = serde_json::to_string(doc)?;
        Ok(Self {
            id: doc.id,
            lines: format!("{}\n{}\n", action, source),
        })
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.lines.len()
    }
}

/// Concatenate entries into a request body.
pub fn encode_body(entries: &[BulkEntry]) -> String {
    let mut body = String::with_capacity(entries.iter().map(BulkEntry::size_bytes).sum());
    for entry in entries {
        body.push_str(&entry.lines);
    }
    body
}

/// Pending entries with count and byte thresholds.
#[derive(Debug)]
pub struct BulkBatch {
    entries: Vec<BulkEntry>,
    total_bytes: usize,
    flush_count: usize,
    flush_bytes: usize,
}

impl BulkBatch {
    pub fn new(flush_count: usize, flush_bytes: usize) -> Self {
        Self {
            entries: Vec::with_capacity(flush_count.min(1024)),
            total_bytes: 0,
            flush_count: flush_count.max(1),
            flush_bytes: flush_bytes.max(1),
        }
    }

    /// Add an entry, returns flush reason if threshold hit
    pub fn push(&mut self, entry: BulkEntry) -> Option<FlushReason> {
        self.total_bytes += entry.size_bytes();
        self.entries.push(entry);

        if self.entries.len() >= self.flush_count {
            Some(FlushReason::Count)
        } else if self.total_bytes >= self.flush_bytes {
            Some(FlushReason::Size)
        } else {
            None
        }
    }

    pub fn push_document(&mut self, doc: &Document) -> Result<Option<FlushReason>, serde_json::Error> {
        Ok(self.push(BulkEntry::index(doc)?))
    }

    /// Take the current entries for flushing
    pub fn take(&mut self) -> Vec<BulkEntry> {
        debug!(count = self.entries.len(), bytes = self.total_bytes, "Bulk batch taken for flush");
        self.total_bytes = 0;
        std::mem::take(&mut self.entries)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

/// Per-item status from a bulk response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    pub id: u64,
    pub status: u16,
    pub error: Option<String>,
}

impl BulkItemResult {
    /// Anything but a 2xx without an error body. A missing or
    /// out-of-range status reads as 0 and fails.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || !(200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// Parse `{errors, items: [{<action>: {_id, status, error}}]}`.
    /// Returns `None` when the body is not a bulk response.
    pub fn parse(body: &Value) -> Option<Self> {
        let items = body.get("items")?.as_array()?;
        let errors = body.get("errors").and_then(Value::as_bool).unwrap_or(false);

        let items = items
            .iter()
            .filter_map(|item| {
                let (_, result) = item.as_object()?.iter().next()?;
                let id = match result.get("_id")? {
                    Value::String(s) => s.parse().ok()?,
                    Value::Number(n) => n.as_u64()?,
                    _ => return None,
                };
                let status = result
                    .get("status")
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(0);
                let error = result.get("error").filter(|e| !e.is_null()).map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .unwrap_or_else(|| other.to_string()),
                });
                Some(BulkItemResult { id, status, error })
            })
            .collect();

        Some(Self { errors, items })
    }

    /// Ids the engine rejected.
    pub fn failed_ids(&self) -> BTreeSet<u64> {
        self.items.iter().filter(|i| i.is_failure()).map(|i| i.id).collect()
    }

    /// Rejected ids plus every submitted id the response never mentions.
    pub fn rejected_of(&self, submitted: impl IntoIterator<Item = u64>) -> BTreeSet<u64> {
        let answered: BTreeSet<u64> = self.items.iter().map(|i| i.id).collect();
        let mut rejected = self.failed_ids();
        rejected.extend(submitted.into_iter().filter(|id| !answered.contains(id)));
        rejected
    }
}
