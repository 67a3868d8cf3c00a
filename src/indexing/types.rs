// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public result types of the indexing engine.

use uuid::Uuid;

use crate::query::SearchResults;
use crate::state::ProgressCursor;

/// Result of a bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Documents the engine accepted
    pub indexed: usize,
    /// Documents still failing after retries, or lost to a transport failure
    pub failed: usize,
    /// Ids missing from the content store or vetoed by a hook
    pub skipped: usize,
    /// Bulk requests sent after the first attempt
    pub retries: usize,
    pub failed_ids: Vec<u64>,
}

impl BulkOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub(crate) fn merge(&mut self, other: BulkOutcome) {
        self.indexed += other.indexed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.retries += other.retries;
        self.failed_ids.extend(other.failed_ids);
    }
}

/// Where a full reindex stands after one step.
#[derive(Debug, Clone, PartialEq)]
pub enum ReindexStep {
    /// A page was written; the cursor is persisted
    Progress(ProgressCursor),
    /// Every scope is done and the read path is back on
    Completed(ReindexSummary),
}

impl ReindexStep {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, ReindexStep::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexSummary {
    pub run_id: Uuid,
    pub synced: u64,
    pub failed: u64,
}

/// Why a search was not answered from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    ReadDisabled,
    ReindexRunning,
    IndexMissing,
    EngineUnavailable(String),
    InvalidResponse(String),
    StateUnavailable(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadDisabled => write!(f, "read path disabled"),
            Self::ReindexRunning => write!(f, "full reindex running"),
            Self::IndexMissing => write!(f, "index missing"),
            Self::EngineUnavailable(e) => write!(f, "engine unavailable: {}", e),
            Self::InvalidResponse(e) => write!(f, "invalid search response: {}", e),
            Self::StateUnavailable(e) => write!(f, "state store unavailable: {}", e),
        }
    }
}

/// Search result, or a signal to use the host's own listing.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Indexed(SearchResults),
    Fallback(FallbackReason),
}

impl SearchOutcome {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, SearchOutcome::Fallback(_))
    }

    pub fn results(&self) -> Option<&SearchResults> {
        match self {
            SearchOutcome::Indexed(results) => Some(results),
            SearchOutcome::Fallback(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_outcome_merge() {
        let mut total = BulkOutcome { indexed: 8, failed: 2, failed_ids: vec![3, 4], ..Default::default() };
        assert!(!total.is_success());
        total.merge(BulkOutcome { indexed: 5, skipped: 1, retries: 1, ..Default::default() });
        assert_eq!((total.indexed, total.failed, total.skipped, total.retries), (13, 2, 1, 1));
        assert_eq!(total.failed_ids, vec![3, 4]);
    }

    #[test]
    fn test_fallback_display() {
        assert_eq!(FallbackReason::IndexMissing.to_string(), "index missing");
        assert_eq!(
            FallbackReason::EngineUnavailable("timeout".into()).to_string(),
            "engine unavailable: timeout"
        );
    }
}
