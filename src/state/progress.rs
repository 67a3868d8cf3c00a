// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed records kept in the state store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{load_json, save_json, StateError, StateStore};

/// Key names under the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    pub index_state: String,
    pub failed_items: String,
    pub failed_offsets: String,
}

impl StateKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            index_state: format!("{}index_state", prefix),
            failed_items: format!("{}failed_items", prefix),
            failed_offsets: format!("{}failed_offsets", prefix),
        }
    }
}

/// Resumption point of a full reindex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub offset: u64,
    pub synced: u64,
    #[serde(default)]
    pub failed: u64,
    pub total: u64,
    /// Scopes still to process, current one included
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub current_scope: Option<String>,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl ProgressCursor {
    pub fn start(scopes: Vec<String>, total: u64) -> Self {
        let current_scope = scopes.first().cloned();
        Self {
            offset: 0,
            synced: 0,
            failed: 0,
            total,
            scopes,
            current_scope,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// Move past one page. The offset never decreases.
    pub fn advance(&mut self, page_size: u64, synced: u64, failed: u64) {
        self.offset = self.offset.saturating_add(page_size);
        self.synced += synced;
        self.failed += failed;
    }

    /// Drop the current scope and reset the offset for the next one.
    /// Returns `false` when no scope is left.
    pub fn next_scope(&mut self, total: u64) -> bool {
        if !self.scopes.is_empty() {
            self.scopes.remove(0);
        }
        self.current_scope = self.scopes.first().cloned();
        self.offset = 0;
        self.total = total;
        self.current_scope.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexPhase {
    NotStarted,
    Running(ProgressCursor),
    Completed { at: DateTime<Utc>, synced: u64 },
}

/// Phase and read-path flag, always written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub phase: IndexPhase,
    pub read_enabled: bool,
}

impl Default for IndexState {
    fn default() -> Self {
        Self {
            phase: IndexPhase::NotStarted,
            read_enabled: true,
        }
    }
}

impl IndexState {
    pub fn running(cursor: ProgressCursor) -> Self {
        Self {
            phase: IndexPhase::Running(cursor),
            read_enabled: false,
        }
    }

    /// State written by a cancel: no cursor, reads off.
    pub fn cancelled() -> Self {
        Self {
            phase: IndexPhase::NotStarted,
            read_enabled: false,
        }
    }

    pub fn completed(synced: u64) -> Self {
        Self {
            phase: IndexPhase::Completed { at: Utc::now(), synced },
            read_enabled: true,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&ProgressCursor> {
        match self.phase {
            IndexPhase::Running(ref cursor) => Some(cursor),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.phase, IndexPhase::Running(_))
    }

    pub async fn load(store: &dyn StateStore, keys: &StateKeys) -> Result<Self, StateError> {
        Ok(load_json(store, &keys.index_state).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &dyn StateStore, keys: &StateKeys) -> Result<(), StateError> {
        save_json(store, &keys.index_state, self).await
    }
}

/// Items and batch offsets that failed after retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLedger {
    pub items: BTreeSet<u64>,
    pub offsets: BTreeSet<u64>,
}

impl FailureLedger {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.offsets.is_empty()
    }

    pub async fn load(store: &dyn StateStore, keys: &StateKeys) -> Result<Self, StateError> {
        let items: Option<BTreeSet<u64>> = load_json(store, &keys.failed_items).await?;
        let offsets: Option<BTreeSet<u64>> = load_json(store, &keys.failed_offsets).await?;
        Ok(Self {
            items: items.unwrap_or_default(),
            offsets: offsets.unwrap_or_default(),
        })
    }

    pub async fn save(&self, store: &dyn StateStore, keys: &StateKeys) -> Result<(), StateError> {
        save_json(store, &keys.failed_items, &self.items).await?;
        save_json(store, &keys.failed_offsets, &self.offsets).await
    }

    /// Merge new failures into the persisted ledger.
    pub async fn record(
        store: &dyn StateStore,
        keys: &StateKeys,
        items: impl IntoIterator<Item = u64>,
        offset: Option<u64>,
    ) -> Result<(), StateError> {
        let mut ledger = Self::load(store, keys).await?;
        ledger.items.extend(items);
        ledger.offsets.extend(offset);
        ledger.save(store, keys).await
    }

    pub async fn clear(store: &dyn StateStore, keys: &StateKeys) -> Result<(), StateError> {
        store.delete(&keys.failed_items).await?;
        store.delete(&keys.failed_offsets).await
    }

    pub fn report(&self, scope: Option<&str>, run_id: Option<Uuid>) -> FailureReport {
        FailureReport {
            scope: scope.map(String::from),
            run_id,
            failed_items: self.items.iter().copied().collect(),
            failed_offsets: self.offsets.iter().copied().collect(),
            generated_at: Utc::now(),
        }
    }
}

/// End-of-run summary handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub scope: Option<String>,
    pub run_id: Option<Uuid>,
    pub failed_items: Vec<u64>,
    pub failed_offsets: Vec<u64>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryStateStore;

    #[test]
    fn test_keys_use_prefix() {
        let keys = StateKeys::new("blog:");
        assert_eq!(keys.index_state, "blog:index_state");
        assert_eq!(keys.failed_offsets, "blog:failed_offsets");
    }

    #[test]
    fn test_cursor_advance_and_scopes() {
        let mut cursor = ProgressCursor::start(vec!["1".into(), "2".into()], 700);
        assert_eq!(cursor.current_scope.as_deref(), Some("1"));
        cursor.advance(350, 348, 2);
        assert_eq!((cursor.offset, cursor.synced, cursor.failed), (350, 348, 2));
        assert!(cursor.next_scope(10));
        assert_eq!(cursor.current_scope.as_deref(), Some("2"));
        assert_eq!(cursor.offset, 0);
        assert_eq!(cursor.synced, 348);
        assert!(!cursor.next_scope(0));
    }

    #[tokio::test]
    async fn test_index_state_roundtrip() {
        let store = InMemoryStateStore::new();
        let keys = StateKeys::new("t:");
        assert_eq!(IndexState::load(&store, &keys).await.unwrap(), IndexState::default());

        let state = IndexState::running(ProgressCursor::start(vec![], 10));
        state.save(&store, &keys).await.unwrap();
        let loaded = IndexState::load(&store, &keys).await.unwrap();
        assert!(loaded.is_running());
        assert!(!loaded.read_enabled);
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_ledger_record_merges() {
        let store = InMemoryStateStore::new();
        let keys = StateKeys::new("t:");
        FailureLedger::record(&store, &keys, [3, 4], Some(0)).await.unwrap();
        FailureLedger::record(&store, &keys, [4, 9], Some(350)).await.unwrap();

        let ledger = FailureLedger::load(&store, &keys).await.unwrap();
        assert_eq!(ledger.items.into_iter().collect::<Vec<_>>(), vec![3, 4, 9]);
        assert_eq!(ledger.offsets.into_iter().collect::<Vec<_>>(), vec![0, 350]);

        FailureLedger::clear(&store, &keys).await.unwrap();
        assert!(FailureLedger::load(&store, &keys).await.unwrap().is_empty());
    }

    #[test]
    fn test_report_lists_sorted_ids() {
        let ledger = FailureLedger {
            items: [9, 1].into_iter().collect(),
            offsets: [350].into_iter().collect(),
        };
        let report = ledger.report(Some("site-2"), None);
        assert_eq!(report.failed_items, vec![1, 9]);
        assert_eq!(report.failed_offsets, vec![350]);
        assert_eq!(report.scope.as_deref(), Some("site-2"));
    }
}
