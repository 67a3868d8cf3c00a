// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{StateError, StateStore};

/// Process-local state store. Durable only for the life of the process;
/// used in tests and single-process hosts.
///
/// [`set_offline`](Self::set_offline) makes every call fail, which is how
/// tests drive the indexer's state-unavailable paths.
#[derive(Default)]
pub struct InMemoryStateStore {
    records: RwLock<BTreeMap<String, String>>,
    offline: AtomicBool,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Keys currently held, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn online(&self) -> Result<(), StateError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StateError::Backend("in-memory store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        self.online()?;
        Ok(self.records.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        self.online()?;
        self.records.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        self.online()?;
        self.records.write().remove(key);
        Ok(())
    }
}
