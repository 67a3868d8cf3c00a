// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Progress and failure persistence.
//!
//! The indexer keeps its reindex cursor, read-path flag and failure ledger
//! in a process-wide key/value store so a run survives restarts:
//!
//! ```text
//! <prefix>index_state     → IndexState { phase, read_enabled }   (one record)
//! <prefix>failed_items    → [u64]
//! <prefix>failed_offsets  → [u64]
//! ```
//!
//! Writes are last-writer-wins. Cancelling a run is a single write of
//! `index_state`, so the cursor and the read flag can never disagree.

mod memory;
mod progress;
mod redis;
mod sql;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use memory::InMemoryStateStore;
pub use progress::{FailureLedger, FailureReport, IndexPhase, IndexState, ProgressCursor, StateKeys};
pub use redis::RedisStateStore;
pub use sql::SqlStateStore;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("state backend error: {0}")]
    Backend(String),
    #[error("state (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key/value store with process-wide durability.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StateError>;
    async fn delete(&self, key: &str) -> Result<(), StateError>;
}

/// Read and decode a JSON value.
pub async fn load_json<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>, StateError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub async fn save_json<T: Serialize + ?Sized>(store: &dyn StateStore, key: &str, value: &T) -> Result<(), StateError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}
