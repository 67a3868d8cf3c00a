// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis state backend.
//!
//! Each state record is one Redis string. A namespace (e.g. `"blog:"`) is
//! prepended to every key so several sites can share one Redis instance.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use super::{StateError, StateStore};
use crate::resilience::retry::{retry, RetryConfig};

fn backend(e: RedisError) -> StateError {
    StateError::Backend(e.to_string())
}

pub struct RedisStateStore {
    manager: ConnectionManager,
    namespace: String,
}

impl RedisStateStore {
    pub async fn new(url: &str) -> Result<Self, StateError> {
        Self::with_prefix(url, None).await
    }

    pub async fn with_prefix(url: &str, namespace: Option<&str>) -> Result<Self, StateError> {
        let client = Client::open(url).map_err(backend)?;
        let manager = retry("redis_connect", &RetryConfig::admin(), || ConnectionManager::new(client.clone()))
            .await
            .map_err(backend)?;

        Ok(Self {
            manager,
            namespace: namespace.map(str::to_owned).unwrap_or_default(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.namespace
    }

    fn key(&self, name: &str) -> String {
        let mut key = String::with_capacity(self.namespace.len() + name.len());
        key.push_str(&self.namespace);
        key.push_str(name);
        key
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let mut conn = self.manager.clone();
        conn.get(self.key(key)).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(self.key(key), value).await.map_err(backend)
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(self.key(key)).await.map_err(backend)
    }
}
