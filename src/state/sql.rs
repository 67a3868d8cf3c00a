// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL state backend (SQLite or MySQL through sqlx `Any`).
//!
//! One row per state record:
//!
//! ```sql
//! CREATE TABLE search_sync_state (
//!   name       VARCHAR(191) PRIMARY KEY,
//!   value      LONGTEXT NOT NULL,
//!   updated_at BIGINT NOT NULL
//! )
//! ```
//!
//! MySQL LONGTEXT comes back from the `Any` driver as bytes, hence the
//! two-step decode in `get`.

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::sync::Once;
use std::time::Duration;

use super::{StateError, StateStore};
use crate::resilience::retry::{retry, RetryConfig};

static ANY_DRIVERS: Once = Once::new();

fn backend(e: sqlx::Error) -> StateError {
    StateError::Backend(e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    MySql,
}

impl Dialect {
    fn of(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            Dialect::Sqlite
        } else {
            Dialect::MySql
        }
    }

    fn create_table(self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "CREATE TABLE IF NOT EXISTS search_sync_state (\
                 name TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at INTEGER NOT NULL)"
            }
            Dialect::MySql => {
                "CREATE TABLE IF NOT EXISTS search_sync_state (\
                 name VARCHAR(191) PRIMARY KEY, value LONGTEXT NOT NULL, updated_at BIGINT NOT NULL)"
            }
        }
    }

    fn upsert(self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "INSERT INTO search_sync_state (name, value, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"
            }
            Dialect::MySql => {
                "INSERT INTO search_sync_state (name, value, updated_at) VALUES (?, ?, ?) \
                 ON DUPLICATE KEY UPDATE value = VALUES(value), updated_at = VALUES(updated_at)"
            }
        }
    }
}

pub struct SqlStateStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlStateStore {
    pub async fn new(url: &str) -> Result<Self, StateError> {
        ANY_DRIVERS.call_once(sqlx::any::install_default_drivers);
        let dialect = Dialect::of(url);

        let pool = retry("sql_connect", &RetryConfig::admin(), || {
            AnyPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
        })
        .await
        .map_err(backend)?;

        retry("sql_create_table", &RetryConfig::admin(), || {
            sqlx::query(dialect.create_table()).execute(&pool)
        })
        .await
        .map_err(backend)?;

        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }
}

fn decode_value(row: &AnyRow) -> Option<String> {
    row.try_get::<String, _>("value")
        .ok()
        .or_else(|| row.try_get::<Vec<u8>, _>("value").ok().and_then(|raw| String::from_utf8(raw).ok()))
}

#[async_trait]
impl StateStore for SqlStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let row = sqlx::query("SELECT value FROM search_sync_state WHERE name = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.as_ref().and_then(decode_value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        sqlx::query(self.dialect.upsert())
            .bind(key)
            .bind(value)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        sqlx::query("DELETE FROM search_sync_state WHERE name = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
