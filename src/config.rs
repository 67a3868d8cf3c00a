// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the indexer and query compiler.
//!
//! # Example
//!
//! ```
//! use search_sync::IndexerConfig;
//!
//! // Minimal config (uses defaults)
//! let config = IndexerConfig::default();
//! assert_eq!(config.bulk_page_size, 350);
//! assert_eq!(config.request_timeout_ms, 15_000);
//!
//! // Full config
//! let config = IndexerConfig {
//!     hosts: vec!["http://es-1:9200".into(), "http://es-2:9200".into()],
//!     index_name: "blog".into(),
//!     bulk_page_size: 500,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::Deserialize;
use std::time::Duration;

use crate::indexing::IndexError;

/// Basic-auth credentials injected by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Configuration for the indexer.
///
/// All fields have defaults. At minimum, point `hosts` at a reachable
/// engine for production use.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// Engine hosts, tried in order on failure
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Base index name (scoped runs append `-<scope>`)
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Engine major version; below 7 document paths carry a mapping type
    #[serde(default = "default_engine_major_version")]
    pub engine_major_version: u32,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    /// Timeouts
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_bulk_timeout_ms")]
    pub bulk_timeout_ms: u64,

    /// Max attempts across the host list before surfacing an error
    #[serde(default = "default_max_host_attempts")]
    pub max_host_attempts: usize,

    /// Bulk settings
    #[serde(default = "default_bulk_page_size")]
    pub bulk_page_size: usize,
    #[serde(default = "default_bulk_max_attempts")]
    pub bulk_max_attempts: usize,
    #[serde(default)]
    pub bulk_retry_delay_ms: u64,
    #[serde(default = "default_bulk_flush_bytes")]
    pub bulk_flush_bytes: usize,

    /// Ceiling substituted for "unbounded" page sizes
    #[serde(default = "default_max_results_window")]
    pub max_results_window: usize,

    /// Relevance settings
    #[serde(default = "default_search_fields")]
    pub search_fields: Vec<String>,
    #[serde(default = "default_phrase_boost")]
    pub phrase_boost: f64,
    #[serde(default = "default_and_boost")]
    pub and_boost: f64,
    #[serde(default = "default_fuzziness")]
    pub fuzziness: u32,

    /// Eligibility
    #[serde(default = "default_indexable_statuses")]
    pub indexable_statuses: Vec<String>,
    /// Extra statuses accepted for `attachment_types` only
    #[serde(default = "default_status_exceptions")]
    pub status_exceptions: Vec<String>,
    /// Sub-item types whose status follows their parent
    #[serde(default = "default_attachment_types")]
    pub attachment_types: Vec<String>,
    #[serde(default = "default_indexable_types")]
    pub indexable_types: Vec<String>,

    /// Read-side status defaults
    #[serde(default = "default_public_statuses")]
    pub public_statuses: Vec<String>,
    #[serde(default = "default_private_statuses")]
    pub private_statuses: Vec<String>,

    /// Prefix for progress/failure keys in the state store
    #[serde(default = "default_state_key_prefix")]
    pub state_key_prefix: String,

    /// Nesting limit for meta/date query groups
    #[serde(default = "default_max_query_depth")]
    pub max_query_depth: usize,
}

fn default_hosts() -> Vec<String> { vec!["http://localhost:9200".to_string()] }
fn default_index_name() -> String { "content".to_string() }
fn default_engine_major_version() -> u32 { 7 }
fn default_request_timeout_ms() -> u64 { 15_000 }
fn default_bulk_timeout_ms() -> u64 { 30_000 }
fn default_max_host_attempts() -> usize { 3 }
fn default_bulk_page_size() -> usize { 350 }
fn default_bulk_max_attempts() -> usize { 5 }
fn default_bulk_flush_bytes() -> usize { 8 * 1024 * 1024 } // 8 MB
fn default_max_results_window() -> usize { 10_000 }
fn default_search_fields() -> Vec<String> {
    vec!["post_title".into(), "post_excerpt".into(), "post_content".into()]
}
fn default_phrase_boost() -> f64 { 4.0 }
fn default_and_boost() -> f64 { 2.0 }
fn default_fuzziness() -> u32 { 1 }
fn default_indexable_statuses() -> Vec<String> { vec!["publish".into()] }
fn default_status_exceptions() -> Vec<String> { vec!["inherit".into()] }
fn default_indexable_types() -> Vec<String> { vec!["post".into(), "page".into()] }
fn default_attachment_types() -> Vec<String> { vec!["attachment".into()] }
fn default_public_statuses() -> Vec<String> { vec!["publish".into()] }
fn default_private_statuses() -> Vec<String> { vec!["private".into()] }
fn default_state_key_prefix() -> String { "search_sync:".to_string() }
fn default_max_query_depth() -> usize { 16 }

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            index_name: default_index_name(),
            engine_major_version: default_engine_major_version(),
            api_key: None,
            basic_auth: None,
            request_timeout_ms: default_request_timeout_ms(),
            bulk_timeout_ms: default_bulk_timeout_ms(),
            max_host_attempts: default_max_host_attempts(),
            bulk_page_size: default_bulk_page_size(),
            bulk_max_attempts: default_bulk_max_attempts(),
            bulk_retry_delay_ms: 0,
            bulk_flush_bytes: default_bulk_flush_bytes(),
            max_results_window: default_max_results_window(),
            search_fields: default_search_fields(),
            phrase_boost: default_phrase_boost(),
            and_boost: default_and_boost(),
            fuzziness: default_fuzziness(),
            indexable_statuses: default_indexable_statuses(),
            status_exceptions: default_status_exceptions(),
            attachment_types: default_attachment_types(),
            indexable_types: default_indexable_types(),
            public_statuses: default_public_statuses(),
            private_statuses: default_private_statuses(),
            state_key_prefix: default_state_key_prefix(),
            max_query_depth: default_max_query_depth(),
        }
    }
}

impl IndexerConfig {
    /// Parse a config from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IndexError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.hosts.is_empty() {
            return Err(IndexError::Config("hosts must not be empty".into()));
        }
        if self.bulk_page_size == 0 {
            return Err(IndexError::Config("bulk_page_size must be > 0".into()));
        }
        if self.bulk_max_attempts == 0 {
            return Err(IndexError::Config("bulk_max_attempts must be > 0".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }

    /// Index name for a scope (tenant/site); `None` is the base index.
    #[must_use]
    pub fn index_for_scope(&self, scope: Option<&str>) -> String {
        match scope {
            Some(s) if !s.is_empty() => format!("{}-{}", self.index_name, s),
            _ => self.index_name.clone(),
        }
    }

    /// Whether document paths need a mapping type segment.
    #[must_use]
    pub fn uses_mapping_types(&self) -> bool {
        self.engine_major_version < 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::default();
        assert_eq!(config.bulk_page_size, 350);
        assert_eq!(config.bulk_max_attempts, 5);
        assert_eq!(config.bulk_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_results_window, 10_000);
        assert_eq!(config.fuzziness, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = IndexerConfig::from_json(
            r#"{"hosts": ["http://a:9200", "http://b:9200"], "bulk_page_size": 100, "api_key": "k"}"#,
        )
        .unwrap();
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.bulk_page_size, 100);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.index_name, "content");
    }

    #[test]
    fn test_validate_rejects_empty_hosts() {
        let config = IndexerConfig { hosts: vec![], ..Default::default() };
        assert!(config.validate().is_err());
        assert!(IndexerConfig::from_json(r#"{"bulk_page_size": 0}"#).is_err());
    }

    #[test]
    fn test_index_for_scope() {
        let config = IndexerConfig::default();
        assert_eq!(config.index_for_scope(None), "content");
        assert_eq!(config.index_for_scope(Some("")), "content");
        assert_eq!(config.index_for_scope(Some("site-2")), "content-site-2");
        assert!(!config.uses_mapping_types());
    }
}
