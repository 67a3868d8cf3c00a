// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transport: the single chokepoint for engine HTTP calls.
//!
//! [`HttpTransport`] tries the configured hosts in order, up to
//! `max_host_attempts` calls in total. Connection errors, timeouts and 5xx
//! responses move on to the next host; any other status is handed back to
//! the caller as-is. Each host sits behind its own circuit breaker so a
//! host that keeps failing is skipped without paying its timeout again.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::IndexerConfig;
use crate::resilience::circuit_breaker::{CircuitConfig, CircuitError, HostCircuits};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },
    #[error("request to {host} timed out")]
    Timeout { host: String },
    #[error("engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("circuit open for {host}")]
    CircuitOpen { host: String },
    #[error("all hosts failed after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
    #[error("invalid response body: {0}")]
    InvalidBody(String),
    #[error("transport setup failed: {0}")]
    Setup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the host, e.g. `content/_bulk`
    pub path: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Overrides the transport's default timeout
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())],
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path)
    }

    pub fn put(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Mark the body as newline-delimited JSON.
    #[must_use]
    pub fn ndjson(self) -> Self {
        self.with_header("Content-Type", NDJSON_CONTENT_TYPE)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }

    /// Turn a non-2xx response into an error.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// `Authorization` header value for the configured credentials.
pub fn auth_header(config: &IndexerConfig) -> Option<String> {
    if let Some(ref key) = config.api_key {
        return Some(format!("ApiKey {}", key));
    }
    config.basic_auth.as_ref().map(|auth| {
        let raw = format!("{}:{}", auth.username, auth.password);
        format!("Basic {}", BASE64.encode(raw))
    })
}

/// reqwest-backed transport with host failover.
pub struct HttpTransport {
    client: reqwest::Client,
    hosts: Vec<String>,
    max_attempts: usize,
    default_timeout: Duration,
    authorization: Option<String>,
    circuits: HostCircuits,
}

impl HttpTransport {
    pub fn new(config: &IndexerConfig) -> Result<Self, TransportError> {
        Self::with_circuits(config, CircuitConfig::default())
    }

    pub fn with_circuits(config: &IndexerConfig, circuit_config: CircuitConfig) -> Result<Self, TransportError> {
        if config.hosts.is_empty() {
            return Err(TransportError::Setup("no hosts configured".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            hosts: config.hosts.iter().map(|h| h.trim_end_matches('/').to_string()).collect(),
            max_attempts: config.max_host_attempts.max(1),
            default_timeout: config.request_timeout(),
            authorization: auth_header(config),
            circuits: HostCircuits::new(circuit_config),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    async fn send_once(&self, host: &str, req: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = format!("{}/{}", host, req.path.trim_start_matches('/'));
        let mut builder = self
            .client
            .request(req.method.as_reqwest(), &url)
            .timeout(req.timeout.unwrap_or(self.default_timeout));

        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref auth) = self.authorization {
            builder = builder.header("Authorization", auth.as_str());
        }
        if let Some(ref body) = req.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| classify(host, &e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(host, &e))?;

        if status >= 500 {
            return Err(TransportError::Status { status, body });
        }
        Ok(TransportResponse { status, body })
    }
}

fn classify(host: &str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { host: host.to_string() }
    } else {
        TransportError::Connect {
            host: host.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, req: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut last = None;

        for (attempt, host) in self.hosts.iter().cycle().take(self.max_attempts).enumerate() {
            let breaker = self.circuits.for_host(host);
            let result = breaker.call(|| self.send_once(host, &req)).await;

            let err = match result {
                Ok(response) => {
                    debug!(host = %host, path = %req.path, status = response.status, "Engine request done");
                    crate::metrics::record_request(&req.path_kind(), "success");
                    return Ok(response);
                }
                Err(CircuitError::Rejected) => TransportError::CircuitOpen { host: host.clone() },
                Err(CircuitError::Inner(e)) => e,
            };

            warn!(host = %host, attempt = attempt + 1, error = %err, "Engine request failed, trying next host");
            crate::metrics::record_failover(host);
            last = Some(err);
        }

        crate::metrics::record_request(&req.path_kind(), "error");
        Err(TransportError::Exhausted {
            attempts: self.max_attempts,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

impl TransportRequest {
    /// Coarse label for metrics: the last path segment if it is an
    /// endpoint (`_bulk`, `_search`, ...), otherwise `document`.
    fn path_kind(&self) -> String {
        self.path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .filter(|s| s.starts_with('_'))
            .unwrap_or("document")
            .to_string()
    }
}
