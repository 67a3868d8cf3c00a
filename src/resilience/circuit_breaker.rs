// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-host circuit breakers on top of `recloser`.
//!
//! Every engine host gets its own breaker, created the first time the
//! transport talks to it. While a host's breaker is open the transport moves
//! straight to the next host instead of paying for another timeout.
//!
//! ```text
//!   Closed ──(error rate over window)──► Open ──(open_wait)──► HalfOpen
//!     ▲                                                          │
//!     └──────────────(probe calls succeed)───────────────────────┘
//! ```

use dashmap::DashMap;
use recloser::{AsyncRecloser, Error as RecloserError, Recloser};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The host's breaker is open; nothing was sent
    #[error("circuit open, call not attempted")]
    Rejected,
    #[error("{0}")]
    Inner(E),
}

/// Breaker tuning shared by every host.
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Failure ratio (0.0 - 1.0) that opens the breaker
    pub error_rate: f32,
    /// Calls observed while closed before the ratio counts
    pub closed_window: usize,
    /// Probe calls let through while half-open
    pub half_open_window: usize,
    /// Time an open breaker waits before probing
    pub open_wait: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            error_rate: 0.5,
            closed_window: 5,
            half_open_window: 2,
            open_wait: Duration::from_secs(30),
        }
    }
}

/// Breaker for one engine host.
pub struct CircuitBreaker {
    host: String,
    inner: AsyncRecloser,
    rejected: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(host: impl Into<String>, config: &CircuitConfig) -> Self {
        let recloser = Recloser::custom()
            .error_rate(config.error_rate)
            .closed_len(config.closed_window)
            .half_open_len(config.half_open_window)
            .open_wait(config.open_wait)
            .build();

        Self {
            host: host.into(),
            inner: recloser.into(),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Calls turned away while open.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Run `f` unless the breaker is open. Errors from `f` count against
    /// the host.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.inner.call(f()).await {
            Ok(value) => {
                metrics::record_circuit_breaker_call(&self.host, "success");
                Ok(value)
            }
            Err(RecloserError::Rejected) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(host = %self.host, "Host circuit open, skipping");
                metrics::record_circuit_breaker_call(&self.host, "rejected");
                Err(CircuitError::Rejected)
            }
            Err(RecloserError::Inner(e)) => {
                debug!(host = %self.host, "Host call failed, counted against circuit");
                metrics::record_circuit_breaker_call(&self.host, "failure");
                Err(CircuitError::Inner(e))
            }
        }
    }
}

/// Lazily created breakers keyed by host URL.
#[derive(Default)]
pub struct HostCircuits {
    config: CircuitConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl HostCircuits {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn for_host(&self, host: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(host) {
            return breaker.value().clone();
        }
        self.breakers
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(host, &self.config)))
            .value()
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
