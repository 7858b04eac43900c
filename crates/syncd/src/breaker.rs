// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker wrapping any outbound-dependency callable.
//!
//! Three-state gate (`Closed` / `Open` / `HalfOpen`) computed under a mutex
//! at each call, with half-open probing. The breaker never retries — callers
//! decide what to do with a failure.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::SyncError;
use crate::metrics::MetricsSink;

/// Public breaker state, exposed for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Tunables for a single breaker instance.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// Open -> HalfOpen dwell time.
    pub timeout: Duration,
    /// Closed-state failure-count decay window.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(60),
        }
    }
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    last_reset_time: Instant,
}

/// Circuit breaker instance wrapping an outbound dependency, identified by
/// `name` for logging and metrics.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
    metrics: std::sync::Arc<dyn MetricsSink>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig, metrics: std::sync::Arc<dyn MetricsSink>) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                last_reset_time: Instant::now(),
            }),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.recompute(&mut inner)
    }

    /// Recompute the visible state given elapsed time, without consuming a
    /// probe slot. Called at the top of every `allow_request`/`state` check.
    fn recompute(&self, inner: &mut Inner) -> BreakerState {
        match inner.state {
            BreakerState::Open => {
                let elapsed_since_failure =
                    inner.last_failure_time.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed_since_failure >= self.config.timeout {
                    self.transition(inner, BreakerState::HalfOpen);
                }
            }
            BreakerState::Closed => {
                if inner.last_reset_time.elapsed() >= self.config.reset_timeout {
                    inner.failure_count = 0;
                    inner.last_reset_time = Instant::now();
                }
            }
            BreakerState::HalfOpen => {}
        }
        inner.state
    }

    fn transition(&self, inner: &mut Inner, next: BreakerState) {
        if inner.state == next {
            return;
        }
        let prev = inner.state;
        inner.state = next;
        if next == BreakerState::HalfOpen {
            inner.success_count = 0;
        }
        if next == BreakerState::Closed {
            inner.failure_count = 0;
            inner.success_count = 0;
            inner.last_reset_time = Instant::now();
        }
        tracing::info!(
            breaker = %self.name,
            from = prev.as_str(),
            to = next.as_str(),
            "circuit breaker state change"
        );
        self.metrics.breaker_state_change(&self.name, prev.as_str(), next.as_str());
    }

    fn allow_request(&self, inner: &mut Inner) -> bool {
        match self.recompute(inner) {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => true,
        }
    }

    fn record_success(&self, inner: &mut Inner) {
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(inner, BreakerState::Closed);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self, inner: &mut Inner) {
        inner.last_failure_time = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                self.transition(inner, BreakerState::Open);
            }
            BreakerState::Open => {}
        }
    }

    /// Execute `work` if the breaker allows it; otherwise fail immediately
    /// with [`SyncError::CircuitOpen`] naming this breaker.
    pub async fn execute<F, Fut, T>(&self, work: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, SyncError>>,
    {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if !self.allow_request(&mut inner) {
                return Err(SyncError::circuit_open(self.name.clone()));
            }
        }

        let result = work().await;

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match &result {
            Ok(_) => self.record_success(&mut inner),
            Err(_) => self.record_failure(&mut inner),
        }
        result
    }
}

/// Classifies an HTTP-backed outcome as a breaker success or failure: network
/// errors and HTTP status >= 500 are failures, 4xx counts as a success
/// (the remote responded). The breaker itself does not retry.
pub fn is_http_failure(status: Option<u16>) -> bool {
    match status {
        Some(code) => code >= 500,
        None => true,
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
