// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics sink: counters, timings, and breaker state transitions.
//!
//! Two implementations exist — an aggregating one keyed by source/endpoint,
//! and a no-op one — and consumers never branch on which is installed,
//! holding only `Arc<dyn MetricsSink>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Capability for recording counters, gauges, and breaker transitions.
///
/// Every method takes `&self` and is safe to call concurrently from any
/// orchestrator loop.
pub trait MetricsSink: Send + Sync {
    fn discovery_attempt(&self, source: &str);
    fn discovery_success(&self, source: &str, device_count: usize, elapsed_ms: u64);
    fn discovery_failure(&self, source: &str, elapsed_ms: u64);

    fn reconcile_attempt(&self, source: &str);
    fn reconcile_success(&self, source: &str, elapsed_ms: u64);
    fn reconcile_failure(&self, source: &str, elapsed_ms: u64);

    fn api_call(&self, endpoint: &str);
    fn api_success(&self, endpoint: &str);
    fn api_failure(&self, endpoint: &str);

    fn set_active_integrations(&self, count: u64);
    fn add_devices_discovered(&self, count: u64);

    fn breaker_state_change(&self, breaker: &str, from: &str, to: &str);
}

/// Per-key counters tracked by [`InMemoryMetrics`].
#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_elapsed_ms: u64,
}

/// Aggregating in-memory metrics sink, keyed by source/endpoint name.
#[derive(Default)]
pub struct InMemoryMetrics {
    discovery: RwLock<HashMap<String, Counters>>,
    reconcile: RwLock<HashMap<String, Counters>>,
    api: RwLock<HashMap<String, Counters>>,
    active_integrations: AtomicU64,
    total_devices_discovered: AtomicU64,
    breaker_transitions: RwLock<Vec<(String, String, String)>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovery_counters(&self, source: &str) -> Counters {
        self.discovery.read().unwrap_or_else(|e| e.into_inner()).get(source).cloned().unwrap_or_default()
    }

    pub fn reconcile_counters(&self, source: &str) -> Counters {
        self.reconcile.read().unwrap_or_else(|e| e.into_inner()).get(source).cloned().unwrap_or_default()
    }

    pub fn active_integrations(&self) -> u64 {
        self.active_integrations.load(Ordering::Relaxed)
    }

    pub fn total_devices_discovered(&self) -> u64 {
        self.total_devices_discovered.load(Ordering::Relaxed)
    }

    pub fn breaker_transitions(&self) -> Vec<(String, String, String)> {
        self.breaker_transitions.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn bump<F: FnOnce(&mut Counters)>(map: &RwLock<HashMap<String, Counters>>, key: &str, f: F) {
        let mut guard = map.write().unwrap_or_else(|e| e.into_inner());
        f(guard.entry(key.to_owned()).or_default());
    }
}

impl MetricsSink for InMemoryMetrics {
    fn discovery_attempt(&self, source: &str) {
        Self::bump(&self.discovery, source, |c| c.attempts += 1);
    }

    fn discovery_success(&self, source: &str, device_count: usize, elapsed_ms: u64) {
        Self::bump(&self.discovery, source, |c| {
            c.successes += 1;
            c.total_elapsed_ms += elapsed_ms;
        });
        self.total_devices_discovered.fetch_add(device_count as u64, Ordering::Relaxed);
    }

    fn discovery_failure(&self, source: &str, elapsed_ms: u64) {
        Self::bump(&self.discovery, source, |c| {
            c.failures += 1;
            c.total_elapsed_ms += elapsed_ms;
        });
    }

    fn reconcile_attempt(&self, source: &str) {
        Self::bump(&self.reconcile, source, |c| c.attempts += 1);
    }

    fn reconcile_success(&self, source: &str, elapsed_ms: u64) {
        Self::bump(&self.reconcile, source, |c| {
            c.successes += 1;
            c.total_elapsed_ms += elapsed_ms;
        });
    }

    fn reconcile_failure(&self, source: &str, elapsed_ms: u64) {
        Self::bump(&self.reconcile, source, |c| {
            c.failures += 1;
            c.total_elapsed_ms += elapsed_ms;
        });
    }

    fn api_call(&self, endpoint: &str) {
        Self::bump(&self.api, endpoint, |c| c.attempts += 1);
    }

    fn api_success(&self, endpoint: &str) {
        Self::bump(&self.api, endpoint, |c| c.successes += 1);
    }

    fn api_failure(&self, endpoint: &str) {
        Self::bump(&self.api, endpoint, |c| c.failures += 1);
    }

    fn set_active_integrations(&self, count: u64) {
        self.active_integrations.store(count, Ordering::Relaxed);
    }

    fn add_devices_discovered(&self, count: u64) {
        self.total_devices_discovered.fetch_add(count, Ordering::Relaxed);
    }

    fn breaker_state_change(&self, breaker: &str, from: &str, to: &str) {
        self.breaker_transitions.write().unwrap_or_else(|e| e.into_inner()).push((
            breaker.to_owned(),
            from.to_owned(),
            to.to_owned(),
        ));
    }
}

/// Metrics sink that discards everything; used when no metrics backend is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn discovery_attempt(&self, _source: &str) {}
    fn discovery_success(&self, _source: &str, _device_count: usize, _elapsed_ms: u64) {}
    fn discovery_failure(&self, _source: &str, _elapsed_ms: u64) {}
    fn reconcile_attempt(&self, _source: &str) {}
    fn reconcile_success(&self, _source: &str, _elapsed_ms: u64) {}
    fn reconcile_failure(&self, _source: &str, _elapsed_ms: u64) {}
    fn api_call(&self, _endpoint: &str) {}
    fn api_success(&self, _endpoint: &str) {}
    fn api_failure(&self, _endpoint: &str) {}
    fn set_active_integrations(&self, _count: u64) {}
    fn add_devices_discovered(&self, _count: u64) {}
    fn breaker_state_change(&self, _breaker: &str, _from: &str, _to: &str) {}
}
