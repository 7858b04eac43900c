// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation orchestrator: a single-flight loop that asks each source
//! to push availability information back to its own system. Runs
//! non-overlapping with itself via an atomic CAS flag (named after the
//! spec's own `armis_update_running` single-flight guard), independent of
//! and concurrent with the discovery cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::config::Config;
use crate::discovery::IntegrationTable;
use crate::error::{JoinedError, SyncError};
use crate::metrics::MetricsSink;

/// Default window after which a sweep that never completed is treated as
/// abandoned and its gate is force-cleared.
pub const DEFAULT_SWEEP_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default window after which a completed sweep's bookkeeping is considered
/// stale and eligible for a fresh run even if nothing else changed.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Per-source completion bookkeeping, gating reconciliation for sources that
/// declare a `sweep_interval`. Sources without one reconcile every tick.
#[derive(Debug, Clone, Copy)]
struct SweepState {
    started_at: Instant,
    completed: bool,
}

/// Tracks in-flight and completed sweeps per source so a source with a
/// `sweep_interval` configured only reconciles once per sweep window, and a
/// sweep that never reports completion eventually times out rather than
/// wedging that source forever.
#[derive(Default)]
pub struct CompletionTracker {
    sweeps: RwLock<HashMap<String, SweepState>>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `source` is eligible to reconcile right now: no sweep in
    /// flight (or the in-flight one timed out), and either no prior
    /// completed sweep or the completed one is stale.
    pub async fn should_run(&self, source: &str, sweep_timeout: Duration, stale_timeout: Duration) -> bool {
        let guard = self.sweeps.read().await;
        match guard.get(source) {
            None => true,
            Some(state) if !state.completed => state.started_at.elapsed() >= sweep_timeout,
            Some(state) => state.started_at.elapsed() >= stale_timeout,
        }
    }

    pub async fn mark_started(&self, source: &str) {
        self.sweeps.write().await.insert(
            source.to_owned(),
            SweepState { started_at: Instant::now(), completed: false },
        );
    }

    pub async fn mark_completed(&self, source: &str) {
        if let Some(state) = self.sweeps.write().await.get_mut(source) {
            state.completed = true;
        }
    }
}

pub struct ReconcileOrchestrator {
    config: Arc<RwLock<Config>>,
    integrations: Arc<IntegrationTable>,
    metrics: Arc<dyn MetricsSink>,
    tracker: Arc<CompletionTracker>,
    running: AtomicBool,
}

impl ReconcileOrchestrator {
    pub fn new(
        config: Arc<RwLock<Config>>,
        integrations: Arc<IntegrationTable>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            integrations,
            metrics,
            tracker: Arc::new(CompletionTracker::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Attempts to enter the single-flight reconciliation run; returns
    /// `false` immediately if a run is already in flight (non-overlapping
    /// with itself).
    fn try_begin(&self) -> bool {
        self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    fn end(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub async fn run_once(&self) -> Result<(), JoinedError> {
        if !self.try_begin() {
            tracing::debug!("reconciliation already running, skipping this tick");
            return Ok(());
        }

        let result = self.run_locked().await;
        self.end();
        result
    }

    async fn run_locked(&self) -> Result<(), JoinedError> {
        let config_snapshot = self.config.read().await.clone();
        let mut joined = JoinedError::default();

        for source in config_snapshot.sources.values() {
            if let Some(sweep_interval) = source.sweep_interval_override() {
                let stale_timeout = sweep_interval.max(DEFAULT_STALE_TIMEOUT);
                if !self.tracker.should_run(&source.name, DEFAULT_SWEEP_TIMEOUT, stale_timeout).await {
                    continue;
                }
                self.tracker.mark_started(&source.name).await;
            }

            let integrations = self.integrations.read().await;
            let Some(integration) = integrations.get(&source.name) else {
                continue;
            };
            let adapter = integration.adapter.clone();
            drop(integrations);

            self.metrics.reconcile_attempt(&source.name);
            let started = Instant::now();

            match adapter.reconcile().await {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    self.metrics.reconcile_success(&source.name, elapsed.as_millis() as u64);
                    if source.has_sweep_gate() {
                        self.tracker.mark_completed(&source.name).await;
                    }
                }
                Err(err) => {
                    let elapsed = started.elapsed();
                    self.metrics.reconcile_failure(&source.name, elapsed.as_millis() as u64);
                    tracing::warn!(source = %source.name, error = %err, "reconcile failed");
                    joined.push(SyncError::reconcile_failed(source.name.clone(), elapsed, err.to_string()));
                }
            }
        }

        joined.into_result()
    }
}
