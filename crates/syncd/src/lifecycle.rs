// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lifecycle: panic-safe task launching, the main tickers
//! (discovery, reconciliation, config-poll, heartbeat), and shutdown.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::discovery::DiscoveryOrchestrator;
use crate::error::SyncError;
use crate::gateway::GatewaySession;
use crate::reconcile::ReconcileOrchestrator;
use crate::reload::{ConfigReloader, IntervalWatch};

/// Bound on the diagnostic channel fed by panicking tasks; a service that
/// panics faster than this drains is already in serious trouble, so the
/// channel drops overflow rather than blocking the panicking task's unwind.
const DIAGNOSTIC_CHANNEL_CAPACITY: usize = 10;

/// Spawns `fut` under `tokio::spawn`, catching any panic and turning it into
/// a [`SyncError::TaskPanic`] sent on `diagnostics` instead of letting it
/// propagate as a silently-aborted task.
fn spawn_supervised<F>(
    label: &'static str,
    diagnostics: mpsc::Sender<SyncError>,
    fut: F,
) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let result = AssertUnwindSafe(fut).catch_unwind().await;
        if let Err(panic) = result {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_owned());
            tracing::error!(task = label, message = %message, "task panicked");
            if diagnostics.try_send(SyncError::TaskPanic { task: label.to_owned(), message }).is_err() {
                tracing::warn!(task = label, "diagnostic channel full or closed, dropping panic report");
            }
        }
    })
}

/// Owns every long-running loop for one process: the two always-on tickers
/// (discovery, reconciliation) and, when a gateway is configured, the
/// config-poll and heartbeat loops.
pub struct Service {
    config: Arc<tokio::sync::RwLock<Config>>,
    discovery: Arc<DiscoveryOrchestrator>,
    reconcile: Arc<ReconcileOrchestrator>,
    reloader: Arc<ConfigReloader>,
    gateway: Option<Arc<GatewaySession>>,
    shutdown: CancellationToken,
    diagnostics_tx: mpsc::Sender<SyncError>,
    diagnostics_rx: Option<mpsc::Receiver<SyncError>>,
    intervals: watch::Receiver<IntervalWatch>,
    tasks: Vec<JoinHandle<()>>,
}

impl Service {
    pub fn new(
        config: Arc<tokio::sync::RwLock<Config>>,
        discovery: Arc<DiscoveryOrchestrator>,
        reconcile: Arc<ReconcileOrchestrator>,
        reloader: Arc<ConfigReloader>,
        gateway: Option<Arc<GatewaySession>>,
        intervals: watch::Receiver<IntervalWatch>,
    ) -> Self {
        let (diagnostics_tx, diagnostics_rx) = mpsc::channel(DIAGNOSTIC_CHANNEL_CAPACITY);
        Self {
            config,
            discovery,
            reconcile,
            reloader,
            gateway,
            shutdown: CancellationToken::new(),
            diagnostics_tx,
            diagnostics_rx: Some(diagnostics_rx),
            intervals,
            tasks: Vec::new(),
        }
    }

    /// Takes the diagnostic receiver, if it hasn't already been taken. A
    /// caller (e.g. the ingress surface, or a log-forwarding task) can drain
    /// it to surface panics that would otherwise only appear in logs.
    pub fn take_diagnostics(&mut self) -> Option<mpsc::Receiver<SyncError>> {
        self.diagnostics_rx.take()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Optional gateway bootstrap — connect, enroll, fetch config — then two
    /// always-on tickers (discovery fires immediately on the first tick) and,
    /// if a gateway is configured, the config-poll and heartbeat loops. If
    /// enrollment is pending and no static sources are configured, returns
    /// that as a hard error; otherwise enrollment-pending is handled silently
    /// by the loops themselves. The bootstrap config fetch runs so
    /// gateway-delivered sources are live before the first discovery cycle
    /// rather than waiting out a full `config_poll_interval`.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        if let Some(gateway) = &self.gateway {
            let bootstrap_result = gateway.connect_and_enroll(vec!["sync".to_owned()]).await;
            let has_static_sources = !self.config.read().await.sources.is_empty();
            match bootstrap_result {
                Ok(()) => Self::fetch_and_apply_config(&self.reloader, gateway).await,
                Err(err) => {
                    if !has_static_sources {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "gateway bootstrap failed, continuing on static sources only");
                }
            }
        }

        let (discovery_interval, update_interval) = *self.intervals.borrow();

        self.tasks.push(self.spawn_discovery_loop(discovery_interval));
        self.tasks.push(self.spawn_reconcile_loop(update_interval));

        if let Some(gateway) = self.gateway.clone() {
            self.tasks.push(self.spawn_config_poll_loop(gateway.clone()));
            self.tasks.push(self.spawn_heartbeat_loop(gateway));
        }

        Ok(())
    }

    fn spawn_discovery_loop(&self, interval: Duration) -> JoinHandle<()> {
        let discovery = self.discovery.clone();
        let cancel = self.shutdown.clone();
        let diagnostics = self.diagnostics_tx.clone();
        let mut intervals = self.intervals.clone();
        spawn_supervised("discovery", diagnostics, async move {
            let mut interval = interval;
            'restart: loop {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break 'restart,
                        changed = intervals.changed() => {
                            if changed.is_err() {
                                break 'restart;
                            }
                            let (discovery_interval, _) = *intervals.borrow_and_update();
                            if discovery_interval != interval {
                                interval = discovery_interval;
                                continue 'restart;
                            }
                            continue;
                        }
                        _ = ticker.tick() => {}
                    }
                    if let Err(err) = discovery.run_once().await {
                        tracing::warn!(error = %err, "discovery cycle completed with failures");
                    }
                }
            }
        })
    }

    fn spawn_reconcile_loop(&self, interval: Duration) -> JoinHandle<()> {
        let reconcile = self.reconcile.clone();
        let cancel = self.shutdown.clone();
        let diagnostics = self.diagnostics_tx.clone();
        let mut intervals = self.intervals.clone();
        spawn_supervised("reconcile", diagnostics, async move {
            let mut interval = interval;
            'restart: loop {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break 'restart,
                        changed = intervals.changed() => {
                            if changed.is_err() {
                                break 'restart;
                            }
                            let (_, update_interval) = *intervals.borrow_and_update();
                            if update_interval != interval {
                                interval = update_interval;
                                continue 'restart;
                            }
                            continue;
                        }
                        _ = ticker.tick() => {}
                    }
                    if let Err(err) = reconcile.run_once().await {
                        tracing::warn!(error = %err, "reconcile cycle completed with failures");
                    }
                }
            }
        })
    }

    /// Fetches config once and applies it if the gateway reports a fresh
    /// version, logging and discarding any failure rather than propagating
    /// it — used both for the bootstrap fetch in `start()` and every tick of
    /// `spawn_config_poll_loop`.
    async fn fetch_and_apply_config(reloader: &Arc<ConfigReloader>, gateway: &Arc<GatewaySession>) {
        match gateway.get_config().await {
            Ok(Some(delivery)) => {
                match serde_json::from_value::<crate::reload::GatewayConfigPayload>(delivery.config_json) {
                    Ok(payload) => {
                        if let Err(err) = reloader.apply_gateway_payload(payload).await {
                            tracing::warn!(error = %err, "rejected gateway config delivery");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "malformed gateway config payload");
                    }
                }
            }
            Ok(None) => {}
            Err(err) if err.is_not_enrolled() => {
                tracing::debug!("config fetch skipped, not enrolled");
            }
            Err(err) => {
                tracing::warn!(error = %err, "config fetch failed");
            }
        }
    }

    fn spawn_config_poll_loop(&self, gateway: Arc<GatewaySession>) -> JoinHandle<()> {
        let reloader = self.reloader.clone();
        let cancel = self.shutdown.clone();
        let diagnostics = self.diagnostics_tx.clone();
        spawn_supervised("config_poll", diagnostics, async move {
            loop {
                let interval = gateway.config_poll_interval().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                Self::fetch_and_apply_config(&reloader, &gateway).await;
            }
        })
    }

    fn spawn_heartbeat_loop(&self, gateway: Arc<GatewaySession>) -> JoinHandle<()> {
        let cancel = self.shutdown.clone();
        let diagnostics = self.diagnostics_tx.clone();
        spawn_supervised("heartbeat", diagnostics, async move {
            loop {
                let interval = gateway.heartbeat_interval().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                match gateway.push_status().await {
                    Ok(()) | Err(SyncError::GatewayNotEnrolled) => {}
                    Err(err) => tracing::warn!(error = %err, "heartbeat push failed"),
                }
            }
        })
    }

    /// Cancels the shutdown token, waits up to 2s for all tasks, closes the
    /// diagnostic channel, and disconnects the owned gateway client.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();

        let join_all = futures_util::future::join_all(self.tasks.drain(..));
        if tokio::time::timeout(Duration::from_secs(2), join_all).await.is_err() {
            tracing::warn!("not all tasks exited within the shutdown grace period");
        }

        if let Some(gateway) = &self.gateway {
            gateway.disconnect().await;
        }
    }

    /// Snapshot of whether every spawned task is still running, used by the
    /// ingress `status` endpoint.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}
