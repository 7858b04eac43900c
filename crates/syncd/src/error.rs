// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the sync engine.
//!
//! Mirrors the outward-facing shape of an HTTP error body while staying a
//! plain `std::error::Error` so it composes with `anyhow` at task boundaries.

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Closed set of error kinds the core can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncError {
    /// Config failed validation: missing sources with no gateway, missing
    /// `listen_addr`, malformed CIDR, or an unknown source type.
    ConfigInvalid { reason: String },
    /// `Adapter::fetch` failed for a source.
    AdapterFetchFailed { source: String, elapsed_ms: u64, reason: String },
    /// `Adapter::reconcile` failed for a source.
    AdapterReconcileFailed { source: String, elapsed_ms: u64, reason: String },
    /// A circuit breaker refused the call.
    CircuitOpen { breaker: String },
    /// The gateway session has not completed enrollment yet.
    GatewayNotEnrolled,
    /// Gateway connect/hello/get_config/push transport failure.
    GatewayTransport { reason: String },
    /// A spawned task panicked; the panic payload (best-effort message) is
    /// wrapped here instead of escaping the task.
    TaskPanic { task: String, message: String },
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigInvalid { .. } => "CONFIG_INVALID",
            Self::AdapterFetchFailed { .. } => "ADAPTER_FETCH_FAILED",
            Self::AdapterReconcileFailed { .. } => "ADAPTER_RECONCILE_FAILED",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::GatewayNotEnrolled => "GATEWAY_NOT_ENROLLED",
            Self::GatewayTransport { .. } => "GATEWAY_TRANSPORT",
            Self::TaskPanic { .. } => "TASK_PANIC",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::ConfigInvalid { .. } => 400,
            Self::AdapterFetchFailed { .. } | Self::AdapterReconcileFailed { .. } => 502,
            Self::CircuitOpen { .. } => 503,
            Self::GatewayNotEnrolled => 409,
            Self::GatewayTransport { .. } => 502,
            Self::TaskPanic { .. } => 500,
        }
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body =
            ErrorResponse { error: ErrorBody { code: self.code().to_owned(), message: self.to_string() } };
        (status, Json(body))
    }

    pub fn circuit_open(breaker: impl Into<String>) -> Self {
        Self::CircuitOpen { breaker: breaker.into() }
    }

    pub fn fetch_failed(
        source: impl Into<String>,
        elapsed: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self::AdapterFetchFailed {
            source: source.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            reason: reason.into(),
        }
    }

    pub fn reconcile_failed(
        source: impl Into<String>,
        elapsed: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self::AdapterReconcileFailed {
            source: source.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::GatewayTransport { reason: reason.into() }
    }

    /// True for the one sentinel loops are expected to recognize and back
    /// off on silently rather than logging as an error.
    pub fn is_not_enrolled(&self) -> bool {
        matches!(self, Self::GatewayNotEnrolled)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid { reason } => write!(f, "config invalid: {reason}"),
            Self::AdapterFetchFailed { source, elapsed_ms, reason } => {
                write!(f, "fetch failed for source {source} after {elapsed_ms}ms: {reason}")
            }
            Self::AdapterReconcileFailed { source, elapsed_ms, reason } => {
                write!(f, "reconcile failed for source {source} after {elapsed_ms}ms: {reason}")
            }
            Self::CircuitOpen { breaker } => write!(f, "circuit breaker {breaker} is open"),
            Self::GatewayNotEnrolled => write!(f, "gateway session is not enrolled"),
            Self::GatewayTransport { reason } => write!(f, "gateway transport error: {reason}"),
            Self::TaskPanic { task, message } => write!(f, "task {task} panicked: {message}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Top-level error response envelope (ingress surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// A joined set of per-source failures accumulated over one orchestrator cycle.
///
/// One failing source never halts another's cycle (failure isolation); the
/// cycle driver collects failures here and hands the joined error to the
/// diagnostic channel without aborting remaining sources.
#[derive(Debug, Default, Clone)]
pub struct JoinedError {
    pub errors: Vec<SyncError>,
}

impl JoinedError {
    pub fn push(&mut self, err: SyncError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), JoinedError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{} failure(s): [{}]", parts.len(), parts.join("; "))
    }
}

impl std::error::Error for JoinedError {}
