// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration data model: [`SourceConfig`] and the top-level [`Config`].
//!
//! `Config` is cloned-and-overlaid by the config reloader (see
//! `crate::reload`), never mutated in place while shared.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Tenant scoping rule applied to sources that omit `tenant_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantScope {
    /// Sources missing `tenant_id` inherit the service's default tenant.
    #[default]
    Tenant,
    /// Sources missing `tenant_id` are dropped with a warning.
    Platform,
}

/// Immutable configuration for a single source, once installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique key within the current source set.
    pub name: String,
    /// Adapter selector; must be present in the adapter registry.
    #[serde(rename = "type")]
    pub source_type: String,
    pub endpoint: String,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
    /// Namespace prefix for cached keys.
    #[serde(default)]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    #[serde(default)]
    pub partition: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub gateway_id: String,
    #[serde(default)]
    pub network_blacklist: Vec<String>,
    /// Overrides the service-wide discovery interval when present and parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_interval: Option<String>,
    /// Overrides the service-wide poll interval when present and parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    /// Presence enables the `CompletionTracker` reconciliation gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval: Option<String>,
}

impl SourceConfig {
    fn parse_duration(value: &Option<String>) -> Option<Duration> {
        value.as_deref().and_then(parse_duration_str)
    }

    pub fn discovery_interval_override(&self) -> Option<Duration> {
        Self::parse_duration(&self.discovery_interval)
    }

    pub fn poll_interval_override(&self) -> Option<Duration> {
        Self::parse_duration(&self.poll_interval)
    }

    pub fn sweep_interval_override(&self) -> Option<Duration> {
        Self::parse_duration(&self.sweep_interval)
    }

    pub fn has_sweep_gate(&self) -> bool {
        self.sweep_interval_override().is_some()
    }

    /// Validates this source in the context of the owning service's tenant
    /// scope. Does not check `type ∈ registry` — that's the reloader's job,
    /// since it alone knows the live registry.
    pub fn validate(&self, default_scope: TenantScope) -> Result<(), SyncError> {
        if self.endpoint.is_empty() {
            return Err(SyncError::ConfigInvalid {
                reason: format!("source {} has an empty endpoint", self.name),
            });
        }
        if self.tenant_id.is_none() && default_scope == TenantScope::Platform {
            return Err(SyncError::ConfigInvalid {
                reason: format!("source {} requires tenant_id under platform scope", self.name),
            });
        }
        for cidr in &self.network_blacklist {
            crate::blacklist::NetworkBlacklist::new(std::slice::from_ref(cidr))?;
        }
        Ok(())
    }
}

/// Parse a Go-style duration string (`"30s"`, `"5m"`, `"6h"`). Returns `None`
/// on any parse failure rather than a default value.
pub fn parse_duration_str(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let split_at = s.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    let (number, unit) = s.split_at(split_at);
    let value: f64 = number.parse().ok()?;
    let seconds = match unit {
        "ns" => value / 1_000_000_000.0,
        "us" | "µs" => value / 1_000_000.0,
        "ms" => value / 1_000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return None,
    };
    if seconds < 0.0 || !seconds.is_finite() {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

/// Security bundle placeholders. TLS certificate loading itself is out of
/// scope for this crate (delegated to process bootstrap); only the paths
/// needed to hand off to that bootstrap are modeled here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
}

/// Top-level service configuration, replaced atomically by the config
/// reloader. Cheap to clone — cloning is how the reloader takes a working
/// copy to overlay before installing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default = "default_discovery_interval_str")]
    pub discovery_interval: String,
    #[serde(default = "default_update_interval_str")]
    pub update_interval: String,
    #[serde(default = "default_poll_interval_str")]
    pub poll_interval: String,
    #[serde(default = "default_config_poll_interval_str")]
    pub config_poll_interval: String,
    #[serde(default = "default_heartbeat_interval_str")]
    pub heartbeat_interval: String,
    pub listen_addr: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub gateway_id: String,
    #[serde(default)]
    pub partition: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_slug: String,
    #[serde(default)]
    pub tenant_scope: TenantScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_addr: Option<String>,
    #[serde(default)]
    pub security: SecurityConfig,
}

fn default_discovery_interval_str() -> String {
    "6h".to_owned()
}
fn default_update_interval_str() -> String {
    "12h".to_owned()
}
fn default_poll_interval_str() -> String {
    "30s".to_owned()
}
fn default_config_poll_interval_str() -> String {
    "5m".to_owned()
}
fn default_heartbeat_interval_str() -> String {
    "30s".to_owned()
}

impl Config {
    pub fn discovery_interval(&self) -> Duration {
        parse_duration_str(&self.discovery_interval).unwrap_or(Duration::from_secs(6 * 3600))
    }

    pub fn update_interval(&self) -> Duration {
        parse_duration_str(&self.update_interval).unwrap_or(Duration::from_secs(12 * 3600))
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration_str(&self.poll_interval).unwrap_or(Duration::from_secs(30))
    }

    pub fn config_poll_interval(&self) -> Duration {
        parse_duration_str(&self.config_poll_interval).unwrap_or(Duration::from_secs(5 * 60))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        parse_duration_str(&self.heartbeat_interval).unwrap_or(Duration::from_secs(30))
    }

    /// At least one source OR a gateway address; `listen_addr` non-empty.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.listen_addr.is_empty() {
            return Err(SyncError::ConfigInvalid { reason: "listen_addr must not be empty".to_owned() });
        }
        if self.sources.is_empty() && self.gateway_addr.is_none() {
            return Err(SyncError::ConfigInvalid {
                reason: "at least one source or a gateway address is required".to_owned(),
            });
        }
        for source in self.sources.values() {
            source.validate(self.tenant_scope)?;
        }
        Ok(())
    }
}
