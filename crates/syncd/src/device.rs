// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The normalized device-update record produced by adapters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single normalized device record produced by a source adapter during a
/// discovery cycle.
///
/// `ip` may be empty when the device is identified by other means (such
/// records bypass the network blacklist and are retained verbatim).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub device_id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hostname: Option<String>,
    pub source: String,
    pub agent_id: String,
    pub poller_id: String,
    pub is_available: bool,
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DeviceUpdate {
    /// True when this record carries no IP and therefore bypasses the
    /// network blacklist unconditionally.
    pub fn has_no_ip(&self) -> bool {
        self.ip.is_empty()
    }
}
