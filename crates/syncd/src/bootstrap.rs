// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process bootstrap flags: where to load the static config from and which
//! gateway to bootstrap against. Full CLI/config-file parsing of the `Config`
//! body itself is out of scope; this only selects *where* to load it from.

use std::path::PathBuf;

/// Top-level process flags for the `syncd` binary.
#[derive(Debug, Clone, clap::Parser)]
pub struct BootstrapArgs {
    /// Path to the static JSON config file (see `crate::config::Config`).
    #[arg(long, env = "SYNCD_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Gateway address to bootstrap against, overriding the config file.
    #[arg(long, env = "SYNCD_GATEWAY_ADDR")]
    pub gateway_addr: Option<String>,

    /// Agent id presented during gateway enrollment.
    #[arg(long, env = "SYNCD_AGENT_ID")]
    pub agent_id: Option<String>,

    /// Listen address for the ingress surface (status/config RPC-equivalents).
    #[arg(long, default_value = "127.0.0.1:8170", env = "SYNCD_LISTEN_ADDR")]
    pub listen_addr: String,
}
