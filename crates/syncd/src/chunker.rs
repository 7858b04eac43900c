// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Results chunker: splits a tenant's device list into size-bounded JSON
//! frames suitable for a single `stream_status` message, so the gateway
//! transport never has to buffer an unbounded payload in memory.

use serde::Serialize;

use crate::device::DeviceUpdate;

/// Default ceiling on the serialized size of a single chunk's device array,
/// chosen to stay well under typical gRPC/HTTP message-size limits.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 3 * 1024 * 1024;

/// One framed slice of a larger results push.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsChunk {
    pub sequence: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub is_final: bool,
    pub devices: Vec<DeviceUpdate>,
}

/// Splits `devices` into chunks whose serialized device array stays at or
/// under `max_chunk_size` bytes, in input order. A single record larger than
/// `max_chunk_size` still gets its own chunk rather than being dropped or
/// split — the limit is best-effort packing, not a hard per-record cap. An
/// empty `devices` input produces exactly one empty, final chunk so the
/// gateway always sees at least one frame per sequence.
pub fn chunk_devices(
    sequence: &str,
    devices: Vec<DeviceUpdate>,
    max_chunk_size: usize,
) -> Vec<ResultsChunk> {
    let mut groups: Vec<Vec<DeviceUpdate>> = Vec::new();
    let mut current: Vec<DeviceUpdate> = Vec::new();
    let mut current_size: usize = 2; // "[]"

    for device in devices {
        let device_size = serde_json::to_vec(&device).map(|v| v.len() + 1).unwrap_or(0);
        let would_overflow = !current.is_empty() && current_size + device_size > max_chunk_size;
        if would_overflow {
            groups.push(std::mem::take(&mut current));
            current_size = 2;
        }
        current_size += device_size;
        current.push(device);
    }
    groups.push(current);

    let total_chunks = groups.len() as u32;
    groups
        .into_iter()
        .enumerate()
        .map(|(index, devices)| ResultsChunk {
            sequence: sequence.to_owned(),
            chunk_index: index as u32,
            total_chunks,
            is_final: index as u32 + 1 == total_chunks,
            devices,
        })
        .collect()
}
