use serde_derive::{Deserialize, Serialize};

/// Compile-time request-size gate: a serialized request at or above this
/// many bytes is rejected with `raft_entry_too_large` before the store is
/// touched, mirroring the raft-log entry limit of a replicated node.
pub const MAX_REQUEST_SIZE: usize = 6 * 1024 * 1024;

const DEFAULT_SLOW_REQUEST_MS: u64 = 300;

/// Runtime-tunable server settings. Deserializable from the CLI's config
/// file, with every field defaulted so a missing file is never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Requests taking at least this long have their trace logged at
    /// warning level under the `server_warnings` target.
    pub slow_request_ms: Option<u64>,

    pub local_store_id: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config { slow_request_ms: Some(DEFAULT_SLOW_REQUEST_MS), local_store_id: Some(1) }
    }
}

impl Config {
    pub fn slow_request_threshold(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.slow_request_ms.unwrap_or(DEFAULT_SLOW_REQUEST_MS))
    }

    pub fn local_store_id(&self) -> u64 {
        self.local_store_id.unwrap_or(1)
    }
}
