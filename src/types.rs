use serde::{Deserialize, Serialize};

/// Outcome of a single TCP connect probe. Immutable once produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: u16,
    pub open: bool,
    pub elapsed_ms: u64,
}

/// Live progress notification emitted once per completed probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed: u64,
    pub total: u64,
    pub current_port: u16,
}
