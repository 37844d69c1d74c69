//! Queue state types for the job manager

use serde::Serialize;

/// Counters kept by the job manager
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// Jobs accepted into the queue
    pub submitted: u64,
    /// Named submissions dropped because the name was queued or running
    pub deduplicated: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Highest number of workers alive at once
    pub peak_workers: usize,
}

impl JobStats {
    /// Jobs that have finished, whatever the outcome
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

/// Snapshot of the manager's queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub active_workers: usize,
    pub queued: usize,
    /// Names currently queued or executing
    pub reserved: usize,
    pub stats: JobStats,
}

impl QueueState {
    /// No queued jobs and no live workers
    pub fn is_idle(&self) -> bool {
        self.active_workers == 0 && self.queued == 0
    }
}
