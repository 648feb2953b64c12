use serde::{Deserialize, Serialize};

/// A named worker pool with a fixed number of concurrent permits. Runs are
/// assigned to a lane at submission time; the lane governs how many run at
/// once, not which ones are admitted (that's the session queue's job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub name: String,
    pub capacity: usize,
}

/// Point-in-time occupancy of a lane, for introspection/metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LaneStats {
    pub in_flight: usize,
    pub queued: usize,
    pub capacity: usize,
}

/// How a per-session queue behaves once more than one run targets the same
/// session concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionQueueMode {
    /// Queue every submission in order; each waits its turn.
    Fifo,
    /// Only the most recently submitted run is kept; superseded runs are
    /// dropped per `DropPolicy`.
    Latest,
}

/// What happens to a run that a session queue cannot admit (queue full, or
/// superseded under `Latest` mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    DropOldest,
    DropNewest,
    Reject,
}
