use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scheduler::{DropPolicy, SessionQueueMode};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lane capacities and the default session-queue behavior. All scheduling
/// is process-local — there is no cross-instance coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Named lanes and their worker-permit counts. A lane not listed here
    /// falls back to `default_lane_capacity`.
    #[serde(default)]
    pub lanes: HashMap<String, usize>,
    #[serde(default = "d_default_lane_capacity")]
    pub default_lane_capacity: usize,
    #[serde(default)]
    pub session_queue: SessionQueueConfig,
    #[serde(default)]
    pub announce: AnnounceConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lanes: HashMap::new(),
            default_lane_capacity: d_default_lane_capacity(),
            session_queue: SessionQueueConfig::default(),
            announce: AnnounceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQueueConfig {
    #[serde(default = "d_queue_mode")]
    pub mode: SessionQueueMode,
    #[serde(default = "d_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "d_drop_policy")]
    pub drop_policy: DropPolicy,
    /// Minimum gap between two submissions to the same session before the
    /// second is treated as a fresh submission rather than a coalesce
    /// candidate.
    #[serde(default = "d_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SessionQueueConfig {
    fn default() -> Self {
        Self {
            mode: d_queue_mode(),
            capacity: d_queue_capacity(),
            drop_policy: d_drop_policy(),
            debounce_ms: d_debounce_ms(),
        }
    }
}

/// Debounce/cap parameters for the sub-agent announce queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceConfig {
    #[serde(default = "d_announce_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "d_announce_cap")]
    pub cap: usize,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: d_announce_debounce_ms(),
            cap: d_announce_cap(),
        }
    }
}

fn d_default_lane_capacity() -> usize {
    4
}
fn d_queue_mode() -> SessionQueueMode {
    SessionQueueMode::Fifo
}
fn d_queue_capacity() -> usize {
    16
}
fn d_drop_policy() -> DropPolicy {
    DropPolicy::Reject
}
fn d_debounce_ms() -> u64 {
    250
}
fn d_announce_debounce_ms() -> u64 {
    1_000
}
fn d_announce_cap() -> usize {
    20
}
