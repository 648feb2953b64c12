use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run history
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Retention for the per-turn run history kept by the gateway's run store.
///
/// The in-memory ring and the on-disk JSONL are pruned together: whichever
/// bound is hit first wins, so a deployment that runs a handful of long
/// agents can raise `max_age_days` without also growing `max_in_memory`
/// past what the dashboard needs to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsConfig {
    /// Upper bound on runs held in the in-memory ring.
    #[serde(default = "d_max_in_memory")]
    pub max_in_memory: usize,
    /// Runs older than this are dropped from the JSONL log on the next
    /// `RunStore::new` rewrite, independent of how many runs are kept.
    #[serde(default = "d_max_age_days")]
    pub max_age_days: u64,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            max_in_memory: d_max_in_memory(),
            max_age_days: d_max_age_days(),
        }
    }
}

fn d_max_in_memory() -> usize {
    2_000
}
fn d_max_age_days() -> u64 {
    30
}
