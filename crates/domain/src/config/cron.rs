use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cron service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    #[serde(default = "d_tick_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "d_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "d_retry_max_ms")]
    pub retry_max_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Size of each job's bounded run-log ring buffer.
    #[serde(default = "d_run_log_capacity")]
    pub run_log_capacity: usize,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: d_tick_ms(),
            retry_base_ms: d_retry_base_ms(),
            retry_max_ms: d_retry_max_ms(),
            max_retries: d_max_retries(),
            run_log_capacity: d_run_log_capacity(),
        }
    }
}

fn d_tick_ms() -> u64 {
    1_000
}
fn d_retry_base_ms() -> u64 {
    5_000
}
fn d_retry_max_ms() -> u64 {
    300_000
}
fn d_max_retries() -> u32 {
    5
}
fn d_run_log_capacity() -> usize {
    200
}
