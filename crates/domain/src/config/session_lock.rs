use serde::{Deserialize, Serialize};

/// Per-session turn concurrency. Only one turn runs per session at a time;
/// this bounds how many more may queue behind it before a new request is
/// rejected outright rather than waiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLockConfig {
    /// Turns allowed to queue behind the one currently running for a
    /// session. `0` means a busy session always rejects immediately.
    #[serde(default = "d_max_waiters")]
    pub max_waiters: usize,
}

impl Default for SessionLockConfig {
    fn default() -> Self {
        Self { max_waiters: d_max_waiters() }
    }
}

fn d_max_waiters() -> usize {
    1
}
