use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session configuration — the gateway's own identity plus lifecycle rules
/// applied to every `agent:<agent_id>:<suffix>` session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Unique ID for this gateway instance.
    #[serde(default = "d_agent_id")]
    pub agent_id: String,

    /// Session lifecycle rules (resets, idle timeouts).
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            agent_id: d_agent_id(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

/// Session lifecycle rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Daily reset hour (0–23, local gateway time). `None` disables daily reset.
    #[serde(default)]
    pub daily_reset_hour: Option<u8>,

    /// Idle timeout in minutes. If the last message was more than this many
    /// minutes ago, the session is reset on the next submitted run.
    #[serde(default)]
    pub idle_minutes: Option<u32>,

    /// Per-agent overrides, keyed by agent id.
    #[serde(default)]
    pub reset_by_agent: HashMap<String, ResetOverride>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            daily_reset_hour: Some(4),
            idle_minutes: None,
            reset_by_agent: HashMap::new(),
        }
    }
}

/// Override fields for a per-agent lifecycle rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetOverride {
    pub daily_reset_hour: Option<u8>,
    pub idle_minutes: Option<u32>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_agent_id() -> String {
    "warden".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifecycle_resets_daily_at_4am() {
        let lifecycle = LifecycleConfig::default();
        assert_eq!(lifecycle.daily_reset_hour, Some(4));
        assert_eq!(lifecycle.idle_minutes, None);
    }
}
