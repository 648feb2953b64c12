use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{AgentLimits, GuardAction, MemoryMode, ToolPolicy};

/// A configured agent: an identity, a tool policy, and a role → model map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub workspace_path: std::path::PathBuf,
    pub skills_path: std::path::PathBuf,
    pub policy: AgentPolicy,
}

/// The resolved policy an agent runs under — what it may call, which models
/// back which role, and the bounds it fans out sub-agents within.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPolicy {
    pub tool_policy: ToolPolicy,
    pub models: HashMap<String, String>,
    pub memory_mode: MemoryMode,
    pub limits: AgentLimits,
    pub compaction_enabled: bool,
    /// Context window budget in tokens, used by the pruning and compaction
    /// triggers to decide when a turn's message history is getting large.
    pub context_window: u32,
    /// Hard cap on tool-call iterations within a single turn before the
    /// loop is forced to stop and return whatever it has.
    pub max_tool_iterations: u32,
    /// What the input guard does when a scan on this agent's turns matches
    /// a prompt-injection pattern.
    pub injection_action: GuardAction,
}

impl Agent {
    /// Model configured for a given role (`"executor"`, `"planner"`, ...),
    /// if the agent has one.
    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        self.policy.models.get(role).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent {
            id: "researcher".into(),
            workspace_path: "/tmp/workspace".into(),
            skills_path: "/tmp/skills".into(),
            policy: AgentPolicy {
                tool_policy: ToolPolicy::default(),
                models: HashMap::from([("executor".to_string(), "gpt-4o".to_string())]),
                memory_mode: MemoryMode::default(),
                limits: AgentLimits::default(),
                compaction_enabled: true,
                context_window: 128_000,
                max_tool_iterations: 25,
                injection_action: GuardAction::default(),
            },
        }
    }

    #[test]
    fn model_for_role_resolves_configured_role() {
        assert_eq!(agent().model_for_role("executor"), Some("gpt-4o"));
    }

    #[test]
    fn model_for_role_missing_returns_none() {
        assert_eq!(agent().model_for_role("planner"), None);
    }
}
