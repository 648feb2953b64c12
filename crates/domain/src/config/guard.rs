use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the pattern-based scan applied to inbound task text
/// and tool results before they reach the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "d_action")]
    pub action: GuardAction,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            action: GuardAction::Warn,
        }
    }
}

/// What the guard does when a pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuardAction {
    Off,
    Log,
    #[default]
    Warn,
    Block,
}

/// An unrecognized action string falls back to `Warn` rather than failing
/// config load — a typo in this field should not leave the guard disabled.
impl<'de> Deserialize<'de> for GuardAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "off" => GuardAction::Off,
            "log" => GuardAction::Log,
            "block" => GuardAction::Block,
            _ => GuardAction::Warn,
        })
    }
}

fn d_action() -> GuardAction {
    GuardAction::Warn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_falls_back_to_warn() {
        let action: GuardAction = serde_json::from_str("\"nonsense\"").unwrap();
        assert_eq!(action, GuardAction::Warn);
    }

    #[test]
    fn block_parses_explicitly() {
        let action: GuardAction = serde_json::from_str("\"block\"").unwrap();
        assert_eq!(action, GuardAction::Block);
    }
}
