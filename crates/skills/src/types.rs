use serde::{Deserialize, Serialize};
use std::fmt;

use crate::manifest::{ReadinessStatus, SkillManifest, SkillReadiness};

/// Risk tier for a skill — controls permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Pure,
    Io,
    Net,
    Admin,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Pure => write!(f, "PURE"),
            RiskTier::Io => write!(f, "IO"),
            RiskTier::Net => write!(f, "NET"),
            RiskTier::Admin => write!(f, "ADMIN"),
        }
    }
}

/// A skill definition loaded from `skill.toml` or a `SKILL.md`-only pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub description: String,
    pub location: String,
    pub risk: RiskTier,
    #[serde(default)]
    pub inputs: Option<String>,
    #[serde(default)]
    pub outputs: Option<String>,
    #[serde(default)]
    pub permission_scope: Option<String>,
    /// Parsed SKILL.md frontmatter, if present.
    #[serde(default)]
    pub manifest: Option<SkillManifest>,
    /// Readiness check against the current system (missing bins/env, platform).
    #[serde(skip)]
    pub readiness: Option<SkillReadiness>,
}

impl SkillEntry {
    pub fn render_index_line(&self) -> String {
        let mut line = format!("- {}: {}", self.name, self.description);
        line.push_str(&format!(" location={}", self.location));
        line.push_str(&format!(" risk={}", self.risk));
        if let Some(ref inputs) = self.inputs {
            line.push_str(&format!(" inputs={inputs}"));
        }
        if let Some(ref outputs) = self.outputs {
            line.push_str(&format!(" outputs={outputs}"));
        }
        line
    }

    /// Whether this skill is usable on the current system. A skill with no
    /// readiness check (e.g. legacy `skill.toml` without a SKILL.md) is
    /// assumed ready.
    pub fn is_ready(&self) -> bool {
        self.readiness
            .as_ref()
            .map(|r| r.status == ReadinessStatus::Ready)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SkillEntry {
        SkillEntry {
            name: "git-helper".into(),
            description: "Runs git commands".into(),
            location: "skills/git-helper".into(),
            risk: RiskTier::Io,
            inputs: None,
            outputs: None,
            permission_scope: None,
            manifest: None,
            readiness: None,
        }
    }

    #[test]
    fn no_readiness_check_is_ready() {
        assert!(entry().is_ready());
    }

    #[test]
    fn render_index_line_includes_risk() {
        let line = entry().render_index_line();
        assert!(line.contains("risk=IO"));
        assert!(line.contains("git-helper"));
    }
}
