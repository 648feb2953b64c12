//! Skill discovery and rendering for Warden agents.
//!
//! A skill is a directory describing a capability an agent can be told
//! about: either a `skill.toml` manifest (optionally enriched with a
//! `SKILL.md`), or a `SKILL.md`-only directory whose YAML frontmatter is
//! parsed directly. The registry scans the skills root, tracks readiness
//! (missing binaries, unsupported platform) and renders a prompt-ready
//! index for the agents that reference it.

pub mod aliases;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod types;

pub use aliases::ToolAliasMap;
pub use registry::{ReadinessSummary, SkillsRegistry};
pub use types::{RiskTier, SkillEntry};
