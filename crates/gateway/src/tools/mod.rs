//! Capability set: a name-to-tool map with per-call context injection, a
//! sliding-window rate limiter, credential scrubbing, and two loaders that
//! fill the map beyond the built-ins — a JSON-backed dynamic tool store and
//! an MCP bridge.
//!
//! Built around the same keyed-registry idiom used elsewhere in this crate
//! (`ProviderRegistry`, `SkillsRegistry`, `AgentRouter`):
//! `RwLock<HashMap<String, Arc<dyn Tool>>>`, read-biased since registration
//! happens at startup and (for dynamic/bridged tools) on reload, while calls
//! only read.

pub mod builtin;
mod dynamic;
mod mcp_bridge;
mod rate_limit;
pub mod web_fetch;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use wd_domain::config::ToolPolicy;
use wd_domain::tool::ToolDefinition;

use crate::state::AppState;

pub use dynamic::{DynamicToolLoader, DynamicToolSpec};
pub use mcp_bridge::McpBridgeTool;
pub use rate_limit::RateLimiter;

/// Per-call values injected by the registry before a tool runs. Immutable
/// for the duration of one invocation — tool instances themselves must be
/// concurrency-safe since the same `Arc<dyn Tool>` is shared across calls.
#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    pub run_id: String,
    pub session_key: String,
    pub agent_id: Option<String>,
    pub channel: Option<String>,
    pub chat_id: Option<String>,
    pub peer_kind: Option<String>,
    pub sandbox_key: Option<String>,
}

/// One capability exposed to the agent loop. `call` returns `(output,
/// is_error)`; the registry is responsible for scrubbing credentials from
/// the output before it reaches the LLM or the user.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool);
}

/// Error returned by [`ToolRegistry::dispatch`] before a tool ever runs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolDispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("rate limit exceeded for tool {tool}: retry after the window resets")]
    RateLimited { tool: String },
}

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    rate_limiter: Option<RateLimiter>,
    credential_patterns: Vec<Regex>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            rate_limiter: None,
            credential_patterns: credential_scrub_patterns(),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.write().insert(name, tool);
    }

    /// Replace every tool whose name starts with `prefix`-dash — used when
    /// reloading a dynamic-tool or MCP-bridge set without disturbing
    /// built-ins registered under other names.
    pub fn replace_prefixed(&self, prefix: &str, fresh: Vec<Arc<dyn Tool>>) {
        let mut tools = self.tools.write();
        tools.retain(|name, _| !name.starts_with(prefix));
        for tool in fresh {
            tools.insert(tool.definition().name.clone(), tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.read().values().map(|t| t.definition()).collect()
    }

    /// Definitions visible to an agent under `policy`. `None` means no
    /// policy is configured for this agent — every registered tool is
    /// visible.
    pub fn definitions_for(&self, policy: Option<&ToolPolicy>) -> Vec<ToolDefinition> {
        let tools = self.tools.read();
        match policy {
            Some(policy) => tools
                .iter()
                .filter(|(name, _)| policy.allows(name))
                .map(|(_, t)| t.definition())
                .collect(),
            None => tools.values().map(|t| t.definition()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// The six-step per-call procedure: unknown-tool error, context
    /// injection (already folded into `ctx` by the caller), rate-limit
    /// check, invocation, credential scrubbing, return.
    pub async fn dispatch(
        &self,
        state: &AppState,
        ctx: &ToolCallContext,
        tool_name: &str,
        args: Value,
        policy: Option<&ToolPolicy>,
    ) -> Result<(String, bool), ToolDispatchError> {
        if let Some(policy) = policy {
            if !policy.allows(tool_name) {
                return Err(ToolDispatchError::UnknownTool(tool_name.to_string()));
            }
        }

        let tool = self
            .get(tool_name)
            .ok_or_else(|| ToolDispatchError::UnknownTool(tool_name.to_string()))?;

        if !ctx.session_key.is_empty() {
            if let Some(limiter) = &self.rate_limiter {
                if !limiter.check(&format!("{}:{}", ctx.session_key, tool_name)) {
                    return Err(ToolDispatchError::RateLimited { tool: tool_name.to_string() });
                }
            }
        }

        let (output, is_error) = tool.call(state, ctx, args).await;
        Ok((self.scrub(&output), is_error))
    }

    fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in &self.credential_patterns {
            out = pattern.replace_all(&out, "[REDACTED]").into_owned();
        }
        out
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed credential-scrub patterns: OpenAI-style keys, Anthropic-style keys,
/// GitHub personal tokens across variants, AWS access keys, and generic
/// `api_key / token / secret / password / bearer / authorization = VALUE`
/// assignments. Kept separate from [`wd_providers::registry`]'s own
/// masking helper, which exists to sanitize provider init-error messages —
/// a distinct concern with its own lifetime, even though the idiom (mask
/// anything that looks like a long opaque credential) is the same one.
fn credential_scrub_patterns() -> Vec<Regex> {
    [
        r"sk-[A-Za-z0-9]{20,}",
        r"sk-ant-[A-Za-z0-9\-_]{20,}",
        r"gh[pousr]_[A-Za-z0-9]{20,}",
        r"AKIA[0-9A-Z]{16}",
        r"(?i)(api[_-]?key|token|secret|password|bearer|authorization)\s*[=:]\s*[\x22']?[A-Za-z0-9\-_./+]{8,}[\x22']?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static credential-scrub pattern compiles"))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition { name: "echo".into(), description: "echo".into(), parameters: serde_json::json!({}) }
        }

        async fn call(&self, _state: &AppState, _ctx: &ToolCallContext, args: Value) -> (String, bool) {
            (args.to_string(), false)
        }
    }

    #[test]
    fn unknown_tool_dispatch_fails_before_any_rate_check() {
        let registry = ToolRegistry::new();
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn replace_prefixed_only_touches_matching_names() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.replace_prefixed("mcp__", vec![]);
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn scrub_redacts_openai_style_key() {
        let registry = ToolRegistry::new();
        let scrubbed = registry.scrub("leaked sk-abcdefghijklmnopqrstuvwx in output");
        assert!(scrubbed.contains("[REDACTED]"));
        assert!(!scrubbed.contains("abcdefghijklmnopqrstuvwx"));
    }

    #[test]
    fn scrub_redacts_generic_assignment() {
        let registry = ToolRegistry::new();
        let scrubbed = registry.scrub("api_key=abcd1234efgh5678ijkl");
        assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn scrub_leaves_ordinary_text_untouched() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.scrub("hello world"), "hello world");
    }

    #[test]
    fn definitions_for_filters_by_policy() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let policy = ToolPolicy { allow: vec![], deny: vec!["echo".into()] };
        assert!(registry.definitions_for(Some(&policy)).is_empty());
        assert_eq!(registry.definitions_for(None).len(), 1);
    }
}
