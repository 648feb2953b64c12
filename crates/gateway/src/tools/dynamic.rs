//! Dynamic tools: definitions loaded from a backing JSON store (global or
//! per-agent) rather than compiled in. Per-call command rendering replaces
//! `{{.key}}` placeholders with shell-escaped argument values, vets the
//! rendered command against a deny-pattern list, then runs it as a
//! subprocess through [`wd_tools`]'s exec machinery (the same timeout,
//! working-directory, and environment handling the `exec` built-in tool
//! uses for ad hoc commands).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wd_domain::tool::ToolDefinition;
use wd_tools::exec::{exec, ExecRequest};
use wd_tools::manager::ProcessStatus;

use crate::state::AppState;
use crate::tools::{Tool, ToolCallContext};

/// One dynamic tool's definition, as stored in the backing JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    /// Command template; `{{.key}}` is replaced with the shell-escaped
    /// value of `key` from the call arguments.
    pub command_template: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

fn default_timeout_sec() -> u64 {
    30
}

/// Loads [`DynamicToolSpec`]s from a JSON array file and vets rendered
/// commands against a deny-pattern list before they're allowed to spawn a
/// subprocess.
pub struct DynamicToolLoader {
    deny: RegexSet,
}

impl DynamicToolLoader {
    pub fn new(deny_patterns: &[String]) -> Result<Self, regex::Error> {
        Ok(Self { deny: RegexSet::new(deny_patterns)? })
    }

    pub fn load_from_str(&self, json: &str) -> serde_json::Result<Vec<DynamicToolSpec>> {
        serde_json::from_str(json)
    }

    pub fn build_tools(&self, specs: Vec<DynamicToolSpec>) -> Vec<std::sync::Arc<dyn Tool>> {
        specs
            .into_iter()
            .map(|spec| std::sync::Arc::new(DynamicTool { spec, deny: self.deny.clone() }) as std::sync::Arc<dyn Tool>)
            .collect()
    }
}

struct DynamicTool {
    spec: DynamicToolSpec,
    deny: RegexSet,
}

/// Single-quote shell escaping: `'` becomes `'\''`, and the whole value is
/// wrapped in single quotes.
fn shell_escape(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn render_template(template: &str, args: &Value) -> String {
    let mut rendered = template.to_string();
    if let Some(obj) = args.as_object() {
        for (key, value) in obj {
            let placeholder = format!("{{{{.{key}}}}}");
            let literal = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &shell_escape(&literal));
        }
    }
    rendered
}

#[async_trait]
impl Tool for DynamicTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            parameters: self.spec.parameters.clone(),
        }
    }

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let command = render_template(&self.spec.command_template, &args);

        if self.deny.is_match(&command) {
            return (
                serde_json::json!({ "error": "CommandDenied", "message": "rendered command matched a deny pattern" })
                    .to_string(),
                true,
            );
        }

        let req = ExecRequest {
            command,
            background: false,
            yield_ms: Some(self.spec.timeout_sec.saturating_mul(1000)),
            timeout_sec: Some(self.spec.timeout_sec),
            workdir: self.spec.workdir.clone(),
            env: self.spec.env.clone(),
        };

        let resp = exec(&state.processes, req, Some(ctx.session_key.clone())).await;
        let is_error = !matches!(resp.status, ProcessStatus::Finished);
        let mut output = resp.output.unwrap_or_default();
        if let Some(tail) = resp.tail {
            output.push_str(&tail);
        }
        if matches!(resp.status, ProcessStatus::TimedOut) {
            return (
                serde_json::json!({ "error": "DeadlineExceeded", "message": "dynamic tool command timed out" })
                    .to_string(),
                true,
            );
        }
        (output, is_error)
    }
}

/// Used by the rest of the crate to wait out a dynamic tool's configured
/// timeout in tests without importing `tokio::time` directly.
#[allow(dead_code)]
async fn sleep_for(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_escape_neutralizes_single_quotes() {
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
    }

    #[test]
    fn render_template_substitutes_and_escapes() {
        let args = serde_json::json!({ "path": "it's a path" });
        let rendered = render_template("cat {{.path}}", &args);
        assert_eq!(rendered, "cat 'it'\\''s a path'");
    }

    #[test]
    fn render_template_leaves_unmatched_placeholders() {
        let args = serde_json::json!({});
        let rendered = render_template("echo {{.missing}}", &args);
        assert_eq!(rendered, "echo {{.missing}}");
    }

    #[test]
    fn deny_pattern_blocks_rendered_command() {
        let loader = DynamicToolLoader::new(&["rm\\s+-rf".to_string()]).unwrap();
        assert!(loader.deny.is_match("rm -rf /"));
        assert!(!loader.deny.is_match("ls -la"));
    }

    #[test]
    fn load_from_str_parses_spec_array() {
        let loader = DynamicToolLoader::new(&[]).unwrap();
        let json = r#"[{"name":"greet","description":"d","parameters":{},"command_template":"echo {{.name}}"}]"#;
        let specs = loader.load_from_str(json).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].timeout_sec, 30);
    }
}
