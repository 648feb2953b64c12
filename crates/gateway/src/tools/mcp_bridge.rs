//! Bridges an [`wd_mcp_client::McpManager`]-managed server into the tool
//! registry: one [`McpBridgeTool`] per remote tool, optionally named with a
//! `"<prefix>__<name>"` prefix so tools from different servers can't
//! collide. Connection state is tracked by the manager's own per-server
//! alive check; a disconnected server surfaces as an immediate tool error
//! rather than hanging on a dead transport.

use async_trait::async_trait;
use serde_json::Value;
use wd_domain::tool::ToolDefinition;
use wd_mcp_client::{McpManager, McpToolDef};

use crate::state::AppState;
use crate::tools::{Tool, ToolCallContext};

pub struct McpBridgeTool {
    server_id: String,
    remote_name: String,
    exposed_name: String,
    def: McpToolDef,
}

impl McpBridgeTool {
    pub fn new(server_id: &str, def: McpToolDef, prefix: Option<&str>) -> Self {
        let exposed_name = match prefix {
            Some(p) => format!("{p}__{}", def.name),
            None => def.name.clone(),
        };
        Self { server_id: server_id.to_string(), remote_name: def.name.clone(), exposed_name, def }
    }

    /// Build one bridge tool per tool advertised by every alive server
    /// currently registered on `manager`.
    pub fn from_manager(manager: &McpManager, prefix: Option<&str>) -> Vec<Self> {
        manager
            .list_tools()
            .into_iter()
            .map(|(server_id, def)| Self::new(server_id, def.clone(), prefix))
            .collect()
    }
}

#[async_trait]
impl Tool for McpBridgeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.exposed_name.clone(),
            description: self.def.description.clone(),
            parameters: self.def.input_schema.clone(),
        }
    }

    async fn call(&self, state: &AppState, _ctx: &ToolCallContext, args: Value) -> (String, bool) {
        match state.mcp.call_tool(&self.server_id, &self.remote_name, args).await {
            Ok(result) => {
                let mut text = String::new();
                for content in &result.content {
                    if content.content_type == "text" {
                        text.push_str(&content.text);
                    } else {
                        text.push_str(&format!("[non-text content: {}]", content.content_type));
                    }
                }
                (text, result.is_error)
            }
            Err(e) => (format!("mcp server {} unavailable: {e}", self.server_id), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_mcp_client::McpToolDef;

    fn def() -> McpToolDef {
        McpToolDef { name: "read_file".into(), description: "read".into(), input_schema: serde_json::json!({}) }
    }

    #[test]
    fn exposed_name_applies_prefix() {
        let tool = McpBridgeTool::new("filesystem", def(), Some("mcp"));
        assert_eq!(tool.exposed_name, "mcp__read_file");
    }

    #[test]
    fn exposed_name_without_prefix_is_bare() {
        let tool = McpBridgeTool::new("filesystem", def(), None);
        assert_eq!(tool.exposed_name, "read_file");
    }
}
