//! Turn-loop adapter over [`crate::tools::ToolRegistry`] — builds the tool
//! definitions exposed to the LLM for a given turn and dispatches tool
//! calls, applying the calling agent's [`ToolPolicy`] when present.

use serde_json::Value;

use wd_domain::config::ToolPolicy;
use wd_domain::tool::ToolDefinition;

use super::agent::AgentContext;
use crate::state::AppState;

/// Build the set of tool definitions exposed to the LLM for this turn.
///
/// Filtered through `tool_policy` when the turn is running as a sub-agent
/// with a restricted capability set.
pub fn build_tool_definitions(state: &AppState, tool_policy: Option<&ToolPolicy>) -> Vec<ToolDefinition> {
    state.tools.definitions_for(tool_policy)
}

/// Dispatch a single tool call through the registry. Returns
/// `(result_content, is_error)` — dispatch errors (unknown tool, rate
/// limited) are rendered as an error result rather than propagated, since
/// the turn loop always needs a tool-result message to append.
pub async fn dispatch_tool(
    state: &AppState,
    tool_name: &str,
    arguments: &Value,
    session_key: Option<&str>,
    agent_ctx: Option<&AgentContext>,
) -> (String, bool) {
    let ctx = crate::tools::ToolCallContext {
        run_id: uuid::Uuid::new_v4().to_string(),
        session_key: session_key.unwrap_or_default().to_string(),
        agent_id: agent_ctx.map(|ctx| ctx.agent_id.clone()),
        channel: None,
        chat_id: None,
        peer_kind: None,
        sandbox_key: None,
    };
    let policy = agent_ctx.map(|ctx| &ctx.tool_policy);

    match state.tools.dispatch(state, &ctx, tool_name, arguments.clone(), policy).await {
        Ok((content, is_error)) => (content, is_error),
        Err(e) => (e.to_string(), true),
    }
}
