//! Tools API endpoints (exec / process / invoke).
//!
//! - `POST /v1/tools/exec`    — spawn a command (foreground or background)
//! - `POST /v1/tools/process` — manage background process sessions
//! - `POST /v1/tools/invoke`  — generic tool dispatch (dashboard "Tool Ping")

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use wd_tools::exec::{self, ExecRequest};
use wd_tools::process::{self, ProcessRequest};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/exec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn exec_tool(
    State(state): State<AppState>,
    Json(req): Json<ExecRequest>,
) -> impl IntoResponse {
    if state.denied_command_set.is_match(&req.command) {
        tracing::warn!(command = %req.command, "exec blocked by denied_patterns");
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "command blocked by security policy",
            })),
        )
            .into_response();
    }

    // Direct API/dashboard access is unscoped (admin visibility), unlike the
    // agent-loop `exec` tool which stamps the calling session's key.
    let resp = exec::exec(&state.processes, req, None).await;
    Json(serde_json::to_value(resp).unwrap_or_default()).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/process
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn process_tool(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> impl IntoResponse {
    let resp = process::handle_process(&state.processes, req, None).await;
    Json(serde_json::to_value(resp).unwrap_or_default())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/invoke
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request body for generic tool invocation.
#[derive(Debug, Deserialize)]
pub struct ToolInvokeRequest {
    /// Tool name (e.g. `"exec"`, `"memory.search"`).
    pub tool: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Optional session key for provenance / rate-limiting.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Optional timeout in milliseconds (default 30_000, max 120_000).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Generic tool dispatch endpoint — the dashboard "Tool Ping" workhorse.
/// Routes straight through the same [`crate::tools::ToolRegistry`] the
/// agent loop uses, with no agent-scoped tool policy (admin callers see
/// every registered tool).
///
/// Always returns 200 with `ok: true/false` in the body (tool errors are
/// not HTTP errors). Returns 504 only when the call itself times out.
pub async fn invoke_tool(
    State(state): State<AppState>,
    Json(req): Json<ToolInvokeRequest>,
) -> impl IntoResponse {
    let start = std::time::Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let timeout = Duration::from_millis(req.timeout_ms.unwrap_or(30_000).min(120_000));

    let ctx = crate::tools::ToolCallContext {
        run_id: request_id.clone(),
        session_key: req.session_key.clone().unwrap_or_default(),
        agent_id: None,
        channel: None,
        chat_id: None,
        peer_kind: None,
        sandbox_key: None,
    };

    let dispatch = state.tools.dispatch(&state, &ctx, &req.tool, req.args.clone(), None);

    let outcome = match tokio::time::timeout(timeout, dispatch).await {
        Ok(Ok((content, is_error))) => Ok((content, is_error)),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("tool invoke timed out after {}ms", timeout.as_millis())),
    };

    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok((content, false)) => {
            let result: serde_json::Value =
                serde_json::from_str(&content).unwrap_or(serde_json::Value::String(content));
            Json(serde_json::json!({
                "request_id": request_id,
                "ok": true,
                "result": result,
                "duration_ms": duration_ms,
            }))
            .into_response()
        }
        Ok((content, true)) | Err(content) => Json(serde_json::json!({
            "request_id": request_id,
            "ok": false,
            "error": { "message": content },
            "duration_ms": duration_ms,
        }))
        .into_response(),
    }
}
