//! Session management API endpoints.
//!
//! These endpoints expose the gateway-owned session store directly: callers
//! resolve a session by an explicit key, list active sessions, or force a
//! reset. Lifecycle resets (daily, idle) are evaluated automatically on
//! resolve.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/sessions/resolve
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request body for session resolution.
#[derive(Debug, Deserialize)]
pub struct ResolveSessionBody {
    /// Explicit session key. If absent, the default "main" session for the
    /// configured agent ID is used.
    #[serde(default)]
    pub session_key: Option<String>,
}

/// Resolve (or create) a session by key.
///
/// Lifecycle resets (daily, idle) are evaluated before resolution, so a
/// stale session is reset rather than resumed.
pub async fn resolve_session(
    State(state): State<AppState>,
    Json(body): Json<ResolveSessionBody>,
) -> impl IntoResponse {
    let session_key = body
        .session_key
        .unwrap_or_else(|| format!("agent:{}:main", state.config.sessions.agent_id));

    if let Some(existing) = state.sessions.get(&session_key) {
        if let Some(reason) = state.lifecycle.should_reset(&existing, chrono::Utc::now()) {
            state.sessions.reset_session(&session_key, &reason.to_string());
        }
    }

    let (entry, is_new) = state
        .sessions
        .resolve_or_create(&session_key, &state.config.sessions.agent_id);

    if !is_new {
        state.sessions.touch(&session_key);
    }

    Json(serde_json::json!({
        "session_key": entry.session_key,
        "session_id": entry.session_id,
        "agent_id": entry.agent_id,
        "is_new": is_new,
        "created_at": entry.created_at.to_rfc3339(),
        "last_active_at": entry.last_active_at.to_rfc3339(),
        "message_count": entry.message_count,
        "compaction_count": entry.compaction_count,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// List all active sessions.
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/sessions/reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ResetSessionBody {
    pub session_key: String,
}

/// Manually reset a session (equivalent to `/new` or `/reset` commands).
pub async fn reset_session(
    State(state): State<AppState>,
    Json(body): Json<ResetSessionBody>,
) -> impl IntoResponse {
    match state.sessions.reset_session(&body.session_key, "manual reset") {
        Some(entry) => Json(serde_json::json!({
            "session_key": entry.session_key,
            "session_id": entry.session_id,
            "reset": true,
        }))
        .into_response(),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "session not found" })),
        )
            .into_response(),
    }
}
