//! Health, metrics, system info, config save, and restart endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

use super::guard::AdminGuard;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/health — lightweight health probe (public, no auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/openapi.json — OpenAPI 3.0 spec (public, no auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn openapi_spec() -> impl IntoResponse {
    use axum::http::header;

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Warden Gateway API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Warden gateway — agentic runtime with cron scheduling, multi-provider LLM routing, and tool dispatch."
        },
        "servers": [{ "url": "/", "description": "Current host" }],
        "security": [{ "BearerAuth": [] }],
        "components": {
            "securitySchemes": {
                "BearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "description": "WARDEN_API_TOKEN bearer token"
                }
            },
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": { "type": "string" }
                    }
                }
            }
        },
        "paths": {
            "/v1/health": {
                "get": {
                    "summary": "Health probe",
                    "tags": ["Admin"],
                    "security": [],
                    "responses": { "200": { "description": "Server is healthy" } }
                }
            },
            "/v1/chat": {
                "post": {
                    "summary": "Send a chat message (non-streaming)",
                    "tags": ["Chat"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["message"], "properties": { "message": { "type": "string" }, "session_key": { "type": "string" }, "model": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "Chat response" } }
                }
            },
            "/v1/chat/stream": {
                "post": {
                    "summary": "Send a chat message (SSE streaming)",
                    "tags": ["Chat"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["message"], "properties": { "message": { "type": "string" }, "session_key": { "type": "string" }, "model": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "SSE event stream" } }
                }
            },
            "/v1/sessions": {
                "get": {
                    "summary": "List all sessions",
                    "tags": ["Sessions"],
                    "responses": { "200": { "description": "Array of sessions" } }
                }
            },
            "/v1/sessions/resolve": {
                "post": {
                    "summary": "Resolve or create a session by key",
                    "tags": ["Sessions"],
                    "requestBody": { "required": false, "content": { "application/json": { "schema": { "type": "object", "properties": { "session_key": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "Session state" } }
                }
            },
            "/v1/sessions/reset": {
                "post": {
                    "summary": "Reset a session, starting a new session id",
                    "tags": ["Sessions"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["session_key"], "properties": { "session_key": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "Reset session state" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/schedules": {
                "get": {
                    "summary": "List all cron jobs",
                    "tags": ["Schedules"],
                    "responses": { "200": { "description": "Array of cron jobs" } }
                },
                "post": {
                    "summary": "Create a new cron job",
                    "tags": ["Schedules"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["name", "agent_id", "task", "schedule"], "properties": { "name": { "type": "string" }, "enabled": { "type": "boolean", "default": true }, "agent_id": { "type": "string" }, "task": { "type": "string" }, "schedule": { "type": "object" }, "delete_after_run": { "type": "boolean", "default": false } } } } } },
                    "responses": { "201": { "description": "Created cron job" }, "400": { "description": "Validation error" } }
                }
            },
            "/v1/schedules/next": {
                "get": {
                    "summary": "Preview the next fire times for a cron expression",
                    "tags": ["Schedules"],
                    "parameters": [
                        { "name": "expr", "in": "query", "required": true, "schema": { "type": "string" } },
                        { "name": "timezone", "in": "query", "schema": { "type": "string", "default": "UTC" } }
                    ],
                    "responses": { "200": { "description": "Next occurrences" }, "400": { "description": "Invalid expression or timezone" } }
                }
            },
            "/v1/schedules/{id}": {
                "get": {
                    "summary": "Get a cron job by ID",
                    "tags": ["Schedules"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Cron job" }, "404": { "description": "Not found" } }
                },
                "put": {
                    "summary": "Update a cron job",
                    "tags": ["Schedules"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Updated cron job" }, "404": { "description": "Not found" } }
                },
                "delete": {
                    "summary": "Delete a cron job",
                    "tags": ["Schedules"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Deleted" } }
                }
            },
            "/v1/schedules/{id}/runs": {
                "get": {
                    "summary": "List run-log entries for a cron job",
                    "tags": ["Schedules"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Run log" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/runs": {
                "get": {
                    "summary": "List runs with optional filters",
                    "tags": ["Runs"],
                    "parameters": [
                        { "name": "status", "in": "query", "schema": { "type": "string" } },
                        { "name": "session_key", "in": "query", "schema": { "type": "string" } },
                        { "name": "agent_id", "in": "query", "schema": { "type": "string" } },
                        { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 50 } },
                        { "name": "offset", "in": "query", "schema": { "type": "integer", "default": 0 } }
                    ],
                    "responses": { "200": { "description": "Paginated run list" } }
                }
            },
            "/v1/runs/{id}": {
                "get": {
                    "summary": "Get run by ID",
                    "tags": ["Runs"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }],
                    "responses": { "200": { "description": "Run object" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/runs/{id}/nodes": {
                "get": {
                    "summary": "Get execution nodes (LLM calls, tool calls) for a run",
                    "tags": ["Runs"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }],
                    "responses": { "200": { "description": "Node list" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/runs/{id}/events": {
                "get": {
                    "summary": "SSE stream of live run events",
                    "tags": ["Runs"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }],
                    "responses": { "200": { "description": "text/event-stream of run events" } }
                }
            },
            "/v1/memory/search": {
                "post": {
                    "summary": "Search long-term memory",
                    "tags": ["Memory"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["query"], "properties": { "query": { "type": "string" }, "limit": { "type": "integer" } } } } } },
                    "responses": { "200": { "description": "Search results" } }
                }
            },
            "/v1/memory/ingest": {
                "post": {
                    "summary": "Ingest content into memory",
                    "tags": ["Memory"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["content"], "properties": { "content": { "type": "string" }, "source": { "type": "string" }, "metadata": { "type": "object" } } } } } },
                    "responses": { "200": { "description": "Ingested" } }
                }
            },
            "/v1/memory/about": {
                "get": {
                    "summary": "Fetch the recalled-facts summary for the configured user",
                    "tags": ["Memory"],
                    "responses": { "200": { "description": "User facts summary" } }
                }
            },
            "/v1/memory/health": {
                "get": {
                    "summary": "Memory engine health",
                    "tags": ["Memory"],
                    "responses": { "200": { "description": "Health status" } }
                }
            },
            "/v1/memory/{id}": {
                "put": {
                    "summary": "Update a memory chunk",
                    "tags": ["Memory"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Updated" }, "404": { "description": "Not found" } }
                },
                "delete": {
                    "summary": "Delete a memory chunk",
                    "tags": ["Memory"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Deleted" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/skills": {
                "get": {
                    "summary": "List available skills",
                    "tags": ["Skills"],
                    "responses": { "200": { "description": "Array of skill descriptors" } }
                }
            },
            "/v1/skills/{name}/doc": {
                "get": {
                    "summary": "Read a skill's documentation",
                    "tags": ["Skills"],
                    "parameters": [{ "name": "name", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Skill doc" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/skills/{name}/resource": {
                "get": {
                    "summary": "Read a skill resource file",
                    "tags": ["Skills"],
                    "parameters": [{ "name": "name", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "Resource content" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/skills/reload": {
                "post": {
                    "summary": "Reload the skills registry from disk",
                    "tags": ["Skills"],
                    "responses": { "200": { "description": "Reload summary" } }
                }
            },
            "/v1/models": {
                "get": {
                    "summary": "List configured LLM providers",
                    "tags": ["Providers"],
                    "responses": { "200": { "description": "Provider list" } }
                }
            },
            "/v1/models/roles": {
                "get": {
                    "summary": "List role -> provider/model mappings",
                    "tags": ["Providers"],
                    "responses": { "200": { "description": "Role map" } }
                }
            },
            "/v1/models/readiness": {
                "get": {
                    "summary": "Provider readiness check",
                    "tags": ["Providers"],
                    "security": [],
                    "responses": { "200": { "description": "Readiness status" } }
                }
            },
            "/v1/tools/exec": {
                "post": {
                    "summary": "Run the sandboxed shell-exec tool directly",
                    "tags": ["Tools"],
                    "responses": { "200": { "description": "Tool execution result" } }
                }
            },
            "/v1/tools/process": {
                "post": {
                    "summary": "Manage a long-running background process",
                    "tags": ["Tools"],
                    "responses": { "200": { "description": "Process status" } }
                }
            },
            "/v1/tools/invoke": {
                "post": {
                    "summary": "Invoke an arbitrary registered tool by name",
                    "tags": ["Tools"],
                    "responses": { "200": { "description": "Tool result" } }
                }
            },
            "/v1/metrics": {
                "get": {
                    "summary": "Runtime metrics",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "Metrics object" } }
                }
            },
            "/v1/admin/info": {
                "get": {
                    "summary": "System info (admin-only)",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "System info" }, "401": { "description": "Unauthorized" } }
                }
            },
            "/v1/admin/config": {
                "put": {
                    "summary": "Persist the resolved configuration back to disk (admin-only)",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "Saved" }, "401": { "description": "Unauthorized" } }
                }
            },
            "/v1/admin/restart": {
                "post": {
                    "summary": "Signal a graceful restart (admin-only)",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "Restart signalled" }, "401": { "description": "Unauthorized" } }
                }
            },
            "/v1/admin/workspace/files": {
                "get": {
                    "summary": "List workspace context files and their presence/hash (admin-only)",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "File list" }, "401": { "description": "Unauthorized" } }
                }
            },
            "/v1/admin/skills": {
                "get": {
                    "summary": "List skills with full manifest detail (admin-only)",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "Detailed skill list" }, "401": { "description": "Unauthorized" } }
                }
            }
        },
        "tags": [
            { "name": "Chat", "description": "Core chat/turn execution" },
            { "name": "Sessions", "description": "Session lifecycle management" },
            { "name": "Schedules", "description": "Cron-based schedule management" },
            { "name": "Runs", "description": "Run execution tracking" },
            { "name": "Memory", "description": "Long-term memory (hybrid lexical + vector search)" },
            { "name": "Skills", "description": "Skill registry" },
            { "name": "Providers", "description": "LLM provider management" },
            { "name": "Tools", "description": "Direct tool execution" },
            { "name": "Admin", "description": "Administrative and system endpoints" }
        ]
    });

    ([(header::CONTENT_TYPE, "application/json")], Json(spec))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/metrics — runtime metrics (protected, no admin token check)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.cron.list();
    let active = jobs.iter().filter(|j| j.enabled).count();
    let paused = jobs.iter().filter(|j| !j.enabled).count();
    let errored = jobs.iter().filter(|j| matches!(j.state.last_status, Some(wd_domain::cron::RunStatus::Error))).count();

    let (_, run_total) = state.run_store.list(None, None, None, 0, 0);
    let sessions = state.sessions.list();

    Json(serde_json::json!({
        "cron_jobs": {
            "total": jobs.len(),
            "active": active,
            "paused": paused,
            "errored": errored,
        },
        "runs": {
            "total": run_total,
        },
        "sessions": {
            "total": sessions.len(),
        },
        "tools": {
            "registered": state.tools.len(),
        },
        "providers": state.llm.len(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/admin/info — system info (admin auth required)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn system_info(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let admin_token_set = state.admin_token_hash.is_some();

    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "server": {
            "host": state.config.server.host,
            "port": state.config.server.port,
        },
        "admin_token_set": admin_token_set,
        "workspace_path": state.config.workspace.path.display().to_string(),
        "skills_path": state.config.skills.path.display().to_string(),
        "provider_count": state.llm.len(),
        "agent_count": state.router.cached_ids().len(),
        "session_count": state.sessions.list().len(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v1/admin/config — save config.toml to disk
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn save_config(
    _guard: AdminGuard,
    State(state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    // Validate the TOML parses as a Config before saving.
    if let Err(e) = toml::from_str::<wd_domain::config::Config>(&body) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("invalid TOML: {e}"),
            })),
        )
            .into_response();
    }

    let config_path = &state.config_path;

    // Back up existing file with timestamp.
    if config_path.exists() {
        let ts = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let backup_name = format!(
            "{}.bak.{ts}",
            config_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
        );
        let backup = config_path.with_file_name(backup_name);
        if let Err(e) = tokio::fs::copy(config_path, &backup).await {
            tracing::warn!(error = %e, "failed to back up config");
        }
    }

    // Atomic write: tmp file + rename.
    let tmp_path = config_path.with_extension("toml.tmp");
    if let Err(e) = tokio::fs::write(&tmp_path, &body).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("write failed: {e}") })),
        )
            .into_response();
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tokio::fs::set_permissions(
            &tmp_path,
            std::fs::Permissions::from_mode(0o600),
        )
        .await;
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, config_path).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("rename failed: {e}") })),
        )
            .into_response();
    }

    tracing::info!(path = %config_path.display(), "config saved via API");

    Json(serde_json::json!({
        "saved": true,
        "path": config_path.display().to_string(),
        "note": "restart the server for changes to take effect",
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/admin/restart — trigger graceful server shutdown
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn restart(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::info!("restart requested via API");
    state.shutdown_tx.notify_one();

    Json(serde_json::json!({
        "restarting": true,
        "note": "server will shut down gracefully — use a process manager (systemd) to auto-restart",
    }))
}
