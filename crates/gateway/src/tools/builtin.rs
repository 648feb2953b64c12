//! Built-in tools as individual [`Tool`] implementations: `exec`,
//! `process`, `skill.read_doc`, `skill.read_resource`, `memory.search`,
//! `memory.ingest`, `agent.run`, `agent.list`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use wd_domain::memory::MemoryScope;
use wd_domain::tool::ToolDefinition;
use wd_memory::{hybrid_search, MemoryContextBuilder};
use wd_tools::exec::{exec, ExecRequest};
use wd_tools::manager::ProcessStatus;
use wd_tools::process::{handle_process, ProcessAction, ProcessRequest};

use crate::state::AppState;
use crate::subagent;
use crate::tools::{Tool, ToolCallContext};

pub struct ExecTool;

#[async_trait]
impl Tool for ExecTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "exec".into(),
            description: "Run a shell command. Returns output or a background session ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to execute" },
                    "background": { "type": "boolean", "description": "Run in background" },
                    "workdir": { "type": "string", "description": "Working directory" },
                    "timeout_sec": { "type": "integer", "description": "Hard timeout in seconds" }
                },
                "required": ["command"]
            }),
        }
    }

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let command = match args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ("missing required argument: command".into(), true),
        };

        let req = ExecRequest {
            command,
            background: args.get("background").and_then(|v| v.as_bool()).unwrap_or(false),
            yield_ms: None,
            timeout_sec: args.get("timeout_sec").and_then(|v| v.as_u64()),
            workdir: args.get("workdir").and_then(|v| v.as_str()).map(String::from),
            env: None,
        };

        let resp = exec(&state.processes, req, Some(ctx.session_key.clone())).await;
        let is_error = matches!(resp.status, ProcessStatus::Failed | ProcessStatus::TimedOut);
        (serde_json::to_string(&resp).unwrap_or_default(), is_error)
    }
}

pub struct ProcessTool;

#[async_trait]
impl Tool for ProcessTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "process".into(),
            description: "Manage background processes: list, poll, log, write, kill, remove.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"]
                    },
                    "session_id": { "type": "string" },
                    "data": { "type": "string" }
                },
                "required": ["action"]
            }),
        }
    }

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let action = match args.get("action").and_then(|v| v.as_str()) {
            Some("list") => ProcessAction::List,
            Some("poll") => ProcessAction::Poll,
            Some("log") => ProcessAction::Log,
            Some("write") => ProcessAction::Write,
            Some("kill") => ProcessAction::Kill,
            Some("clear") => ProcessAction::Clear,
            Some("remove") => ProcessAction::Remove,
            other => return (format!("unknown process action: {other:?}"), true),
        };

        let req = ProcessRequest {
            action,
            session_id: args.get("session_id").and_then(|v| v.as_str()).map(String::from),
            offset: args.get("offset").and_then(|v| v.as_u64()).map(|n| n as usize),
            limit: args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize),
            tail_lines: args.get("tail_lines").and_then(|v| v.as_u64()).map(|n| n as usize),
            data: args.get("data").and_then(|v| v.as_str()).map(String::from),
            eof: args.get("eof").and_then(|v| v.as_bool()).unwrap_or(false),
        };

        let resp = handle_process(&state.processes, req, Some(ctx.session_key.as_str())).await;
        let is_error = !resp.success;
        (serde_json::to_string(&resp).unwrap_or_default(), is_error)
    }
}

pub struct SkillReadDocTool;

#[async_trait]
impl Tool for SkillReadDocTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "skill.read_doc".into(),
            description: "Read the full documentation (SKILL.md) for a skill.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }),
        }
    }

    async fn call(&self, state: &AppState, _ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let name = match args.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return ("missing required argument: name".into(), true),
        };
        match state.skills.read_doc(name) {
            Ok(doc) => (doc, false),
            Err(e) => (format!("skill '{name}' unavailable: {e}"), true),
        }
    }
}

pub struct SkillReadResourceTool;

#[async_trait]
impl Tool for SkillReadResourceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "skill.read_resource".into(),
            description: "Read a bundled resource from a skill (references/, scripts/, assets/).".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "path": { "type": "string" }
                },
                "required": ["name", "path"]
            }),
        }
    }

    async fn call(&self, state: &AppState, _ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let name = match args.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return ("missing required argument: name".into(), true),
        };
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ("missing required argument: path".into(), true),
        };
        match state.skills.read_resource(name, path) {
            Ok(content) => (content, false),
            Err(e) => (format!("resource '{path}' in skill '{name}' unavailable: {e}"), true),
        }
    }
}

pub struct MemorySearchTool;

#[async_trait]
impl Tool for MemorySearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory.search".into(),
            description: "Search long-term memory for relevant facts, notes, and session history.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "description": "Max results (default 10)" }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let query = match args.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ("missing required argument: query".into(), true),
        };
        let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
        let user_id = ctx.agent_id.as_deref();

        match hybrid_search(&state.memory, query, limit, user_id).await {
            Ok(hits) => {
                let rendered = MemoryContextBuilder::new(8000).build(&hits);
                (rendered, false)
            }
            Err(e) => (format!("memory search failed: {e}"), true),
        }
    }
}

pub struct MemoryIngestTool;

#[async_trait]
impl Tool for MemoryIngestTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory.ingest".into(),
            description: "Store a fact or note in long-term memory.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "source": { "type": "string", "description": "Source label (e.g. 'user', 'agent')" },
                    "path": { "type": "string", "description": "Logical path to file this note under" }
                },
                "required": ["content"]
            }),
        }
    }

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let content = match args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ("missing required argument: content".into(), true),
        };
        let source = args.get("source").and_then(|v| v.as_str()).unwrap_or("agent");
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("notes/{}.md", ctx.session_key.replace([':', '/'], "_")));

        match state
            .memory
            .ingest_document(&path, source, MemoryScope::Personal, ctx.agent_id.clone(), content, content.len() as u64)
            .await
        {
            Ok(Some(n)) => (json!({ "chunks_indexed": n }).to_string(), false),
            Ok(None) => (json!({ "chunks_indexed": 0, "note": "content unchanged, skipped" }).to_string(), false),
            Err(e) => (format!("memory ingest failed: {e}"), true),
        }
    }
}

pub struct AgentRunTool;

#[async_trait]
impl Tool for AgentRunTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "agent.run".into(),
            description: "Delegate a task to a specialist sub-agent. Runs in the background; results arrive later.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_id": { "type": "string" },
                    "task": { "type": "string" },
                    "model": { "type": "string", "description": "Model override for this run" }
                },
                "required": ["agent_id", "task"]
            }),
        }
    }

    async fn call(&self, state: &AppState, ctx: &ToolCallContext, args: Value) -> (String, bool) {
        let agent_id = match args.get("agent_id").and_then(|v| v.as_str()) {
            Some(a) => a,
            None => return ("missing required argument: agent_id".into(), true),
        };
        let task = match args.get("task").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return ("missing required argument: task".into(), true),
        };
        let model = args.get("model").and_then(|v| v.as_str()).map(String::from);

        let state_arc = Arc::new(state.clone());
        match subagent::spawn(state_arc, agent_id, task, model, &ctx.session_key) {
            Ok(task_id) => (json!({ "task_id": task_id, "status": "started" }).to_string(), false),
            Err(e) => (e, true),
        }
    }
}

pub struct AgentListTool;

#[async_trait]
impl Tool for AgentListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "agent.list".into(),
            description: "List the ids of available specialist sub-agents.".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn call(&self, state: &AppState, _ctx: &ToolCallContext, _args: Value) -> (String, bool) {
        (json!({ "agents": state.router.cached_ids() }).to_string(), false)
    }
}
