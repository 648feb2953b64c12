//! AppState construction and background-task spawning extracted from
//! `main.rs`. Exposes two public functions that CLI commands (`serve`,
//! `run`, `chat`) share so they can boot the full runtime without an HTTP
//! listener.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use wd_domain::config::{Config, ConfigSeverity};
use wd_mcp_client::McpManager;
use wd_providers::registry::ProviderRegistry;
use wd_sessions::{LifecycleManager, SessionStore, TranscriptWriter};
use wd_skills::registry::SkillsRegistry;
use wd_tools::ProcessManager;

use crate::announce::AnnounceQueue;
use crate::cron::CronService;
use crate::guard::InputGuard;
use crate::router::AgentRouter;
use crate::runtime::agent::AgentRuntime;
use crate::scheduler::Scheduler;
use crate::state::AppState;
use crate::tools::web_fetch::WebFetchTool;
use crate::tools::{builtin, McpBridgeTool, ToolRegistry};
use crate::tracing_collector::{InMemoryTraceStore, TraceCollector};
use crate::workspace::bootstrap::BootstrapTracker;
use crate::workspace::files::WorkspaceReader;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`]. This is the shared "boot" path used by `serve`, `run` and
/// `chat`.
pub async fn build_app_state(
    config: Arc<Config>,
    config_path: String,
    shutdown_tx: Arc<tokio::sync::Notify>,
) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let workspace = Arc::new(WorkspaceReader::new(config.workspace.path.clone()));
    tracing::info!(path = %config.workspace.path.display(), "workspace reader ready");

    let bootstrap =
        Arc::new(BootstrapTracker::new(config.workspace.state_path.clone()).context("initializing bootstrap tracker")?);

    let skills = Arc::new(SkillsRegistry::load(&config.skills.path).context("loading skills")?);
    tracing::info!(skills_count = skills.list().len(), "skills loaded");

    let embedder = ProviderRegistry::from_config(&config.llm)
        .ok()
        .and_then(|r| r.embedding_provider().ok());
    let memory = Arc::new(wd_memory::MemoryStore::new(config.memory.clone(), embedder));
    tracing::info!(chunks = memory.chunk_count(), "memory store ready");

    let llm = Arc::new(ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?);
    if llm.is_empty() {
        tracing::info!("no LLM providers initialized — configure API keys to enable LLM endpoints");
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }

    let sessions = Arc::new(SessionStore::new(&config.workspace.state_path).context("initializing session store")?);
    let lifecycle = Arc::new(LifecycleManager::new(config.sessions.lifecycle.clone()));
    let transcript_dir = sessions.transcript_dir();
    let transcripts = Arc::new(TranscriptWriter::new(&transcript_dir));
    tracing::info!(agent_id = %config.sessions.agent_id, "session management ready");

    let processes = Arc::new(ProcessManager::from_config(&config.tools));
    tracing::info!("process manager ready");

    let session_locks = Arc::new(crate::runtime::session_lock::SessionLockMap::new(
        config.session_lock.clone(),
    ));
    let cancel_map = Arc::new(crate::runtime::cancel::CancelMap::new());
    let run_store = Arc::new(crate::runtime::runs::RunStore::new(
        &config.workspace.state_path,
        config.runs.clone(),
    ));
    tracing::info!("session locks, cancel map, run store ready");

    // ── Scheduler (lanes + per-session queues) ──────────────────────
    let scheduler = Arc::new(Scheduler::new(config.scheduler.default_lane_capacity, config.scheduler.session_queue.clone()));

    // ── Agent router, preloaded with every statically configured agent ──
    let router = AgentRouter::new();
    let router = Arc::new(router);
    for (id, cfg) in &config.agents {
        let ws_path = cfg.workspace_path.clone().unwrap_or_else(|| config.workspace.path.clone());
        let skills_path = cfg.skills_path.clone().unwrap_or_else(|| config.skills.path.clone());
        let agent_workspace = Arc::new(WorkspaceReader::new(ws_path));
        let agent_skills = match SkillsRegistry::load(&skills_path) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::warn!(agent_id = id, error = %e, "failed to load skills for agent, using empty registry");
                Arc::new(SkillsRegistry::empty())
            }
        };
        router.preload(
            id,
            Arc::new(AgentRuntime { id: id.clone(), config: cfg.clone(), workspace: agent_workspace, skills: agent_skills }),
        );
    }
    tracing::info!(agent_count = config.agents.len(), "agent router ready");

    // ── MCP servers ──────────────────────────────────────────────────
    let mcp = if config.mcp.servers.is_empty() {
        tracing::info!("no MCP servers configured");
        Arc::new(McpManager::empty())
    } else {
        tracing::info!(count = config.mcp.servers.len(), "initializing MCP servers");
        Arc::new(McpManager::from_config(&config.mcp).await)
    };
    if mcp.tool_count() > 0 {
        tracing::info!(servers = mcp.server_count(), tools = mcp.tool_count(), "MCP tools discovered");
    }

    // ── Tool registry ────────────────────────────────────────────────
    let rate_limiter = crate::tools::RateLimiter::new(config.tools.rate_limit_per_hour);
    let tool_registry = Arc::new(ToolRegistry::new().with_rate_limiter(rate_limiter));
    tool_registry.register(Arc::new(builtin::ExecTool));
    tool_registry.register(Arc::new(builtin::ProcessTool));
    tool_registry.register(Arc::new(builtin::SkillReadDocTool));
    tool_registry.register(Arc::new(builtin::SkillReadResourceTool));
    tool_registry.register(Arc::new(builtin::MemorySearchTool));
    tool_registry.register(Arc::new(builtin::MemoryIngestTool));
    tool_registry.register(Arc::new(builtin::AgentRunTool));
    tool_registry.register(Arc::new(builtin::AgentListTool));
    match WebFetchTool::new() {
        Ok(tool) => tool_registry.register(Arc::new(tool)),
        Err(e) => tracing::warn!(error = %e, "failed to build web.fetch tool"),
    }
    for bridge in McpBridgeTool::from_manager(&mcp, Some("mcp")) {
        tool_registry.register(Arc::new(bridge));
    }
    tracing::info!(tool_count = tool_registry.len(), "tool registry ready");

    // ── Tracing collector ────────────────────────────────────────────
    let tracing_collector = Arc::new(TraceCollector::new(Arc::new(InMemoryTraceStore::new())));

    // ── Input guard ──────────────────────────────────────────────────
    let guard = Arc::new(InputGuard::new());

    // ── Cron service ─────────────────────────────────────────────────
    let cron = CronService::new();
    cron.load_from_disk(&config.workspace.state_path.join("cron_jobs.json"));
    cron.set_handler(Arc::new(|state, job| {
        Box::pin(async move {
            crate::subagent::spawn(state, &job.payload.agent_id, &job.payload.task, None, &format!("cron:{}", job.id))
                .map(|_task_id| ())
        })
    }));

    // ── Announce queue ───────────────────────────────────────────────
    let announce = AnnounceQueue::new();

    let api_token_hash = read_token_hash(
        config.server.api_token.as_deref(),
        &config.server.api_token_env,
        "API",
    );
    let admin_token_hash = read_token_hash(None, &config.admin.token_env, "admin");

    let denied_command_set = Arc::new(
        regex::RegexSet::new(&config.tools.exec_security.denied_patterns)
            .context("invalid regex in tools.exec_security.denied_patterns")?,
    );
    tracing::info!(patterns = config.tools.exec_security.denied_patterns.len(), "exec denied-patterns compiled");

    let state = AppState {
        config: config.clone(),
        memory,
        skills,
        workspace,
        bootstrap,
        llm,
        sessions,
        lifecycle,
        transcripts,
        processes,
        mcp,
        session_locks,
        cancel_map,
        scheduler,
        router,
        tools: tool_registry,
        tracing: tracing_collector,
        guard,
        cron,
        announce,
        run_store,
        config_path: PathBuf::from(config_path),
        shutdown_tx,
        user_facts_cache: Arc::new(parking_lot::RwLock::new(std::collections::HashMap::new())),
        tool_defs_cache: Arc::new(parking_lot::RwLock::new(std::collections::HashMap::new())),
        api_token_hash,
        admin_token_hash,
        denied_command_set,
    };

    Ok(state)
}

fn read_token_hash(configured: Option<&str>, env_var: &str, label: &str) -> Option<Vec<u8>> {
    let token = configured
        .filter(|t| !t.is_empty())
        .map(|t| ("config".to_string(), t.to_string()))
        .or_else(|| std::env::var(env_var).ok().filter(|t| !t.is_empty()).map(|t| (format!("env:{env_var}"), t)));

    match token {
        Some((source, t)) => {
            tracing::info!(source = %source, "{label} bearer-token auth enabled");
            Some(Sha256::digest(t.as_bytes()).to_vec())
        }
        None => {
            tracing::warn!("{label} bearer-token auth DISABLED — set a token in config.toml or the {env_var} env var");
            None
        }
    }
}

/// Spawn the long-running background tokio tasks: session flush, process
/// cleanup, session-lock pruning, the tracing flush loop, and the cron
/// scheduling loop.
///
/// Call this **after** [`build_app_state`] when running the HTTP server.
/// CLI one-shot commands (`run`) typically skip this.
pub fn spawn_background_tasks(state: &AppState) {
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.flush() {
                    tracing::warn!(error = %e, "session store flush failed");
                }
            }
        });
    }

    {
        let processes = state.processes.clone();
        let session_locks = state.session_locks.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                processes.cleanup_stale();
                session_locks.prune_idle();
            }
        });
    }

    {
        let tracing_collector = state.tracing.clone();
        let (_tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(tracing_collector.run(rx));
    }

    {
        let cron = state.cron.clone();
        let state_for_cron = Arc::new(state.clone());
        let (_tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(cron.run(state_for_cron, rx));
    }

    tracing::info!("background tasks spawned");
}
