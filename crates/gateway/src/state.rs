use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use wd_domain::config::Config;
use wd_memory::MemoryStore;
use wd_providers::registry::ProviderRegistry;
use wd_sessions::{LifecycleManager, SessionStore, TranscriptWriter};
use wd_skills::registry::SkillsRegistry;
use wd_mcp_client::McpManager;
use wd_tools::ProcessManager;

use crate::announce::AnnounceQueue;
use crate::cron::CronService;
use crate::guard::InputGuard;
use crate::router::AgentRouter;
use crate::runtime::cancel::CancelMap;
use crate::runtime::runs::RunStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::scheduler::Scheduler;
use crate::tools::ToolRegistry;
use crate::tracing_collector::TraceCollector;
use crate::workspace::bootstrap::BootstrapTracker;
use crate::workspace::files::WorkspaceReader;

/// Cached user facts with a TTL.
#[derive(Clone)]
pub struct CachedUserFacts {
    pub content: String,
    pub fetched_at: Instant,
}

/// Cached tool definitions keyed on a policy fingerprint.
#[derive(Clone)]
pub struct CachedToolDefs {
    pub defs: Arc<Vec<wd_domain::tool::ToolDefinition>>,
    pub policy_key: String,
}

/// Shared application state passed to all API handlers and the turn loop.
///
/// Fields are grouped by concern:
/// - **Core services** — config, memory, LLM providers
/// - **Session management** — sessions, lifecycle, transcripts
/// - **Context & skills** — workspace, skills, bootstrap
/// - **Runtime** — scheduler, router, tools, tracing, guard, cron, announce
/// - **Security & caching** — token hashes, command deny list, caches
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub memory: Arc<MemoryStore>,
    pub llm: Arc<ProviderRegistry>,

    // ── Session management ────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub transcripts: Arc<TranscriptWriter>,
    pub session_locks: Arc<SessionLockMap>,

    // ── Context & skills ──────────────────────────────────────────────
    pub skills: Arc<SkillsRegistry>,
    pub workspace: Arc<WorkspaceReader>,
    pub bootstrap: Arc<BootstrapTracker>,

    // ── Runtime ───────────────────────────────────────────────────────
    /// Run execution tracker.
    pub run_store: Arc<RunStore>,
    pub processes: Arc<ProcessManager>,
    pub cancel_map: Arc<CancelMap>,
    /// Lane/session-queue scheduler gating turn concurrency.
    pub scheduler: Arc<Scheduler>,
    /// Agent resolution cache and active-run registry.
    pub router: Arc<AgentRouter>,
    /// Capability registry: built-in, dynamic, and MCP-bridged tools.
    pub tools: Arc<ToolRegistry>,
    /// Batching span collector, flushed on its own interval.
    pub tracing: Arc<TraceCollector>,
    /// Prompt-injection scanner consulted before a turn's user message is
    /// appended to history.
    pub guard: Arc<InputGuard>,
    /// Scheduled job executor.
    pub cron: Arc<CronService>,
    /// Debounced sub-agent completion delivery, keyed by parent session.
    pub announce: Arc<AnnounceQueue>,

    // ── MCP (Model Context Protocol) servers ────────────────────────────
    pub mcp: Arc<McpManager>,

    // ── Admin ─────────────────────────────────────────────────────────
    pub config_path: PathBuf,
    pub shutdown_tx: Arc<tokio::sync::Notify>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
    /// SHA-256 hash of the admin bearer token (read once at startup).
    pub admin_token_hash: Option<Vec<u8>>,
    /// Precompiled exec denied-pattern regexes (compiled once at startup).
    pub denied_command_set: Arc<regex::RegexSet>,

    // ── Caches ────────────────────────────────────────────────────────
    /// Per-user TTL cache for user facts (avoids network calls every turn).
    pub user_facts_cache: Arc<RwLock<HashMap<String, CachedUserFacts>>>,
    /// Cached tool definitions keyed on policy fingerprint.
    pub tool_defs_cache: Arc<RwLock<HashMap<String, CachedToolDefs>>>,
}
