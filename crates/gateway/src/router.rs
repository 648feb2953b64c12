//! Agent-by-key cache with TTL, a lazy resolver for multi-tenant creation,
//! and the active-run registry used to authorize cancellation.
//!
//! A TTL-cached map that can create an agent on demand through an injected
//! async resolver — the shape multi-tenant deployments need when agent
//! configuration is not fully known at boot. The active-run registry builds
//! on [`crate::runtime::cancel::CancelMap`]'s token, pairing each run id
//! with the session key and agent id that started it so
//! [`AgentRouter::abort_run`] can enforce the "only the owning session may
//! cancel" rule.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::runtime::agent::AgentRuntime;
use crate::runtime::cancel::{CancelReason, CancelToken};

const DEFAULT_TTL: Duration = Duration::from_secs(600);

struct CachedAgent {
    runtime: Arc<AgentRuntime>,
    cached_at: Instant,
}

/// Metadata for one in-flight run, keyed by run id.
pub struct ActiveRun {
    pub session_key: String,
    pub agent_id: String,
    pub cancel: CancelToken,
    pub started_at: Instant,
}

type Resolver = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Option<Arc<AgentRuntime>>> + Send>> + Send + Sync,
>;

/// Error returned when a caller tries to cancel a run it does not own.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("run {0} not found")]
    RunNotFound(String),
    #[error("run {run_id} belongs to a different session")]
    NotOwner { run_id: String },
}

pub struct AgentRouter {
    cache: RwLock<HashMap<String, CachedAgent>>,
    ttl: Duration,
    resolver: Option<Resolver>,
    active_runs: RwLock<HashMap<String, ActiveRun>>,
}

impl AgentRouter {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl: DEFAULT_TTL,
            resolver: None,
            active_runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Install a lazy resolver invoked when an agent id is not (or no
    /// longer) in the cache. The resolver is responsible for building a
    /// fully-configured [`AgentRuntime`]; a `None` result means "no such
    /// agent."
    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(String) -> Pin<Box<dyn Future<Output = Option<Arc<AgentRuntime>>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Seed the cache directly — used at startup to preload every
    /// statically configured agent without paying the resolver round-trip.
    pub fn preload(&self, agent_id: &str, runtime: Arc<AgentRuntime>) {
        self.cache.write().insert(
            agent_id.to_string(),
            CachedAgent { runtime, cached_at: Instant::now() },
        );
    }

    /// Resolve an agent by id, honoring the TTL: an entry older than `ttl`
    /// is treated as a cache miss and re-resolved. Double-checks the write
    /// lock before inserting, so two concurrent misses for the same id
    /// don't both pay the resolver cost.
    pub async fn resolve(&self, agent_id: &str) -> Option<Arc<AgentRuntime>> {
        if let Some(runtime) = self.cached(agent_id) {
            return Some(runtime);
        }

        let resolver = self.resolver.clone()?;
        let resolved = resolver(agent_id.to_string()).await?;

        let mut cache = self.cache.write();
        let runtime = cache
            .entry(agent_id.to_string())
            .or_insert_with(|| CachedAgent { runtime: resolved.clone(), cached_at: Instant::now() });
        runtime.cached_at = Instant::now();
        Some(runtime.runtime.clone())
    }

    /// Ids of every agent currently cached (preloaded or resolved), sorted.
    /// Used by the `agent.list` tool; does not consult the resolver, so a
    /// lazily-creatable agent that hasn't been resolved yet won't appear.
    pub fn cached_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cache.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Synchronous cache-only lookup, skipping the resolver. Used by
    /// call sites that need an agent right now and would rather fail fast
    /// than await a resolver round-trip (e.g. sub-agent fan-out).
    pub fn try_cached(&self, agent_id: &str) -> Option<Arc<AgentRuntime>> {
        self.cached(agent_id)
    }

    fn cached(&self, agent_id: &str) -> Option<Arc<AgentRuntime>> {
        let cache = self.cache.read();
        let entry = cache.get(agent_id)?;
        if entry.cached_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.runtime.clone())
    }

    // ── active-run registry ─────────────────────────────────────────

    /// Register a new active run, returning the cancel token the caller
    /// should check from inside the turn loop.
    pub fn start_run(&self, run_id: &str, session_key: &str, agent_id: &str) -> CancelToken {
        let cancel = CancelToken::new();
        self.active_runs.write().insert(
            run_id.to_string(),
            ActiveRun {
                session_key: session_key.to_string(),
                agent_id: agent_id.to_string(),
                cancel: cancel.clone(),
                started_at: Instant::now(),
            },
        );
        cancel
    }

    pub fn finish_run(&self, run_id: &str) {
        self.active_runs.write().remove(run_id);
    }

    /// Cancel `run_id`, but only if `caller_session_key` matches the run's
    /// owning session — rejects cross-session cancel attempts.
    pub fn abort_run(&self, run_id: &str, caller_session_key: &str) -> Result<(), RouterError> {
        let runs = self.active_runs.read();
        let run = runs.get(run_id).ok_or_else(|| RouterError::RunNotFound(run_id.to_string()))?;
        if run.session_key != caller_session_key {
            return Err(RouterError::NotOwner { run_id: run_id.to_string() });
        }
        run.cancel.cancel_with_reason(CancelReason::UserRequested);
        Ok(())
    }

    /// Cancel every run currently attributed to `session_key` — used when a
    /// session is torn down or its parent turn is cancelled.
    pub fn abort_runs_for_session(&self, session_key: &str) -> usize {
        let runs = self.active_runs.read();
        let mut n = 0;
        for run in runs.values() {
            if run.session_key == session_key {
                run.cancel.cancel_with_reason(CancelReason::ParentCancelled);
                n += 1;
            }
        }
        n
    }

    pub fn active_run_count(&self) -> usize {
        self.active_runs.read().len()
    }
}

impl Default for AgentRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::files::WorkspaceReader;
    use wd_domain::config::AgentConfig;
    use wd_skills::registry::SkillsRegistry;

    fn runtime(id: &str) -> Arc<AgentRuntime> {
        Arc::new(AgentRuntime {
            id: id.to_string(),
            config: AgentConfig {
                workspace_path: None,
                skills_path: None,
                tool_policy: Default::default(),
                models: HashMap::new(),
                memory_mode: Default::default(),
                limits: Default::default(),
                compaction_enabled: false,
                context_window: 128_000,
                max_tool_iterations: 25,
                injection_action: Default::default(),
            },
            workspace: Arc::new(WorkspaceReader::new("/tmp".into())),
            skills: Arc::new(SkillsRegistry::empty()),
        })
    }

    #[tokio::test]
    async fn preloaded_agent_resolves_without_resolver() {
        let router = AgentRouter::new();
        router.preload("researcher", runtime("researcher"));
        let resolved = router.resolve("researcher").await;
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn unknown_agent_without_resolver_returns_none() {
        let router = AgentRouter::new();
        assert!(router.resolve("ghost").await.is_none());
    }

    #[tokio::test]
    async fn resolver_is_consulted_on_cache_miss() {
        let router = AgentRouter::new().with_resolver(|id| {
            Box::pin(async move {
                if id == "lazy" {
                    Some(runtime("lazy"))
                } else {
                    None
                }
            })
        });
        assert!(router.resolve("lazy").await.is_some());
        assert!(router.resolve("missing").await.is_none());
    }

    #[tokio::test]
    async fn ttl_expiry_forces_miss() {
        let router = AgentRouter::new().with_ttl(Duration::from_millis(1));
        router.preload("researcher", runtime("researcher"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(router.cached("researcher").is_none());
    }

    #[test]
    fn abort_run_rejects_non_owner() {
        let router = AgentRouter::new();
        let _cancel = router.start_run("run1", "session-a", "researcher");
        let err = router.abort_run("run1", "session-b").unwrap_err();
        assert!(matches!(err, RouterError::NotOwner { .. }));
    }

    #[test]
    fn abort_run_succeeds_for_owner() {
        let router = AgentRouter::new();
        let cancel = router.start_run("run1", "session-a", "researcher");
        router.abort_run("run1", "session-a").unwrap();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn abort_runs_for_session_cancels_all_matching() {
        let router = AgentRouter::new();
        let c1 = router.start_run("run1", "session-a", "researcher");
        let c2 = router.start_run("run2", "session-a", "writer");
        let c3 = router.start_run("run3", "session-b", "writer");
        let n = router.abort_runs_for_session("session-a");
        assert_eq!(n, 2);
        assert!(c1.is_cancelled());
        assert!(c2.is_cancelled());
        assert!(!c3.is_cancelled());
    }

    #[test]
    fn finish_run_removes_from_registry() {
        let router = AgentRouter::new();
        router.start_run("run1", "session-a", "researcher");
        assert_eq!(router.active_run_count(), 1);
        router.finish_run("run1");
        assert_eq!(router.active_run_count(), 0);
    }
}
