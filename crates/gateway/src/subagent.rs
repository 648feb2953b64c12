//! Sub-agent fan-out: spawning a child agent creates a task record, runs it
//! under its own root "agent" tracing span, and on completion enqueues an
//! [`AnnounceItem`] onto the parent session's [`AnnounceQueue`].
//!
//! Unlike a design that blocks the calling tool-call future on `rx.recv()`
//! until the child turn finishes, the turn here runs in a detached
//! `tokio::spawn`, and the tool call that triggered it returns immediately
//! with an acknowledgment; the result reaches the parent later, batched
//! through the announce queue.

use std::sync::Arc;
use std::time::Instant;

use wd_domain::announce::{AnnounceItem, AnnounceStatus};

use crate::runtime::agent::AgentContext;
use crate::runtime::turn::{run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

/// Start a sub-agent task in the background. Returns the task id
/// immediately; the caller (the `agent.run` tool) reports this back to the
/// model as an acknowledgment, not as the sub-agent's result.
pub fn spawn(
    state: Arc<AppState>,
    agent_id: &str,
    task: &str,
    model_override: Option<String>,
    parent_session_key: &str,
) -> Result<String, String> {
    let runtime = state
        .router
        .try_cached(agent_id)
        .ok_or_else(|| format!("agent '{agent_id}' not found. Available: {:?}", state.router.cached_ids()))?;

    let task_id = uuid::Uuid::new_v4().to_string();
    let child_session_key = format!("agent:{agent_id}:task:{task_id}");
    let label = format!("{agent_id}:{task_id}");

    state.cancel_map.add_to_group(parent_session_key, &child_session_key);

    let model = model_override.or_else(|| runtime.config.models.get("executor").cloned());
    let agent_ctx: AgentContext = runtime.context(Some(parent_session_key.to_string()));

    let input = TurnInput {
        session_key: child_session_key.clone(),
        session_id: task_id.clone(),
        user_message: task.to_string(),
        model,
        json_mode: false,
        agent: Some(agent_ctx),
    };

    let parent_key = parent_session_key.to_string();
    let agent_id_owned = agent_id.to_string();
    let state_for_span = state.clone();
    let task_id_for_span = task_id.clone();

    tokio::spawn(async move {
        let span = tracing::info_span!("agent", agent_id = %agent_id_owned, task_id = %task_id_for_span);
        let _enter = span.enter();
        let started = Instant::now();

        let (_run_id, mut rx) = run_turn((*state_for_span).clone(), input);

        let mut result = String::new();
        let mut iterations = 0u32;
        let mut status = AnnounceStatus::Completed;

        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::Final { content } => result = content,
                TurnEvent::Stopped { content } => {
                    result = if content.is_empty() { "[agent stopped]".into() } else { content };
                    status = AnnounceStatus::Cancelled;
                }
                TurnEvent::Error { message } => {
                    result = message;
                    status = AnnounceStatus::Errored;
                }
                TurnEvent::ToolCallEvent { .. } => iterations += 1,
                _ => {}
            }
        }

        state_for_span.cancel_map.remove_from_group(&parent_key, &child_session_key);

        state_for_span.announce.push(AnnounceItem {
            subagent_id: task_id_for_span.clone(),
            label,
            status,
            result,
            runtime_ms: started.elapsed().as_millis() as u64,
            iterations,
            parent_session_key: parent_key,
            created_at: chrono::Utc::now(),
        });
    });

    Ok(task_id)
}
