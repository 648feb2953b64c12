//! Gateway-owned session store.
//!
//! Persists session state in `sessions.json` under the configured state path.
//! Each session key maps to a `SessionState` tracking the session id, agent
//! id, activity timestamps, and the compaction/flush bookkeeping the memory
//! engine consults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;

use wd_domain::error::{Error, Result};
use wd_domain::session::SessionState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Gateway-owned session store backed by a JSON file.
pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl SessionStore {
    /// Load or create the session store at `state_path/sessions/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let sessions_path = dir.join("sessions.json");
        let sessions = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
        })
    }

    /// Look up a session by its key.
    pub fn get(&self, session_key: &str) -> Option<SessionState> {
        self.sessions.read().get(session_key).cloned()
    }

    /// Resolve or create a session for the given key.  Returns `(state, is_new)`.
    pub fn resolve_or_create(&self, session_key: &str, agent_id: &str) -> (SessionState, bool) {
        // Fast path: session already exists.
        {
            let sessions = self.sessions.read();
            if let Some(entry) = sessions.get(session_key) {
                return (entry.clone(), false);
            }
        }

        // Slow path: create new session.
        let entry = SessionState::new(session_key, agent_id, Utc::now());

        let mut sessions = self.sessions.write();
        // Re-check under the write lock in case of a concurrent create.
        if let Some(existing) = sessions.get(session_key) {
            return (existing.clone(), false);
        }
        sessions.insert(session_key.to_owned(), entry.clone());

        tracing::info!(
            session_key = session_key,
            session_id = %entry.session_id,
            "session resolved (new)"
        );

        (entry, true)
    }

    /// Record a session reset: mint a new session id for the same key,
    /// clearing message/compaction counters and conversation history markers.
    pub fn reset_session(&self, session_key: &str, reason: &str) -> Option<SessionState> {
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(session_key)?;

        let old_id = entry.session_id;
        let now = Utc::now();

        entry.session_id = uuid::Uuid::new_v4();
        entry.created_at = now;
        entry.last_active_at = now;
        entry.message_count = 0;
        entry.compaction_count = 0;
        entry.last_flush_at_compaction_count = 0;
        entry.turn_in_progress = false;

        tracing::info!(
            session_key = session_key,
            old_session_id = %old_id,
            new_session_id = %entry.session_id,
            reason,
            "session reset"
        );

        Some(entry.clone())
    }

    /// Record that a turn appended `new_messages` messages and advanced the
    /// compaction counter by `compactions` (usually 0 or 1).
    pub fn record_turn(&self, session_key: &str, new_messages: usize, compactions: u64) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_key) {
            entry.message_count += new_messages;
            entry.compaction_count += compactions;
            entry.last_active_at = Utc::now();
        }
    }

    /// Mark / clear the in-progress flag used by the session queue to avoid
    /// concurrent turns against the same session state.
    pub fn set_turn_in_progress(&self, session_key: &str, in_progress: bool) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_key) {
            entry.turn_in_progress = in_progress;
        }
    }

    /// Mark the session as flushed up to its current compaction count.
    pub fn mark_flushed(&self, session_key: &str) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_key) {
            entry.mark_flushed();
        }
    }

    /// Touch the last-active timestamp without altering counters.
    pub fn touch(&self, session_key: &str) {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_key) {
            entry.last_active_at = Utc::now();
        }
    }

    /// List all session entries.
    pub fn list(&self) -> Vec<SessionState> {
        self.sessions.read().values().cloned().collect()
    }

    /// Persist the current session state to disk.
    pub fn flush(&self) -> Result<()> {
        let sessions = self.sessions.read();
        let json = serde_json::to_string_pretty(&*sessions)
            .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?;
        std::fs::write(&self.sessions_path, json).map_err(Error::Io)?;
        Ok(())
    }

    /// Return the directory transcripts live under (sibling of `sessions.json`).
    pub fn transcript_dir(&self) -> PathBuf {
        self.sessions_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_or_create_creates_new_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let (entry, is_new) = store.resolve_or_create("agent:a:main", "a");
        assert!(is_new);
        assert_eq!(entry.session_key, "agent:a:main");

        let (entry2, is_new2) = store.resolve_or_create("agent:a:main", "a");
        assert!(!is_new2);
        assert_eq!(entry.session_id, entry2.session_id);
    }

    #[test]
    fn reset_session_mints_new_id() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let (entry, _) = store.resolve_or_create("agent:a:main", "a");

        let reset = store.reset_session("agent:a:main", "idle timeout").unwrap();
        assert_ne!(entry.session_id, reset.session_id);
        assert_eq!(reset.message_count, 0);
    }

    #[test]
    fn record_turn_advances_counters() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.resolve_or_create("agent:a:main", "a");

        store.record_turn("agent:a:main", 2, 1);
        let entry = store.get("agent:a:main").unwrap();
        assert_eq!(entry.message_count, 2);
        assert_eq!(entry.compaction_count, 1);
        assert!(entry.flush_due());

        store.mark_flushed("agent:a:main");
        let entry = store.get("agent:a:main").unwrap();
        assert!(!entry.flush_due());
    }

    #[test]
    fn flush_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        {
            let store = SessionStore::new(dir.path()).unwrap();
            store.resolve_or_create("agent:a:main", "a");
            store.flush().unwrap();
        }

        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.get("agent:a:main").is_some());
    }
}
