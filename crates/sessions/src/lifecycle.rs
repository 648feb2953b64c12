//! Session reset lifecycle — daily + idle, with per-agent overrides.
//!
//! Reset is evaluated before a run is admitted to a session queue.  If the
//! session is stale (crossed the daily boundary or exceeded idle timeout),
//! the store mints a new session id for the same session key and the turn
//! loop starts a fresh transcript.

use chrono::{DateTime, Utc};

use wd_domain::config::LifecycleConfig;
use wd_domain::session::SessionState;

/// Reason a session was reset, if any.
#[derive(Debug, Clone)]
pub enum ResetReason {
    DailyReset { hour: u8 },
    IdleTimeout { idle_minutes: u32 },
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyReset { hour } => write!(f, "daily reset (hour={hour})"),
            Self::IdleTimeout { idle_minutes } => write!(f, "idle timeout ({idle_minutes}m)"),
        }
    }
}

/// The lifecycle manager evaluates whether a session should be reset.
pub struct LifecycleManager {
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// Evaluate whether the given session should be reset given the current
    /// time. Returns `Some(reason)` if a reset is needed.
    pub fn should_reset(&self, session: &SessionState, now: DateTime<Utc>) -> Option<ResetReason> {
        let (daily_hour, idle_mins) = self.resolve_params(&session.agent_id);

        if let Some(hour) = daily_hour {
            if crossed_daily_boundary(session.last_active_at, now, hour) {
                return Some(ResetReason::DailyReset { hour });
            }
        }

        if let Some(idle) = idle_mins {
            let elapsed = now.signed_duration_since(session.last_active_at).num_minutes();
            if elapsed >= idle as i64 {
                return Some(ResetReason::IdleTimeout { idle_minutes: idle });
            }
        }

        None
    }

    /// Resolve the effective (daily_reset_hour, idle_minutes) for this agent,
    /// applying per-agent override over the global defaults.
    fn resolve_params(&self, agent_id: &str) -> (Option<u8>, Option<u32>) {
        let mut daily = self.config.daily_reset_hour;
        let mut idle = self.config.idle_minutes;

        if let Some(ovr) = self.config.reset_by_agent.get(agent_id) {
            if ovr.daily_reset_hour.is_some() {
                daily = ovr.daily_reset_hour;
            }
            if ovr.idle_minutes.is_some() {
                idle = ovr.idle_minutes;
            }
        }

        (daily, idle)
    }
}

/// Check whether the daily boundary at `hour` was crossed between
/// `last_active` and `now`.
fn crossed_daily_boundary(last_active: DateTime<Utc>, now: DateTime<Utc>, hour: u8) -> bool {
    if now.signed_duration_since(last_active).num_seconds() < 60 {
        return false;
    }

    let Some(today_boundary) = now.date_naive().and_hms_opt(hour as u32, 0, 0) else {
        // hour >= 24: invalid configuration — treat as no boundary crossed.
        return false;
    };
    let today_boundary = today_boundary.and_utc();

    let boundary = if now >= today_boundary {
        today_boundary
    } else {
        today_boundary - chrono::Duration::days(1)
    };

    last_active < boundary && now >= boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use wd_domain::config::ResetOverride;

    fn session(last_active: DateTime<Utc>) -> SessionState {
        let mut s = SessionState::new("agent:a:main", "a", last_active);
        s.last_active_at = last_active;
        s
    }

    #[test]
    fn daily_boundary_crossed() {
        let last = Utc.with_ymd_and_hms(2026, 1, 15, 3, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 5, 0, 0).unwrap();
        assert!(crossed_daily_boundary(last, now, 4));
    }

    #[test]
    fn daily_boundary_not_crossed() {
        let last = Utc.with_ymd_and_hms(2026, 1, 15, 5, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 6, 0, 0).unwrap();
        assert!(!crossed_daily_boundary(last, now, 4));
    }

    #[test]
    fn daily_boundary_across_days() {
        let last = Utc.with_ymd_and_hms(2026, 1, 14, 23, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 5, 0, 0).unwrap();
        assert!(crossed_daily_boundary(last, now, 4));
    }

    #[test]
    fn idle_timeout_triggers_reset() {
        let cfg = LifecycleConfig {
            daily_reset_hour: None,
            idle_minutes: Some(30),
            reset_by_agent: HashMap::new(),
        };
        let mgr = LifecycleManager::new(cfg);
        let s = session(Utc::now() - chrono::Duration::minutes(45));
        let reason = mgr.should_reset(&s, Utc::now());
        assert!(matches!(reason, Some(ResetReason::IdleTimeout { .. })));
    }

    #[test]
    fn per_agent_override_takes_precedence() {
        let mut reset_by_agent = HashMap::new();
        reset_by_agent.insert(
            "a".to_string(),
            ResetOverride {
                daily_reset_hour: None,
                idle_minutes: Some(5),
            },
        );
        let cfg = LifecycleConfig {
            daily_reset_hour: None,
            idle_minutes: Some(60),
            reset_by_agent,
        };
        let mgr = LifecycleManager::new(cfg);
        let s = session(Utc::now() - chrono::Duration::minutes(10));
        let reason = mgr.should_reset(&s, Utc::now());
        assert!(matches!(
            reason,
            Some(ResetReason::IdleTimeout { idle_minutes: 5 })
        ));
    }

    #[test]
    fn no_reset_when_fresh() {
        let cfg = LifecycleConfig {
            daily_reset_hour: None,
            idle_minutes: Some(30),
            reset_by_agent: HashMap::new(),
        };
        let mgr = LifecycleManager::new(cfg);
        let s = session(Utc::now());
        assert!(mgr.should_reset(&s, Utc::now()).is_none());
    }
}
