use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled, recurring (or one-shot) agent run.
///
/// `schedule.kind == "at"` jobs self-delete after one success when
/// `delete_after_run` is set; `every`/`cron` jobs recompute `next_run_ms`
/// from the current time on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub schedule: Schedule,
    /// Opaque run payload — the agent id and task text the scheduler hands
    /// to the router when this job fires.
    pub payload: CronPayload,
    pub state: JobState,
    pub delete_after_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronPayload {
    pub agent_id: String,
    pub task: String,
}

/// `{kind, at_ms? | every_ms? | expr}` — exactly one of the optional fields
/// is meaningful for a given `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fires once at `at_ms`; never again.
    At { at_ms: i64 },
    /// Fires at `now + every_ms`, repeatedly, re-armed after each run.
    Every { every_ms: i64 },
    /// Fires at the next tick of a standard five-field expression,
    /// evaluated in `timezone`.
    Cron { expr: String, timezone: String },
}

/// `{next_run_ms?, last_run_ms?, last_status, last_error}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Attempts made on the execution currently in flight (or the one most
    /// recently retried); reset to 0 on every success.
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
    Retrying,
}

/// One entry in a job's bounded run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronRunRecord {
    pub job_id: String,
    pub run_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_schedule_round_trips_through_json() {
        let job = CronJob {
            id: "j1".into(),
            name: "nightly backup".into(),
            enabled: true,
            schedule: Schedule::At { at_ms: 1_700_000_000_000 },
            payload: CronPayload { agent_id: "researcher".into(), task: "backup".into() },
            state: JobState::default(),
            delete_after_run: true,
        };
        let json = serde_json::to_string(&job).unwrap();
        let back: CronJob = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.schedule, Schedule::At { at_ms } if at_ms == 1_700_000_000_000));
        assert!(back.delete_after_run);
    }

    #[test]
    fn job_state_omits_absent_optionals() {
        let state = JobState::default();
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("next_run_ms"));
        assert!(!json.contains("last_status"));
    }
}
