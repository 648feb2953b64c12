//! Cron job CRUD + run-log API, backed by [`crate::cron::CronService`].

use axum::extract::{Path, Query};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use wd_domain::cron::{CronJob, CronPayload, JobState, Schedule};

use crate::runtime::schedules::{parse_tz, validate_cron, validate_timezone};
use crate::state::AppState;

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/schedules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_schedules(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.cron.list();
    Json(serde_json::json!({ "count": jobs.len(), "jobs": jobs }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/schedules/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_schedule(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.cron.get(&id) {
        Some(job) => Json(serde_json::json!({ "job": job })).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "job not found"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/schedules
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub agent_id: String,
    pub task: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub delete_after_run: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<CreateScheduleRequest>,
) -> impl IntoResponse {
    if let Schedule::Cron { expr, timezone } = &req.schedule {
        if let Err(msg) = validate_cron(expr) {
            return api_error(StatusCode::BAD_REQUEST, msg);
        }
        if let Err(msg) = validate_timezone(timezone) {
            return api_error(StatusCode::BAD_REQUEST, msg);
        }
    }

    let job = CronJob {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name,
        enabled: req.enabled,
        schedule: req.schedule,
        payload: CronPayload { agent_id: req.agent_id, task: req.task },
        state: JobState::default(),
        delete_after_run: req.delete_after_run,
    };
    state.cron.upsert(job.clone());

    (StatusCode::CREATED, Json(serde_json::json!({ "job": job }))).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v1/schedules/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub agent_id: Option<String>,
    pub task: Option<String>,
    pub schedule: Option<Schedule>,
    pub delete_after_run: Option<bool>,
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateScheduleRequest>,
) -> impl IntoResponse {
    let Some(mut job) = state.cron.get(&id) else {
        return api_error(StatusCode::NOT_FOUND, "job not found");
    };

    if let Some(name) = req.name {
        job.name = name;
    }
    if let Some(enabled) = req.enabled {
        job.enabled = enabled;
    }
    if let Some(agent_id) = req.agent_id {
        job.payload.agent_id = agent_id;
    }
    if let Some(task) = req.task {
        job.payload.task = task;
    }
    if let Some(schedule) = req.schedule {
        if let Schedule::Cron { expr, timezone } = &schedule {
            if let Err(msg) = validate_cron(expr) {
                return api_error(StatusCode::BAD_REQUEST, msg);
            }
            if let Err(msg) = validate_timezone(timezone) {
                return api_error(StatusCode::BAD_REQUEST, msg);
            }
        }
        job.schedule = schedule;
        job.state.next_run_ms = None;
    }
    if let Some(delete_after_run) = req.delete_after_run {
        job.delete_after_run = delete_after_run;
    }

    state.cron.upsert(job.clone());
    Json(serde_json::json!({ "job": job })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/schedules/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_schedule(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    Json(serde_json::json!({ "deleted": state.cron.remove(&id).is_some() }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/schedules/:id/runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_schedule_runs(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if state.cron.get(&id).is_none() {
        return api_error(StatusCode::NOT_FOUND, "job not found");
    }
    Json(serde_json::json!({ "runs": state.cron.run_log(Some(&id)) })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/schedules/next?expr=...&timezone=...
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct NextFireQuery {
    pub expr: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Preview the next five fire times for a cron expression, without
/// creating a job — used by the dashboard's schedule editor.
pub async fn next_fire_times(Query(params): Query<NextFireQuery>) -> impl IntoResponse {
    if let Err(msg) = validate_cron(&params.expr) {
        return api_error(StatusCode::BAD_REQUEST, msg);
    }
    if let Err(msg) = validate_timezone(&params.timezone) {
        return api_error(StatusCode::BAD_REQUEST, msg);
    }
    let tz = parse_tz(&params.timezone);
    let occurrences =
        crate::runtime::schedules::cron_next_n_tz(&params.expr, &chrono::Utc::now(), 5, tz);
    Json(serde_json::json!({ "next_occurrences": occurrences })).into_response()
}
