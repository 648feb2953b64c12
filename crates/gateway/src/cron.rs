//! Scheduled job executor: a single loop ticking every second, collecting
//! jobs whose `next_run_ms ≤ now`, clearing that field to prevent duplicate
//! dispatch, then executing outside the lock. Uses the timezone-aware
//! `cron_next_tz` for the `Schedule::Cron` kind's next-fire computation;
//! the rest (the `{id,name,enabled,schedule,payload,state,delete_after_run}`
//! job shape, retry/backoff, and the run-log ring buffer) follows
//! [`wd_domain::cron`]'s shape.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::interval;
use wd_domain::cron::{CronJob, CronRunRecord, JobState, RunStatus, Schedule};

use crate::runtime::schedules::cron::cron_next_tz;
use crate::state::AppState;

const TICK: Duration = Duration::from_secs(1);
const RUN_LOG_CAPACITY: usize = 200;
const DEFAULT_MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(60);
const STORE_VERSION: u32 = 1;

/// A handler executes a job's payload, returning `Ok(())` on success.
pub type JobHandler = Arc<dyn Fn(Arc<AppState>, CronJob) -> futures_util::future::BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// On-disk shape written on every state change: a version tag plus the
/// full job set, rewritten atomically rather than appended to.
#[derive(Debug, Serialize, Deserialize)]
struct StoreEnvelope {
    version: u32,
    jobs: Vec<CronJob>,
}

pub struct CronService {
    jobs: RwLock<HashMap<String, CronJob>>,
    run_log: RwLock<Vec<CronRunRecord>>,
    handler: RwLock<Option<JobHandler>>,
    store_path: RwLock<Option<PathBuf>>,
}

impl CronService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            run_log: RwLock::new(Vec::new()),
            handler: RwLock::new(None),
            store_path: RwLock::new(None),
        })
    }

    pub fn set_handler(&self, handler: JobHandler) {
        *self.handler.write() = Some(handler);
    }

    /// Load jobs at startup, computing `next_run_ms` for any enabled job
    /// missing it.
    pub fn load(&self, jobs: Vec<CronJob>) {
        let now = Utc::now();
        let mut store = self.jobs.write();
        for mut job in jobs {
            if job.enabled && job.state.next_run_ms.is_none() {
                job.state.next_run_ms = next_fire(&job.schedule, &now);
            }
            store.insert(job.id.clone(), job);
        }
    }

    /// Point at a persistence file and load whatever is already there. A
    /// missing or unreadable file is treated as an empty store, not an
    /// error, so first boot doesn't require pre-creating it.
    pub fn load_from_disk(&self, path: &Path) {
        *self.store_path.write() = Some(path.to_path_buf());
        let Ok(raw) = std::fs::read_to_string(path) else { return };
        let Ok(envelope) = serde_json::from_str::<StoreEnvelope>(&raw) else {
            tracing::warn!(path = %path.display(), "cron store unreadable, starting empty");
            return;
        };
        self.load(envelope.jobs);
    }

    /// Rewrite the full job set to disk. No-op when no store path was set
    /// via [`Self::load_from_disk`] (e.g. in tests).
    fn persist(&self) {
        let Some(path) = self.store_path.read().clone() else { return };
        let envelope = StoreEnvelope { version: STORE_VERSION, jobs: self.jobs.read().values().cloned().collect() };
        let Ok(json) = serde_json::to_string_pretty(&envelope) else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!(error = %e, path = %path.display(), "failed to persist cron store");
        }
    }

    pub fn upsert(&self, mut job: CronJob) {
        if job.enabled && job.state.next_run_ms.is_none() {
            job.state.next_run_ms = next_fire(&job.schedule, &Utc::now());
        }
        self.jobs.write().insert(job.id.clone(), job);
        self.persist();
    }

    pub fn remove(&self, job_id: &str) -> Option<CronJob> {
        let removed = self.jobs.write().remove(job_id);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    pub fn get(&self, job_id: &str) -> Option<CronJob> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn list(&self) -> Vec<CronJob> {
        self.jobs.read().values().cloned().collect()
    }

    pub fn run_log(&self, job_id: Option<&str>) -> Vec<CronRunRecord> {
        let log = self.run_log.read();
        match job_id {
            Some(id) => log.iter().filter(|r| r.job_id == id).cloned().collect(),
            None => log.clone(),
        }
    }

    fn record_run(&self, record: CronRunRecord) {
        let mut log = self.run_log.write();
        log.push(record);
        if log.len() > RUN_LOG_CAPACITY {
            let overflow = log.len() - RUN_LOG_CAPACITY;
            log.drain(0..overflow);
        }
    }

    /// One tick: snapshot due jobs, clear their `next_run_ms`, release the
    /// lock, then execute each due job.
    async fn tick(self: &Arc<Self>, state: &Arc<AppState>) {
        let now_ms = Utc::now().timestamp_millis();
        let due: Vec<CronJob> = {
            let mut jobs = self.jobs.write();
            let mut due = Vec::new();
            for job in jobs.values_mut() {
                if !job.enabled {
                    continue;
                }
                if job.state.next_run_ms.is_some_and(|t| t <= now_ms) {
                    job.state.next_run_ms = None;
                    due.push(job.clone());
                }
            }
            due
        };

        for job in due {
            self.execute(state, job).await;
        }
    }

    async fn execute(self: &Arc<Self>, state: &Arc<AppState>, job: CronJob) {
        let handler = self.handler.read().clone();
        let run_id = uuid::Uuid::new_v4();
        let started_at = Utc::now();

        let mut attempt = 0u32;
        let mut last_error: Option<String> = None;
        let mut ok = false;

        while attempt < DEFAULT_MAX_RETRIES {
            let Some(handler) = &handler else {
                last_error = Some("no cron handler configured".into());
                break;
            };
            match handler(state.clone(), job.clone()).await {
                Ok(()) => {
                    ok = true;
                    break;
                }
                Err(e) => {
                    last_error = Some(e);
                    attempt += 1;
                    if attempt < DEFAULT_MAX_RETRIES {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }

        self.record_run(CronRunRecord {
            job_id: job.id.clone(),
            run_id,
            started_at,
            finished_at: Some(Utc::now()),
            ok,
            error: last_error.clone(),
        });

        self.finish(&job, ok, last_error);
    }

    fn finish(&self, job: &CronJob, ok: bool, error: Option<String>) {
        let mut jobs = self.jobs.write();
        let Some(stored) = jobs.get_mut(&job.id) else { return };

        let now = Utc::now();
        stored.state.last_run_ms = Some(now.timestamp_millis());
        stored.state.last_status = Some(if ok { RunStatus::Ok } else { RunStatus::Error });
        stored.state.last_error = error;
        stored.state.retry_count = if ok { 0 } else { stored.state.retry_count + 1 };

        if ok && job.delete_after_run {
            jobs.remove(&job.id);
            drop(jobs);
            self.persist();
            return;
        }

        if !matches!(job.schedule, Schedule::At { .. }) {
            stored.state.next_run_ms = next_fire(&job.schedule, &now);
        }
        drop(jobs);
        self.persist();
    }

    /// Run the scheduling loop until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, state: Arc<AppState>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = interval(TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(&state).await,
                _ = &mut shutdown => break,
            }
        }
    }
}

/// Exponential backoff with jitter: `delay = min(base * 2^attempt, max) ± 25%`.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = exp.min(MAX_DELAY);
    let jitter_frac = rand::thread_rng().gen_range(-0.25..=0.25);
    let jittered = capped.as_secs_f64() * (1.0 + jitter_frac);
    Duration::from_secs_f64(jittered.max(0.0))
}

fn next_fire(schedule: &Schedule, now: &chrono::DateTime<Utc>) -> Option<i64> {
    match schedule {
        Schedule::At { at_ms } => (*at_ms > now.timestamp_millis()).then_some(*at_ms),
        Schedule::Every { every_ms } => Some(now.timestamp_millis() + *every_ms),
        Schedule::Cron { expr, timezone } => {
            let tz = crate::runtime::schedules::cron::parse_tz(timezone);
            cron_next_tz(expr, now, tz).map(|dt| dt.timestamp_millis())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_domain::cron::CronPayload;

    fn job(id: &str, schedule: Schedule) -> CronJob {
        CronJob {
            id: id.into(),
            name: id.into(),
            enabled: true,
            schedule,
            payload: CronPayload { agent_id: "default".into(), task: "noop".into() },
            state: JobState::default(),
            delete_after_run: false,
        }
    }

    #[test]
    fn at_schedule_computes_next_fire_when_in_future() {
        let now = Utc::now();
        let at_ms = now.timestamp_millis() + 60_000;
        let next = next_fire(&Schedule::At { at_ms }, &now);
        assert_eq!(next, Some(at_ms));
    }

    #[test]
    fn at_schedule_in_past_never_fires() {
        let now = Utc::now();
        let at_ms = now.timestamp_millis() - 60_000;
        assert_eq!(next_fire(&Schedule::At { at_ms }, &now), None);
    }

    #[test]
    fn every_schedule_fires_relative_to_now() {
        let now = Utc::now();
        let next = next_fire(&Schedule::Every { every_ms: 1000 }, &now).unwrap();
        assert!(next >= now.timestamp_millis() + 1000);
    }

    #[test]
    fn load_computes_missing_next_run_for_enabled_jobs() {
        let service = CronService::new();
        service.load(vec![job("j1", Schedule::Every { every_ms: 5000 })]);
        let loaded = service.get("j1").unwrap();
        assert!(loaded.state.next_run_ms.is_some());
    }

    #[test]
    fn load_skips_disabled_jobs() {
        let service = CronService::new();
        let mut j = job("j1", Schedule::Every { every_ms: 5000 });
        j.enabled = false;
        service.load(vec![j]);
        assert!(service.get("j1").unwrap().state.next_run_ms.is_none());
    }

    #[test]
    fn backoff_delay_stays_within_bounds() {
        let delay = backoff_delay(5);
        assert!(delay <= MAX_DELAY.mul_f64(1.25) + Duration::from_millis(1));
    }

    #[tokio::test]
    async fn delete_after_run_removes_job_on_success() {
        let service = CronService::new();
        let mut j = job("j1", Schedule::At { at_ms: Utc::now().timestamp_millis() });
        j.delete_after_run = true;
        service.upsert(j.clone());
        service.finish(&j, true, None);
        assert!(service.get("j1").is_none());
    }

    #[tokio::test]
    async fn failed_run_increments_retry_count_and_keeps_job() {
        let service = CronService::new();
        let j = job("j1", Schedule::Every { every_ms: 5000 });
        service.upsert(j.clone());
        service.finish(&j, false, Some("boom".into()));
        let stored = service.get("j1").unwrap();
        assert_eq!(stored.state.retry_count, 1);
        assert_eq!(stored.state.last_error, Some("boom".into()));
    }

    #[tokio::test]
    async fn run_log_caps_at_two_hundred_entries() {
        let service = CronService::new();
        for i in 0..210 {
            service.record_run(CronRunRecord {
                job_id: "j1".into(),
                run_id: uuid::Uuid::new_v4(),
                started_at: Utc::now(),
                finished_at: Some(Utc::now()),
                ok: true,
                error: None,
            });
            let _ = i;
        }
        assert_eq!(service.run_log(None).len(), RUN_LOG_CAPACITY);
    }
}
