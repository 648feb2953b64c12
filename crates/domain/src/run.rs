use serde::{Deserialize, Serialize};

pub use crate::stream::Usage;
use crate::error::ErrorKind;

/// A request to run an agent turn, submitted to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub run_id: uuid::Uuid,
    pub agent_id: String,
    pub session_key: String,
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
    /// Set when this run was spawned by another run's sub-agent fan-out;
    /// identifies the parent for sibling lookups in the announce queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_key: Option<String>,
}

/// The outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: uuid::Uuid,
    pub output: String,
    pub usage: Option<Usage>,
    pub errored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl RunResult {
    pub fn ok(run_id: uuid::Uuid, output: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            run_id,
            output: output.into(),
            usage,
            errored: false,
            error_kind: None,
        }
    }

    pub fn err(run_id: uuid::Uuid, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            run_id,
            output: message.into(),
            usage: None,
            errored: true,
            error_kind: Some(kind),
        }
    }
}
