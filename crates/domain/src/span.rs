use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single unit of execution recorded by the tracing collector.
///
/// Spans are produced by the agent loop, provider calls, tool calls, and
/// cron runs, and are buffered and flushed in batches rather than emitted
/// one at a time (see `wd-gateway::tracing_collector`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub span_type: SpanType,
    pub run_id: uuid::Uuid,
    pub session_key: String,
    pub started_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub status: SpanStatus,
    /// Attribute keys follow the external vocabulary: `goclaw.*` for
    /// Warden-specific facts, `gen_ai.*` for the generic LLM-call shape.
    pub attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    Turn,
    LlmCall,
    ToolCall,
    CronRun,
    SubAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error,
    InProgress,
}

impl Span {
    pub fn started(
        trace_id: impl Into<String>,
        span_type: SpanType,
        run_id: uuid::Uuid,
        session_key: impl Into<String>,
        started_at_ms: u64,
    ) -> Self {
        Self {
            span_id: uuid::Uuid::new_v4().to_string(),
            trace_id: trace_id.into(),
            parent_span_id: None,
            span_type,
            run_id,
            session_key: session_key.into(),
            started_at_ms,
            ended_at_ms: None,
            status: SpanStatus::InProgress,
            attributes: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn finish(&mut self, ended_at_ms: u64, status: SpanStatus) {
        self.ended_at_ms = Some(ended_at_ms);
        self.status = status;
    }

    /// Correlation key used when an external trace system (W3C traceparent)
    /// needs a short id: the last 8 bytes of the span id, hex-encoded.
    pub fn correlation_suffix(&self) -> String {
        let bytes = self.span_id.as_bytes();
        let tail = if bytes.len() > 8 {
            &bytes[bytes.len() - 8..]
        } else {
            bytes
        };
        hex::encode(tail)
    }
}

// Attribute key constants — the external vocabulary these spans are
// serialized with. Kept as named constants rather than inline literals so a
// typo at a call site fails to compile instead of silently drifting from the
// agreed schema.
pub mod attr {
    pub const SPAN_TYPE: &str = "goclaw.span_type";
    pub const REQUEST_MODEL: &str = "gen_ai.request.model";
    pub const SYSTEM: &str = "gen_ai.system";
    pub const USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
    pub const USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
    pub const FINISH_REASON: &str = "gen_ai.response.finish_reason";
    pub const TOOL_NAME: &str = "goclaw.tool.name";
    pub const TOOL_CALL_ID: &str = "goclaw.tool.call_id";
    pub const DURATION_MS: &str = "goclaw.duration_ms";
    pub const INPUT_PREVIEW: &str = "goclaw.input_preview";
    pub const OUTPUT_PREVIEW: &str = "goclaw.output_preview";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_suffix_is_last_eight_bytes_hex() {
        let span = Span::started("trace-1", SpanType::LlmCall, uuid::Uuid::new_v4(), "sess", 0);
        let suffix = span.correlation_suffix();
        assert_eq!(suffix.len(), 16);
    }

    #[test]
    fn finish_sets_status_and_end_time() {
        let mut span = Span::started("trace-1", SpanType::ToolCall, uuid::Uuid::new_v4(), "sess", 100);
        span.finish(150, SpanStatus::Ok);
        assert_eq!(span.ended_at_ms, Some(150));
        assert_eq!(span.status, SpanStatus::Ok);
    }
}
