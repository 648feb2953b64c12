use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tracing collector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the span buffer and flush loop. Separate from the
/// ambient `tracing`/`tracing-subscriber` logging stack — this governs the
/// structured, per-run span record that gets durably stored and optionally
/// forwarded to an external exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Span buffer channel capacity before backpressure applies.
    #[serde(default = "d_buffer_capacity")]
    pub buffer_capacity: usize,
    /// How often the buffer is flushed to the durable store.
    #[serde(default = "d_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Optional external exporter endpoint. When unset, spans are only
    /// written to the durable store.
    #[serde(default)]
    pub exporter_endpoint: Option<String>,
    /// Include full input/output previews on exported spans rather than the
    /// default truncated form.
    #[serde(default)]
    pub verbose_span_payloads: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: d_buffer_capacity(),
            flush_interval_ms: d_flush_interval_ms(),
            exporter_endpoint: None,
            verbose_span_payloads: false,
        }
    }
}

fn d_buffer_capacity() -> usize {
    1_000
}
fn d_flush_interval_ms() -> u64 {
    5_000
}
