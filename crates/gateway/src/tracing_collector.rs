//! Batching span collector: an `mpsc` buffer plus a dirty-trace set,
//! flushed by a background loop on a fixed interval and at shutdown.
//!
//! Adds a batching layer on top of direct structured `tracing::info!`
//! events per span (`TraceEvent::emit`): the channel-as-single-producer/
//! single-consumer pattern already used for
//! [`crate::runtime::turn::TurnEvent`] delivery, and a
//! `parking_lot::Mutex<HashSet<_>>` in place of a broadcast channel since
//! only the flush loop ever reads the dirty set.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

const DEFAULT_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// One emitted span, exactly as it reaches the durable store.
#[derive(Debug, Clone)]
pub struct Span {
    pub id: Uuid,
    pub trace_id: Uuid,
    pub name: String,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for spans and trace-level aggregates. A real deployment
/// backs this with the same store sessions/transcripts use; tests use an
/// in-memory stand-in.
pub trait TraceStore: Send + Sync {
    fn batch_insert(&self, spans: &[Span]) -> anyhow::Result<()>;
    fn update_aggregates(&self, trace_id: Uuid, span_count: usize);
}

/// An external exporter (OTel collector, etc.) mirroring flushed spans.
pub trait TraceExporter: Send + Sync {
    fn export(&self, spans: &[Span]);
    fn shutdown(&self);
}

pub struct InMemoryTraceStore {
    spans: Mutex<Vec<Span>>,
    aggregates: Mutex<std::collections::HashMap<Uuid, usize>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self { spans: Mutex::new(Vec::new()), aggregates: Mutex::new(std::collections::HashMap::new()) }
    }

    pub fn span_count(&self) -> usize {
        self.spans.lock().len()
    }

    pub fn aggregate_for(&self, trace_id: Uuid) -> Option<usize> {
        self.aggregates.lock().get(&trace_id).copied()
    }
}

impl Default for InMemoryTraceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceStore for InMemoryTraceStore {
    fn batch_insert(&self, spans: &[Span]) -> anyhow::Result<()> {
        self.spans.lock().extend_from_slice(spans);
        Ok(())
    }

    fn update_aggregates(&self, trace_id: Uuid, span_count: usize) {
        *self.aggregates.lock().entry(trace_id).or_insert(0) += span_count;
    }
}

/// The last 8 bytes of a UUID, for correlating with external systems whose
/// own span id shape is shorter than our 128-bit ids. The full id is still
/// attached to the exported span as an attribute.
pub fn short_correlation_id(id: Uuid) -> [u8; 8] {
    let bytes = id.as_bytes();
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[8..16]);
    out
}

pub struct TraceCollector {
    tx: mpsc::Sender<Span>,
    rx: Mutex<Option<mpsc::Receiver<Span>>>,
    dirty: Mutex<HashSet<Uuid>>,
    store: Arc<dyn TraceStore>,
    exporter: Option<Arc<dyn TraceExporter>>,
    flush_interval: Duration,
}

impl TraceCollector {
    pub fn new(store: Arc<dyn TraceStore>) -> Self {
        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER_CAPACITY);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            dirty: Mutex::new(HashSet::new()),
            store,
            exporter: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn TraceExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Non-blocking emit: assigns `created_at` if unset and pushes to the
    /// buffer, dropping with a warning if the buffer is full.
    pub fn emit_span(&self, mut span: Span) {
        self.dirty.lock().insert(span.trace_id);
        if span.created_at == DateTime::<Utc>::UNIX_EPOCH {
            span.created_at = Utc::now();
        }
        if let Err(e) = self.tx.try_send(span) {
            tracing::warn!(error = %e, "span buffer full, dropping span");
        }
    }

    fn flush_once(&self, batch: Vec<Span>) {
        if !batch.is_empty() {
            if let Err(e) = self.store.batch_insert(&batch) {
                tracing::warn!(error = %e, "trace batch insert failed");
            }
            if let Some(exporter) = &self.exporter {
                exporter.export(&batch);
            }
        }

        let dirty: Vec<Uuid> = {
            let mut dirty = self.dirty.lock();
            let snapshot = dirty.iter().copied().collect();
            dirty.clear();
            snapshot
        };
        for trace_id in dirty {
            let count = batch.iter().filter(|s| s.trace_id == trace_id).count();
            self.store.update_aggregates(trace_id, count);
        }
    }

    /// Drain whatever is currently queued without waiting for the flush
    /// interval — used by the background loop's tick and by shutdown.
    fn drain_available(rx: &mut mpsc::Receiver<Span>) -> Vec<Span> {
        let mut batch = Vec::new();
        while let Ok(span) = rx.try_recv() {
            batch.push(span);
        }
        batch
    }

    /// Run the flush loop until `shutdown` resolves, then drain whatever
    /// remains and call the exporter's shutdown under a bounded timeout.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let mut rx = self.rx.lock().take().expect("run() called once");
        let mut ticker = interval(self.flush_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let batch = Self::drain_available(&mut rx);
                    self.flush_once(batch);
                }
                _ = &mut shutdown => break,
            }
        }

        let remaining = Self::drain_available(&mut rx);
        self.flush_once(remaining);

        if let Some(exporter) = &self.exporter {
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, async { exporter.shutdown() }).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(trace_id: Uuid) -> Span {
        Span {
            id: Uuid::new_v4(),
            trace_id,
            name: "turn".into(),
            attributes: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn short_correlation_id_is_last_eight_bytes() {
        let id = Uuid::new_v4();
        let short = short_correlation_id(id);
        assert_eq!(&short[..], &id.as_bytes()[8..16]);
    }

    #[tokio::test]
    async fn flush_inserts_buffered_spans_into_store() {
        let store = Arc::new(InMemoryTraceStore::new());
        let collector = Arc::new(TraceCollector::new(store.clone()).with_flush_interval(Duration::from_millis(10)));

        let trace_id = Uuid::new_v4();
        collector.emit_span(span(trace_id));
        collector.emit_span(span(trace_id));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(collector.clone().run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = shutdown_tx.send(());
        handle.await.unwrap();

        assert_eq!(store.span_count(), 2);
        assert_eq!(store.aggregate_for(trace_id), Some(2));
    }

    #[tokio::test]
    async fn shutdown_drains_remaining_spans() {
        let store = Arc::new(InMemoryTraceStore::new());
        let collector = Arc::new(TraceCollector::new(store.clone()).with_flush_interval(Duration::from_secs(60)));

        collector.emit_span(span(Uuid::new_v4()));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(collector.clone().run(shutdown_rx));
        let _ = shutdown_tx.send(());
        handle.await.unwrap();

        assert_eq!(store.span_count(), 1);
    }
}
