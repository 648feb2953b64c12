//! Debounced delivery of sub-agent completions back into their parent
//! session. On the first item in a session, arm a timer; on every
//! subsequent item, reset it; once the cap is reached, drain immediately
//! regardless of the timer. At drain, every queued item is merged into one
//! synthetic system message, annotated with the count of still-running
//! siblings (resolved through an injected counting closure at drain time,
//! not snapshotted when the item was queued), and handed to the `on_drain`
//! hook for delivery.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::sleep;

use wd_domain::announce::{AnnounceItem, AnnounceStatus};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
const DEFAULT_CAP: usize = 20;

type CountingFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;
type DrainHook = Arc<dyn Fn(String, String) + Send + Sync>;

struct SessionQueue {
    items: Vec<AnnounceItem>,
    /// Cancels the pending debounce timer when a new item resets it.
    cancel_timer: Option<oneshot::Sender<()>>,
}

pub struct AnnounceQueue {
    debounce: Duration,
    cap: usize,
    sessions: Mutex<HashMap<String, SessionQueue>>,
    still_running: Mutex<Option<CountingFn>>,
    on_drain: Mutex<Option<DrainHook>>,
}

impl AnnounceQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            debounce: DEFAULT_DEBOUNCE,
            cap: DEFAULT_CAP,
            sessions: Mutex::new(HashMap::new()),
            still_running: Mutex::new(None),
            on_drain: Mutex::new(None),
        })
    }

    pub fn with_debounce(mut self: Arc<Self>, debounce: Duration) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("no clones yet").debounce = debounce;
        self
    }

    /// Install the function used at drain time to count siblings of the
    /// draining session that are still running.
    pub fn set_still_running_counter<F>(&self, f: F)
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        *self.still_running.lock() = Some(Arc::new(f));
    }

    /// Install the delivery hook, called with `(parent_session_key,
    /// merged_message)` once per drain.
    pub fn set_on_drain<F>(&self, f: F)
    where
        F: Fn(String, String) + Send + Sync + 'static,
    {
        *self.on_drain.lock() = Some(Arc::new(f));
    }

    /// Enqueue a completed sub-agent's result. May trigger an immediate
    /// drain if the session's queue has reached `cap`.
    pub fn push(self: &Arc<Self>, item: AnnounceItem) {
        let parent = item.parent_session_key.clone();
        let mut sessions = self.sessions.lock();
        let queue = sessions.entry(parent.clone()).or_insert_with(|| SessionQueue {
            items: Vec::new(),
            cancel_timer: None,
        });

        if let Some(cancel) = queue.cancel_timer.take() {
            let _ = cancel.send(());
        }
        queue.items.push(item);

        if queue.items.len() >= self.cap {
            drop(sessions);
            self.drain(&parent);
            return;
        }

        let (tx, rx) = oneshot::channel();
        queue.cancel_timer = Some(tx);
        let this = self.clone();
        let debounce = self.debounce;
        let session = parent.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(debounce) => this.drain(&session),
                _ = rx => {}
            }
        });
    }

    /// Drain `session_key`'s queue immediately, merging queued items into
    /// one synthetic system message and invoking the drain hook.
    pub fn drain(self: &Arc<Self>, session_key: &str) {
        let items = {
            let mut sessions = self.sessions.lock();
            match sessions.remove(session_key) {
                Some(q) if !q.items.is_empty() => q.items,
                _ => return,
            }
        };

        let still_running = self
            .still_running
            .lock()
            .as_ref()
            .map(|f| f(session_key))
            .unwrap_or(0);

        let message = render_merged_message(&items, still_running);

        if let Some(hook) = self.on_drain.lock().clone() {
            hook(session_key.to_string(), message);
        }
    }

    pub fn pending_count(&self, session_key: &str) -> usize {
        self.sessions.lock().get(session_key).map(|q| q.items.len()).unwrap_or(0)
    }
}

fn render_merged_message(items: &[AnnounceItem], still_running: usize) -> String {
    let mut out = String::from("### Sub-agent results\n\n");
    for item in items {
        let status = match item.status {
            AnnounceStatus::Completed => "completed",
            AnnounceStatus::Errored => "errored",
            AnnounceStatus::Cancelled => "cancelled",
        };
        out.push_str(&format!(
            "- **{}** ({status}, {}ms, {} iterations): {}\n",
            item.label, item.runtime_ms, item.iterations, item.result
        ));
    }
    if still_running > 0 {
        out.push_str(&format!("\n{still_running} sibling task(s) still running.\n"));
    }
    out
}

/// Used only to satisfy the `Future` import when composing the drain timer
/// with a future cancellation-aware select in tests.
#[allow(dead_code)]
fn _unused(_f: Pin<Box<dyn Future<Output = ()> + Send>>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(parent: &str, id: &str) -> AnnounceItem {
        AnnounceItem {
            subagent_id: id.to_string(),
            label: id.to_string(),
            status: AnnounceStatus::Completed,
            result: "done".into(),
            runtime_ms: 10,
            iterations: 1,
            parent_session_key: parent.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn cap_reached_drains_immediately() {
        let queue = AnnounceQueue::new();
        let drained = Arc::new(AtomicUsize::new(0));
        let d = drained.clone();
        queue.set_on_drain(move |_session, _msg| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        for i in 0..DEFAULT_CAP {
            queue.push(item("parent-a", &format!("child-{i}")));
        }

        assert_eq!(drained.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debounce_timer_fires_after_quiet_period() {
        let queue = Arc::new(AnnounceQueue {
            debounce: Duration::from_millis(5),
            cap: DEFAULT_CAP,
            sessions: Mutex::new(HashMap::new()),
            still_running: Mutex::new(None),
            on_drain: Mutex::new(None),
        });
        let drained = Arc::new(AtomicUsize::new(0));
        let d = drained.clone();
        queue.set_on_drain(move |_session, _msg| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        queue.push(item("parent-b", "child-1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(drained.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merged_message_includes_still_running_count() {
        let queue = Arc::new(AnnounceQueue {
            debounce: Duration::from_millis(5),
            cap: DEFAULT_CAP,
            sessions: Mutex::new(HashMap::new()),
            still_running: Mutex::new(None),
            on_drain: Mutex::new(None),
        });
        queue.set_still_running_counter(|_session| 3);
        let captured = Arc::new(Mutex::new(String::new()));
        let c = captured.clone();
        queue.set_on_drain(move |_session, msg| {
            *c.lock() = msg;
        });

        queue.push(item("parent-c", "child-1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(captured.lock().contains("3 sibling task(s) still running"));
    }
}
