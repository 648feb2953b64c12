//! Polling-based directory watcher.
//!
//! No filesystem-notification crate is in the dependency set, so change
//! detection is a debounced `tokio::time::interval` poll — the same
//! background-task idiom used for the gateway's other periodic sweeps
//! (session flush, delivery flush, stale pruning). Each tick re-hashes
//! tracked file metadata; on any change it bumps a monotonic version
//! counter that consumers can poll instead of subscribing to raw events.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared, cheaply-clonable version counter bumped whenever a watched
/// directory's contents changed on the most recent poll.
#[derive(Clone, Default)]
pub struct WatchVersion(Arc<AtomicU64>);

impl WatchVersion {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Snapshot of one watched directory's entries, by path -> (mtime, size).
type DirSnapshot = std::collections::HashMap<PathBuf, (std::time::SystemTime, u64)>;

fn snapshot_dir(root: &std::path::Path) -> DirSnapshot {
    let mut out = DirSnapshot::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if let Ok(meta) = entry.metadata() {
            if meta.is_file() {
                let mtime = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
                out.insert(path, (mtime, meta.len()));
            }
        }
    }
    out
}

/// Spawn a background task that polls `root` every `debounce` and bumps
/// `version` whenever the directory's file set or any file's mtime/size
/// changes. Returns the join handle so callers can abort it on shutdown.
pub fn spawn_watcher(root: PathBuf, debounce: Duration, version: WatchVersion) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = snapshot_dir(&root);
        let mut interval = tokio::time::interval(debounce);
        loop {
            interval.tick().await;
            let current = snapshot_dir(&root);
            if current != last {
                version.bump();
                tracing::debug!(root = %root.display(), version = version.get(), "watched directory changed");
                last = current;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn watch_version_starts_at_zero() {
        assert_eq!(WatchVersion::new().get(), 0);
    }

    #[test]
    fn snapshot_detects_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let before = snapshot_dir(dir.path());
        assert!(before.is_empty());

        let file_path = dir.path().join("a.txt");
        let mut f = std::fs::File::create(&file_path).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        let after = snapshot_dir(dir.path());
        assert_eq!(after.len(), 1);
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn watcher_bumps_version_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let version = WatchVersion::new();
        let handle = spawn_watcher(dir.path().to_path_buf(), Duration::from_millis(30), version.clone());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(version.get(), 0);

        let mut f = std::fs::File::create(dir.path().join("new.txt")).unwrap();
        f.write_all(b"content").unwrap();
        drop(f);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(version.get() >= 1);

        handle.abort();
    }
}
