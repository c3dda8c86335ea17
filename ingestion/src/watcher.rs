//! Debounced filesystem watcher for the `files` source. `notify` delivers
//! raw per-path events from its own thread; they land in a shared pending
//! map keyed by path with the time of the most recent event. A periodic
//! drain (driven by the worker loop) pulls out paths whose last event is
//! older than the configured quiet interval, coalescing edit storms into a
//! single downstream sync trigger.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Mutex;
use tracing::warn;

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    pending: Arc<Mutex<HashMap<PathBuf, Instant>>>,
}

impl FileWatcher {
    /// Starts watching `dirs` recursively; events land in the shared
    /// pending map as they arrive on `notify`'s background thread.
    pub fn start(dirs: &[String]) -> notify::Result<Self> {
        let pending: Arc<Mutex<HashMap<PathBuf, Instant>>> = Arc::new(Mutex::new(HashMap::new()));
        let sink = pending.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "file watcher event error");
                    return;
                }
            };
            let sink = sink.clone();
            let paths = event.paths;
            tokio::spawn(async move {
                let mut pending = sink.lock().await;
                let now = Instant::now();
                for path in paths {
                    pending.insert(path, now);
                }
            });
        })?;

        for dir in dirs {
            watcher.watch(std::path::Path::new(dir), RecursiveMode::Recursive)?;
        }

        Ok(Self { _watcher: watcher, pending })
    }

    /// Removes and returns every path whose last event is older than
    /// `debounce`, i.e. ready to fold into the next sync.
    pub async fn drain_due(&self, debounce: Duration) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        let due: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) >= debounce)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            pending.remove(path);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_due_is_empty_with_no_events() {
        let pending: Arc<Mutex<HashMap<PathBuf, Instant>>> = Arc::new(Mutex::new(HashMap::new()));
        let watcher = FileWatcher {
            _watcher: notify::recommended_watcher(|_res: notify::Result<Event>| {}).unwrap(),
            pending,
        };
        let due = watcher.drain_due(Duration::from_secs(5)).await;
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn drain_due_returns_paths_past_the_quiet_interval() {
        let mut map = HashMap::new();
        map.insert(PathBuf::from("/tmp/a.txt"), Instant::now() - Duration::from_secs(10));
        let pending = Arc::new(Mutex::new(map));
        let watcher = FileWatcher {
            _watcher: notify::recommended_watcher(|_res: notify::Result<Event>| {}).unwrap(),
            pending,
        };
        let due = watcher.drain_due(Duration::from_secs(5)).await;
        assert_eq!(due, vec![PathBuf::from("/tmp/a.txt")]);
    }
}
