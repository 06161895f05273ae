use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::worker::IndexJob;

/// Trailing debounce window per path.
const DEBOUNCE: Duration = Duration::from_millis(200);

enum Raw {
    Event { path: PathBuf, remove: bool },
    Failed(String),
}

/// Watches the vault for markdown changes and forwards debounced index jobs
/// to the index worker. A fatal watcher error is reported once via the error
/// callback; events after that are suppressed.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    handle: Option<JoinHandle<()>>,
}

impl VaultWatcher {
    pub fn start(
        root: &Path,
        jobs: Sender<IndexJob>,
        on_error: impl Fn(String) + Send + 'static,
    ) -> notify::Result<VaultWatcher> {
        let (raw_tx, raw_rx) = mpsc::channel::<Raw>();

        let event_tx = raw_tx.clone();
        let root_owned = root.to_path_buf();
        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        let _ = event_tx.send(Raw::Failed(e.to_string()));
                        return;
                    }
                };
                let remove = matches!(event.kind, EventKind::Remove(_));
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                for path in event.paths {
                    if !is_relevant(&root_owned, &path) {
                        continue;
                    }
                    let _ = event_tx.send(Raw::Event { path, remove });
                }
            },
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        // Debounce thread: trailing 200ms timer per path. Dropping the
        // watcher closes the raw channel, which ends this thread.
        let handle = thread::spawn(move || {
            let mut pending: HashMap<PathBuf, (Instant, bool)> = HashMap::new();
            let mut failed = false;

            loop {
                let timeout = pending
                    .values()
                    .map(|(deadline, _)| deadline.saturating_duration_since(Instant::now()))
                    .min()
                    .unwrap_or(Duration::from_secs(3600));

                match raw_rx.recv_timeout(timeout) {
                    Ok(Raw::Event { path, remove }) => {
                        if failed {
                            continue;
                        }
                        let entry = pending
                            .entry(path)
                            .or_insert((Instant::now() + DEBOUNCE, remove));
                        entry.0 = Instant::now() + DEBOUNCE;
                        entry.1 = entry.1 || remove;
                    }
                    Ok(Raw::Failed(err)) => {
                        if !failed {
                            failed = true;
                            pending.clear();
                            on_error(err);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }

                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (deadline, _))| *deadline <= now)
                    .map(|(p, _)| p.clone())
                    .collect();
                for path in due {
                    let Some((_, remove)) = pending.remove(&path) else {
                        continue;
                    };
                    let job = if remove || !path.exists() {
                        IndexJob::Remove(path)
                    } else {
                        IndexJob::File(path)
                    };
                    if jobs.send(job).is_err() {
                        return; // index worker is gone
                    }
                }
            }
        });

        Ok(VaultWatcher {
            _watcher: watcher,
            handle: Some(handle),
        })
    }

    /// Stop watching. Pending debounce timers are dropped.
    pub fn stop(mut self) {
        // Dropping the notify watcher closes its event stream; the debounce
        // thread exits when the raw channel disconnects.
        drop(self._watcher);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Markdown files only, never inside hidden directories (.kopr included).
fn is_relevant(root: &Path, path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return false;
    }
    let rel = path.strip_prefix(root).unwrap_or(path);
    !rel.components().any(|c| match c {
        Component::Normal(name) => name.to_str().is_some_and(|n| n.starts_with('.')),
        _ => false,
    })
}
