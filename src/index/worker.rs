use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use super::db::Index;
use super::indexer::Indexer;

/// A unit of indexing work, serialized through the worker's channel so at
/// most one store mutation runs at a time.
#[derive(Debug)]
pub enum IndexJob {
    /// Full vault walk (initial index)
    Full,
    /// (Re)index one file by absolute path
    File(PathBuf),
    /// Drop one file from the index by absolute path
    Remove(PathBuf),
}

/// Outcome notifications posted back to the UI loop.
#[derive(Debug)]
pub enum IndexEvent {
    InitDone(Result<(), String>),
    FileIndexed {
        rel_path: String,
        result: Result<bool, String>,
    },
    FileRemoved {
        rel_path: String,
        result: Result<(), String>,
    },
}

/// Background indexing worker. Owns its own database connection; the UI
/// loop keeps a separate read connection and talks to this thread only
/// through the job channel.
pub struct IndexWorker {
    jobs: Sender<IndexJob>,
    handle: Option<JoinHandle<()>>,
}

impl IndexWorker {
    /// Spawn the worker. `on_event` runs on the worker thread and must do
    /// nothing but forward the event into the UI loop's channel.
    pub fn spawn(
        db: Index,
        vault_root: &Path,
        on_event: impl Fn(IndexEvent) + Send + 'static,
    ) -> IndexWorker {
        let (jobs_tx, jobs_rx) = mpsc::channel::<IndexJob>();
        let indexer = Indexer::new(db, vault_root);

        let handle = thread::spawn(move || {
            while let Ok(job) = jobs_rx.recv() {
                match job {
                    IndexJob::Full => {
                        let result = indexer.index_all().map_err(|e| e.to_string());
                        on_event(IndexEvent::InitDone(result));
                    }
                    IndexJob::File(abs) => {
                        let result = indexer.index_file(&abs).map_err(|e| e.to_string());
                        on_event(IndexEvent::FileIndexed {
                            rel_path: indexer.rel_path(&abs),
                            result,
                        });
                    }
                    IndexJob::Remove(abs) => {
                        let result = indexer.remove_file(&abs).map_err(|e| e.to_string());
                        on_event(IndexEvent::FileRemoved {
                            rel_path: indexer.rel_path(&abs),
                            result,
                        });
                    }
                }
            }
        });

        IndexWorker {
            jobs: jobs_tx,
            handle: Some(handle),
        }
    }

    pub fn sender(&self) -> Sender<IndexJob> {
        self.jobs.clone()
    }

    pub fn submit(&self, job: IndexJob) {
        // A send failure means the worker already exited; the app surfaces
        // that separately via the event callback.
        let _ = self.jobs.send(job);
    }

    /// Stop the worker after it drains queued jobs.
    pub fn stop(mut self) {
        drop(self.jobs);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn test_worker_full_then_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "alpha\n").unwrap();

        let db = Index::open(&dir.path().join("index.db")).unwrap();
        let (tx, rx) = channel();
        let worker = IndexWorker::spawn(db, dir.path(), move |ev| {
            let _ = tx.send(ev);
        });

        worker.submit(IndexJob::Full);
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            IndexEvent::InitDone(result) => assert!(result.is_ok()),
            other => panic!("unexpected event: {other:?}"),
        }

        fs::write(dir.path().join("b.md"), "beta\n").unwrap();
        worker.submit(IndexJob::File(dir.path().join("b.md")));
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            IndexEvent::FileIndexed { rel_path, result } => {
                assert_eq!(rel_path, "b.md");
                assert_eq!(result.unwrap(), true);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        worker.stop();
    }

    #[test]
    fn test_worker_remove() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "alpha\n").unwrap();

        let db = Index::open(&dir.path().join("index.db")).unwrap();
        let (tx, rx) = channel();
        let worker = IndexWorker::spawn(db, dir.path(), move |ev| {
            let _ = tx.send(ev);
        });

        worker.submit(IndexJob::File(dir.path().join("a.md")));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.submit(IndexJob::Remove(dir.path().join("a.md")));
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            IndexEvent::FileRemoved { rel_path, result } => {
                assert_eq!(rel_path, "a.md");
                assert!(result.is_ok());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        worker.stop();
    }
}
