pub mod db;
pub mod indexer;
pub mod search;
pub mod watcher;
pub mod worker;

pub use db::{Index, IndexError, canonical_basename_key};
pub use indexer::Indexer;
pub use search::{BacklinkResult, HeadingResult, SearchResult};
pub use watcher::VaultWatcher;
pub use worker::{IndexEvent, IndexJob, IndexWorker};
