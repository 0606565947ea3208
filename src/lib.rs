#![warn(unreachable_pub)]
#![warn(dead_code)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod pool;
pub mod search;
pub mod spelling;
pub mod tracing;
pub mod worker;

// Re-export common types
pub use config::{ManifestSource, PoolConfig};
pub use coordinator::{Coordinator, StatusReport, SyncStatus};
pub use error::{ConfigError, ManifestError, Result, SearchError, SyncError};
pub use fetch::{FetchedManifest, ManifestFetcher};
pub use manifest::{Manifest, ManifestDocument};
pub use pool::{MAXIMUM_BACKLOG, Pool, WARNING_BACKLOG, WorkerStatus};
pub use search::{FTSIndex, Query, SearchResult, SearchResults, Searcher};
pub use spelling::{FuzzyDictionary, SpellingDictionary};
pub use worker::SyncOutcome;
