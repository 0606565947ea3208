//! Centralized error handling with typed error enums.
//!
//! Errors are designed to:
//! - Provide detailed context via Debug for logging (`{:?}`)
//! - Provide wire-stable strings via Display for the HTTP frontend (`{}`)
//! - Enable pattern matching for programmatic error handling
//!
//! The Display strings of [`SearchError`] and [`SyncError::AlreadyIndexing`]
//! are consumed verbatim by the frontend to pick HTTP status codes; changing
//! them is a wire-protocol change.
//!
//! # Error Hierarchy
//!
//! ```text
//! SearchError    - request admission and query execution
//! SyncError      - manifest ingestion and worker rebuilds
//! ConfigError    - startup configuration (fatal)
//! ManifestError  - per-manifest parse failures (recorded, not fatal)
//! ```

use thiserror::Error;

/// A specialized Result type for marian operations.
///
/// This is an alias for `anyhow::Result` with context added via `.context()`
/// and `.with_context()` methods throughout the codebase.
pub type Result<T> = anyhow::Result<T>;

/// Errors surfaced to a search client.
///
/// Every variant renders as its wire-stable error string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// No index generation has been installed into the worker yet.
    #[error("still-indexing")]
    StillIndexing,

    /// The query contained more terms than the engine accepts.
    #[error("query-too-long")]
    QueryTooLong,

    /// The query contained no recognizable terms.
    #[error("empty-query")]
    EmptyQuery,

    /// The chosen worker's backlog exceeded the admission limit.
    #[error("backlog-exceeded")]
    BacklogExceeded,

    /// Every worker is suspended; nothing can take the request.
    #[error("pool-unavailable")]
    PoolUnavailable,

    /// The worker's thread has died and could not be restarted.
    #[error("Worker not running")]
    WorkerNotRunning,
}

impl SearchError {
    /// The HTTP status code the frontend should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::StillIndexing | Self::BacklogExceeded | Self::PoolUnavailable => 503,
            Self::QueryTooLong | Self::EmptyQuery => 400,
            Self::WorkerNotRunning => 500,
        }
    }

    /// Whether a client may retry the identical request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StillIndexing | Self::BacklogExceeded | Self::PoolUnavailable
        )
    }
}

/// Errors raised while ingesting manifests into the pool.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync is already running; the frontend treats this as accepted.
    #[error("already-indexing")]
    AlreadyIndexing,

    /// The manifest fetcher failed outright; nothing was indexed.
    #[error("manifest fetch failed: {reason}")]
    Fetch { reason: String },

    /// The fetcher returned more objects than a single listing supports.
    /// Pagination is unsupported, so this is fatal to the sync.
    #[error("manifest listing truncated at {count} objects (limit {limit})")]
    TruncatedListing { count: usize, limit: usize },
}

impl SyncError {
    /// The HTTP status code the frontend should answer with.
    ///
    /// `already-indexing` maps to 200: the work the client asked for is
    /// running.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AlreadyIndexing => 200,
            Self::Fetch { .. } | Self::TruncatedListing { .. } => 500,
        }
    }
}

/// Fatal configuration errors, detected at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The manifest source string is neither `bucket:` nor `dir:`.
    #[error("unknown manifest source '{value}': expected bucket:<bucket>/<prefix> or dir:<path>")]
    UnknownSource { value: String },

    /// A `bucket:` source with an empty bucket name.
    #[error("manifest source has an empty bucket")]
    EmptyBucket,

    /// A `bucket:` source with an empty prefix.
    #[error("manifest source has an empty prefix")]
    EmptyPrefix,

    /// A `dir:` source with an empty path.
    #[error("manifest source has an empty path")]
    EmptyPath,

    /// The pool cannot run with zero workers.
    #[error("worker pool size must be at least 1")]
    EmptyPool,
}

/// Per-manifest failures, accumulated in the sync error list rather than
/// aborting the sync.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest body was not valid manifest JSON.
    #[error("failed to parse manifest '{search_property}': {reason}")]
    Parse {
        search_property: String,
        reason: String,
    },

    /// A listing entry whose filename does not look like a manifest.
    #[error("not a manifest filename: {path}")]
    BadFilename { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn wire_strings_are_stable() {
        check!(SearchError::StillIndexing.to_string() == "still-indexing");
        check!(SearchError::QueryTooLong.to_string() == "query-too-long");
        check!(SearchError::BacklogExceeded.to_string() == "backlog-exceeded");
        check!(SearchError::PoolUnavailable.to_string() == "pool-unavailable");
        check!(SearchError::WorkerNotRunning.to_string() == "Worker not running");
        check!(SyncError::AlreadyIndexing.to_string() == "already-indexing");
    }

    #[test]
    fn status_codes_match_the_frontend_contract() {
        check!(SearchError::StillIndexing.http_status() == 503);
        check!(SearchError::BacklogExceeded.http_status() == 503);
        check!(SearchError::PoolUnavailable.http_status() == 503);
        check!(SearchError::QueryTooLong.http_status() == 400);
        check!(SyncError::AlreadyIndexing.http_status() == 200);
    }

    #[test]
    fn admission_errors_are_retryable() {
        check!(SearchError::BacklogExceeded.is_retryable());
        check!(!SearchError::QueryTooLong.is_retryable());
    }
}
