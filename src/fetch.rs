//! The manifest-fetcher contract.
//!
//! Actual fetchers (a filesystem walker, an object-store lister) live with
//! the embedder. The core only requires the listing shape: one body per
//! manifest, its modification time, and the search property derived from
//! the filename (see [`crate::manifest::search_property_from_path`]).
//! Entries with non-manifest filenames should be reported as sync errors
//! without aborting the fetch.

use crate::error::Result;
use std::future::Future;
use std::time::SystemTime;

/// Listings beyond this many objects are truncated by the upstream store;
/// pagination is unsupported, so such a sync is fatal.
pub const MAX_LISTING: usize = 1000;

/// One fetched manifest, ready for parsing.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub body: String,
    pub last_modified: SystemTime,
    /// Derived from the listing filename (`<property>.json`).
    pub search_property: String,
}

/// Produces the current set of manifests for a sync.
pub trait ManifestFetcher: Send + Sync {
    /// Fetch every manifest from the configured source.
    ///
    /// A failure here aborts the sync; per-manifest problems should instead
    /// be folded into the returned list (skip the entry) or left to the
    /// parser, which records them without stopping the sync.
    fn fetch(&self) -> impl Future<Output = Result<Vec<FetchedManifest>>> + Send;
}
