//! The index coordinator: manifest ingestion, rebuild orchestration, and
//! status reporting.
//!
//! A sync suspends one worker at a time, rebuilds it synchronously, and
//! resumes it before moving on, so live traffic keeps flowing through the
//! other workers throughout. The coordinator's published state (manifest
//! tags, last sync) is the only process-wide mutable data, and it is only
//! written here.

use crate::error::{SearchError, SyncError};
use crate::fetch::{MAX_LISTING, ManifestFetcher};
use crate::pool::{Pool, WorkerStatus};
use crate::search::searcher::SearchResults;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Outcome of the most recent sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub errors: Vec<String>,
    /// Completion time, as seconds since the epoch on the wire.
    #[serde(serialize_with = "serialize_epoch_seconds")]
    pub finished: Option<SystemTime>,
}

/// The `/status` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub manifests: Vec<String>,
    pub last_sync: SyncStatus,
    pub workers: Vec<WorkerStatus>,
}

#[derive(Debug, Default)]
struct Published {
    manifests: Vec<String>,
    last_sync: SyncStatus,
}

/// Owns the manifest source and the worker pool.
pub struct Coordinator<F> {
    fetcher: F,
    pool: Pool,
    indexing: AtomicBool,
    published: RwLock<Published>,
}

impl<F: ManifestFetcher> Coordinator<F> {
    pub fn new(fetcher: F, pool: Pool) -> Self {
        Self {
            fetcher,
            pool,
            indexing: AtomicBool::new(false),
            published: RwLock::new(Published::default()),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Route a search through the pool.
    pub async fn search(
        &self,
        query: &str,
        search_properties: &[String],
    ) -> Result<SearchResults, SearchError> {
        self.pool.search(query, search_properties, true).await
    }

    /// Fetch manifests and rebuild every worker, one at a time.
    ///
    /// Concurrent calls are refused with `already-indexing`. A fetch
    /// failure aborts the sync (and clears the flag); a failure on one
    /// worker is recorded and the remaining workers still rebuild.
    pub async fn load(&self) -> Result<(), SyncError> {
        if self.indexing.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyIndexing);
        }

        let result = self.load_inner().await;
        self.indexing.store(false, Ordering::SeqCst);
        result
    }

    async fn load_inner(&self) -> Result<(), SyncError> {
        tracing::info!("manifest sync starting");
        let manifests = self
            .fetcher
            .fetch()
            .await
            .map_err(|error| SyncError::Fetch {
                reason: format!("{error:#}"),
            })?;

        if manifests.len() > MAX_LISTING {
            return Err(SyncError::TruncatedListing {
                count: manifests.len(),
                limit: MAX_LISTING,
            });
        }

        let snapshot = Arc::new(manifests);
        // Parse errors are deterministic across workers (every worker
        // chews the same snapshot), so any one worker's list stands in for
        // all of them. Per-worker dispatch failures are not, and must
        // survive a later worker's success, so they accumulate separately.
        let mut parse_errors: Vec<String> = Vec::new();
        let mut worker_errors: Vec<String> = Vec::new();
        let mut published_tags: Vec<String> = Vec::new();

        for index in 0..self.pool.len() {
            self.pool.suspend(index);
            let outcome = self.pool.sync_worker(index, snapshot.clone()).await;
            self.pool.resume(index);

            match outcome {
                Ok(outcome) => {
                    parse_errors = outcome.errors;
                    published_tags = outcome.manifests;
                }
                Err(error) => {
                    tracing::warn!(worker = index, error = %error, "worker rebuild failed");
                    worker_errors.push(format!("worker {index}: {error}"));
                }
            }

            // Advance the sync date between workers so Last-Modified moves
            // as soon as any replica serves the new generation.
            let mut published = self.published.write().await;
            published.last_sync.finished = Some(SystemTime::now());
        }

        let mut errors = parse_errors;
        errors.extend(worker_errors);

        let mut published = self.published.write().await;
        published.manifests = published_tags;
        published.last_sync = SyncStatus {
            errors,
            finished: Some(SystemTime::now()),
        };
        tracing::info!(
            manifests = published.manifests.len(),
            errors = published.last_sync.errors.len(),
            "manifest sync finished"
        );

        Ok(())
    }

    /// The `/status` payload: published tags, last sync, per-worker state.
    pub async fn status(&self) -> StatusReport {
        let published = self.published.read().await;
        StatusReport {
            manifests: published.manifests.clone(),
            last_sync: published.last_sync.clone(),
            workers: self.pool.status(),
        }
    }

    /// When the current generation finished syncing, if ever.
    pub async fn last_sync_date(&self) -> Option<SystemTime> {
        self.published.read().await.last_sync.finished
    }

    /// Whether an `If-Modified-Since` value means the client is current
    /// (seconds precision). The epoch is never considered current, so
    /// clients sending `Date(0)` always get a full response.
    pub async fn is_not_modified(&self, if_modified_since: SystemTime) -> bool {
        if if_modified_since == UNIX_EPOCH {
            return false;
        }
        let Some(last_sync) = self.last_sync_date().await else {
            return false;
        };
        epoch_seconds(if_modified_since) >= epoch_seconds(last_sync)
    }
}

fn epoch_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn serialize_epoch_seconds<S: Serializer>(
    time: &Option<SystemTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match time {
        Some(time) => serializer.serialize_some(&epoch_seconds(*time)),
        None => serializer.serialize_none(),
    }
}
