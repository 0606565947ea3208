//! The balancing worker pool.
//!
//! The pool is a scheduling table, not a thread pool: each entry is a
//! long-lived worker owning its own index replica. Dispatch picks the
//! eligible worker with the smallest backlog (ties break by declaration
//! order); backlog gating is the only flow control — there are no timeouts
//! and no mid-request cancellation.

use crate::config::PoolConfig;
use crate::error::SearchError;
use crate::fetch::FetchedManifest;
use crate::search::searcher::SearchResults;
use crate::spelling::SpellingDictionary;
use crate::worker::{SyncOutcome, Worker};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Requests beyond this backlog are rejected outright.
pub const MAXIMUM_BACKLOG: usize = 20;

/// Above this backlog, searches degrade to skipping the HITS pass.
pub const WARNING_BACKLOG: usize = 15;

/// One worker's entry in the status report: its backlog, `"s"` while
/// suspended, or `"d"` once dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Backlog(usize),
    Suspended,
    Dead,
}

impl Serialize for WorkerStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Backlog(depth) => serializer.serialize_u64(*depth as u64),
            Self::Suspended => serializer.serialize_str("s"),
            Self::Dead => serializer.serialize_str("d"),
        }
    }
}

/// A fixed set of workers and the dispatch policy over them.
pub struct Pool {
    workers: Vec<Worker>,
    next_request_id: AtomicU64,
}

impl Pool {
    /// Spawn `config.workers` workers, each with its own copy of the
    /// spelling dictionary.
    pub fn new(config: &PoolConfig, dictionary: Option<Arc<dyn SpellingDictionary>>) -> Self {
        let workers = (0..config.workers)
            .map(|ordinal| Worker::spawn(ordinal, dictionary.clone()))
            .collect();
        Self {
            workers,
            next_request_id: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// The eligible worker with the smallest backlog, ties broken by
    /// declaration order.
    fn get(&self) -> Result<&Worker, SearchError> {
        self.workers
            .iter()
            .filter(|worker| !worker.is_suspended() && !worker.is_dead())
            .min_by_key(|worker| worker.backlog())
            .ok_or(SearchError::PoolUnavailable)
    }

    /// Route a search to the least-loaded worker.
    ///
    /// Admission control happens here: an over-backlog worker rejects the
    /// request before it is ever sent, and a warning-level backlog downgrades
    /// the request to skip HITS.
    pub async fn search(
        &self,
        query: &str,
        search_properties: &[String],
        use_hits: bool,
    ) -> Result<SearchResults, SearchError> {
        let worker = self.get()?;
        let backlog = worker.backlog();
        if backlog > MAXIMUM_BACKLOG {
            return Err(SearchError::BacklogExceeded);
        }

        let degraded = backlog > WARNING_BACKLOG;
        if degraded {
            tracing::warn!(
                worker = worker.ordinal(),
                backlog,
                "backlog past warning level, skipping HITS"
            );
        }

        worker
            .search(
                self.next_request_id(),
                query.to_owned(),
                search_properties.to_vec(),
                use_hits && !degraded,
            )
            .await
    }

    /// Rebuild one worker's index from a manifest snapshot. The caller is
    /// expected to have suspended the worker first.
    pub(crate) async fn sync_worker(
        &self,
        index: usize,
        manifests: Arc<Vec<FetchedManifest>>,
    ) -> Result<SyncOutcome, SearchError> {
        self.workers[index]
            .sync(self.next_request_id(), manifests)
            .await
    }

    /// Mark a worker ineligible for new requests. In-flight requests keep
    /// running.
    pub fn suspend(&self, index: usize) {
        self.workers[index].suspend();
    }

    pub fn resume(&self, index: usize) {
        self.workers[index].resume();
    }

    /// One status entry per worker, in declaration order.
    pub fn status(&self) -> Vec<WorkerStatus> {
        self.workers
            .iter()
            .map(|worker| {
                if worker.is_dead() {
                    WorkerStatus::Dead
                } else if worker.is_suspended() {
                    WorkerStatus::Suspended
                } else {
                    WorkerStatus::Backlog(worker.backlog())
                }
            })
            .collect()
    }

    /// Whether any worker has been marked dead (the status endpoint turns
    /// this into a 500).
    pub fn has_dead_worker(&self) -> bool {
        self.workers.iter().any(Worker::is_dead)
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn kill_worker_for_test(&self, index: usize) {
        self.workers[index].kill_for_test();
    }
}
