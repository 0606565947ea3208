//! The task worker: a dedicated OS thread owning one complete index
//! replica.
//!
//! Communication is strictly by message passing. The front end sends
//! [`Task`]s down an mpsc inbox; the worker processes them one at a time,
//! in order, and answers over per-request oneshot channels. Within a
//! request the worker runs to completion without yielding, so a rebuild is
//! atomic from the perspective of that worker's searches.
//!
//! A worker whose thread has died is respawned on the next dispatch; a
//! second death within [`MINIMUM_RESTART_INTERVAL`] marks it dead for good.

use crate::error::SearchError;
use crate::fetch::FetchedManifest;
use crate::manifest::Manifest;
use crate::search::index::{DocumentInput, FTSIndex};
use crate::search::searcher::{SearchResults, Searcher};
use crate::spelling::SpellingDictionary;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// A worker that cannot stay up this long between failures is dead.
const MINIMUM_RESTART_INTERVAL: Duration = Duration::from_secs(30);

/// What a rebuild produced: the property tags now indexed, and whatever
/// went wrong along the way.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub manifests: Vec<String>,
    pub errors: Vec<String>,
}

/// A message to a worker. Request ids are monotonically increasing across
/// the pool so replies can be attributed in traces.
pub(crate) enum Task {
    Search {
        request_id: u64,
        query: String,
        search_properties: Vec<String>,
        use_hits: bool,
        reply: oneshot::Sender<Result<SearchResults, SearchError>>,
    },
    Sync {
        request_id: u64,
        manifests: Arc<Vec<FetchedManifest>>,
        reply: oneshot::Sender<SyncOutcome>,
    },
}

struct Runtime {
    tx: mpsc::Sender<Task>,
    spawned_at: Instant,
    dead: bool,
}

/// Handle to one worker thread.
pub(crate) struct Worker {
    ordinal: usize,
    backlog: Arc<AtomicUsize>,
    suspended: AtomicBool,
    dictionary: Option<Arc<dyn SpellingDictionary>>,
    runtime: Mutex<Runtime>,
}

impl Worker {
    pub(crate) fn spawn(
        ordinal: usize,
        dictionary: Option<Arc<dyn SpellingDictionary>>,
    ) -> Self {
        let backlog = Arc::new(AtomicUsize::new(0));
        let tx = spawn_thread(ordinal, backlog.clone(), dictionary.clone());
        Self {
            ordinal,
            backlog,
            suspended: AtomicBool::new(false),
            dictionary,
            runtime: Mutex::new(Runtime {
                tx,
                spawned_at: Instant::now(),
                dead: false,
            }),
        }
    }

    pub(crate) fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Requests sent and not yet replied to.
    pub(crate) fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Stop routing new requests here. In-flight requests are unaffected.
    pub(crate) fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    pub(crate) fn resume(&self) {
        self.suspended.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.runtime.lock().expect("worker runtime lock poisoned").dead
    }

    #[cfg(test)]
    pub(crate) fn add_backlog_for_test(&self) {
        self.backlog.fetch_add(1, Ordering::SeqCst);
    }

    /// Simulate the worker thread dying: swap in a sender whose receiver is
    /// already gone, so the next dispatch fails and the restart policy
    /// (fresh spawn, still within the minimum interval) marks it dead.
    #[cfg(test)]
    pub(crate) fn kill_for_test(&self) {
        let mut runtime = self.runtime.lock().expect("worker runtime lock poisoned");
        let (tx, _) = mpsc::channel();
        runtime.tx = tx;
    }

    pub(crate) async fn search(
        &self,
        request_id: u64,
        query: String,
        search_properties: Vec<String>,
        use_hits: bool,
    ) -> Result<SearchResults, SearchError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Task::Search {
            request_id,
            query,
            search_properties,
            use_hits,
            reply,
        })?;
        rx.await.map_err(|_| SearchError::WorkerNotRunning)?
    }

    pub(crate) async fn sync(
        &self,
        request_id: u64,
        manifests: Arc<Vec<FetchedManifest>>,
    ) -> Result<SyncOutcome, SearchError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Task::Sync {
            request_id,
            manifests,
            reply,
        })?;
        rx.await.map_err(|_| SearchError::WorkerNotRunning)
    }

    /// Enqueue a task, respawning the thread if it has died. Backlog is
    /// incremented on a successful send and decremented by the worker after
    /// processing.
    fn dispatch(&self, task: Task) -> Result<(), SearchError> {
        let mut runtime = self.runtime.lock().expect("worker runtime lock poisoned");
        if runtime.dead {
            return Err(SearchError::WorkerNotRunning);
        }

        let task = match runtime.tx.send(task) {
            Ok(()) => {
                self.backlog.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            Err(mpsc::SendError(task)) => task,
        };

        // The receiving thread is gone. If it died shortly after its last
        // start, give up on this worker entirely.
        if runtime.spawned_at.elapsed() < MINIMUM_RESTART_INTERVAL {
            runtime.dead = true;
            tracing::error!(worker = self.ordinal, "worker died twice in quick succession, marking dead");
            return Err(SearchError::WorkerNotRunning);
        }

        tracing::warn!(worker = self.ordinal, "worker thread died, respawning");
        self.backlog.store(0, Ordering::SeqCst);
        runtime.tx = spawn_thread(self.ordinal, self.backlog.clone(), self.dictionary.clone());
        runtime.spawned_at = Instant::now();

        match runtime.tx.send(task) {
            Ok(()) => {
                self.backlog.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(_) => {
                runtime.dead = true;
                tracing::error!(worker = self.ordinal, "respawned worker rejected its first task, marking dead");
                Err(SearchError::WorkerNotRunning)
            }
        }
    }
}

fn spawn_thread(
    ordinal: usize,
    backlog: Arc<AtomicUsize>,
    dictionary: Option<Arc<dyn SpellingDictionary>>,
) -> mpsc::Sender<Task> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("marian-worker-{ordinal}"))
        .spawn(move || worker_loop(ordinal, &rx, &backlog, dictionary))
        .expect("failed to spawn worker thread");
    tx
}

/// The worker's message loop. Replies to disconnected clients are simply
/// discarded; a request is never cancelled mid-flight.
fn worker_loop(
    ordinal: usize,
    rx: &mpsc::Receiver<Task>,
    backlog: &AtomicUsize,
    dictionary: Option<Arc<dyn SpellingDictionary>>,
) {
    let mut searcher = Searcher::new(dictionary);

    while let Ok(task) = rx.recv() {
        match task {
            Task::Search {
                request_id,
                query,
                search_properties,
                use_hits,
                reply,
            } => {
                let result = searcher.search(&query, &search_properties, use_hits);
                backlog.fetch_sub(1, Ordering::SeqCst);
                tracing::trace!(worker = ordinal, request_id, "search reply ready");
                let _ = reply.send(result);
            }
            Task::Sync {
                request_id,
                manifests,
                reply,
            } => {
                let outcome = rebuild(&mut searcher, &manifests);
                backlog.fetch_sub(1, Ordering::SeqCst);
                tracing::info!(
                    worker = ordinal,
                    request_id,
                    properties = outcome.manifests.len(),
                    errors = outcome.errors.len(),
                    "rebuild complete"
                );
                let _ = reply.send(outcome);
            }
        }
    }

    tracing::debug!(worker = ordinal, "worker inbox closed, exiting");
}

/// Build a fresh index generation from a manifest snapshot and install it.
///
/// Malformed manifests are recorded and skipped; the rest still index.
fn rebuild(searcher: &mut Searcher, manifests: &[FetchedManifest]) -> SyncOutcome {
    let mut index = FTSIndex::with_default_fields();
    let mut errors = Vec::new();

    for fetched in manifests {
        let manifest = match Manifest::parse(&fetched.search_property, &fetched.body) {
            Ok(manifest) => manifest,
            Err(error) => {
                errors.push(error.to_string());
                continue;
            }
        };

        for alias in &manifest.aliases {
            index.alias_search_property(alias, &fetched.search_property);
        }

        for document in &manifest.documents {
            index.add(DocumentInput {
                url: document.url(&manifest.url),
                title: document.title.clone(),
                preview: document.preview.clone(),
                headings: document.joined_headings(),
                text: document.text.clone(),
                tags: document.tags.clone(),
                links: document.links.clone(),
                weight: document.weight,
                include_in_global_search: manifest.include_in_global_search,
                search_property: fetched.search_property.clone(),
            });
        }
    }

    index.build();
    let mut tags: Vec<String> = index.manifests().iter().cloned().collect();
    tags.sort_unstable();

    searcher.install(index);

    SyncOutcome {
        manifests: tags,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use std::time::SystemTime;

    fn fetched(property: &str, body: &str) -> FetchedManifest {
        FetchedManifest {
            body: body.to_owned(),
            last_modified: SystemTime::now(),
            search_property: property.to_owned(),
        }
    }

    #[test]
    fn rebuild_skips_broken_manifests_but_indexes_the_rest() {
        let mut searcher = Searcher::new(None);
        let manifests = vec![
            fetched("broken-master", "{not json"),
            fetched(
                "manual-master",
                r#"{"url": "https://docs.test/manual",
                    "includeInGlobalSearch": true,
                    "documents": [{"slug": "sharding", "title": "Sharding",
                                   "text": "shard all the things"}]}"#,
            ),
        ];

        let outcome = rebuild(&mut searcher, &manifests);
        check!(outcome.manifests == vec!["manual-master".to_owned()]);
        check!(outcome.errors.len() == 1);
        check!(outcome.errors[0].contains("broken-master"));

        let found = searcher.search("sharding", &[], true).unwrap();
        check!(found.results.len() == 1);
    }

    #[tokio::test]
    async fn worker_answers_searches_after_a_sync() {
        let worker = Worker::spawn(0, None);

        let early = worker.search(1, "sharding".to_owned(), vec![], true).await;
        check!(early == Err(SearchError::StillIndexing));

        let manifests = Arc::new(vec![fetched(
            "manual-master",
            r#"{"url": "https://docs.test/manual",
                "includeInGlobalSearch": true,
                "documents": [{"slug": "sharding", "title": "Sharding",
                               "text": "shard all the things"}]}"#,
        )]);
        let outcome = worker.sync(2, manifests).await.unwrap();
        check!(outcome.manifests == vec!["manual-master".to_owned()]);

        let found = worker
            .search(3, "sharding".to_owned(), vec![], true)
            .await
            .unwrap();
        check!(found.results.len() == 1);
        check!(worker.backlog() == 0);
    }
}
