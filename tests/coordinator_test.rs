mod common;

use assert2::check;
use common::{FailingFetcher, GatedFetcher, StaticFetcher, synced_coordinator};
use marian::fetch::{FetchedManifest, ManifestFetcher};
use marian::{Coordinator, Pool, PoolConfig, SearchError, SyncError, WorkerStatus};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[tokio::test(flavor = "multi_thread")]
async fn load_publishes_manifest_tags_and_sync_date() {
    let coordinator = synced_coordinator().await;

    let status = coordinator.status().await;
    check!(status.manifests == vec!["atlas-master".to_owned(), "bi-connector-master".to_owned()]);
    check!(status.last_sync.errors.is_empty());
    check!(status.last_sync.finished.is_some());
    check!(status.workers == vec![WorkerStatus::Backlog(0), WorkerStatus::Backlog(0)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn searching_before_any_sync_is_still_indexing() {
    let coordinator = Coordinator::new(
        StaticFetcher::reference_corpus(),
        Pool::new(&PoolConfig::default(), None),
    );

    let err = coordinator.search("connect", &[]).await.unwrap_err();
    check!(err == SearchError::StillIndexing);
    check!(err.http_status() == 503);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_loads_are_refused() {
    let fetcher = GatedFetcher::reference_corpus();
    let gate = fetcher.gate.clone();
    let coordinator = Arc::new(Coordinator::new(
        fetcher,
        Pool::new(&PoolConfig::default(), None),
    ));

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.load().await })
    };

    // Give the first load time to take the indexing flag and block on the
    // fetcher gate.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = coordinator.load().await;
    check!(matches!(second, Err(SyncError::AlreadyIndexing)));

    gate.notify_one();
    first.await.unwrap().unwrap();

    // With the first load finished, the flag is clear again.
    gate.notify_one();
    check!(coordinator.load().await.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_failures_abort_the_sync_and_clear_the_flag() {
    let coordinator = Coordinator::new(FailingFetcher, Pool::new(&PoolConfig::default(), None));

    let err = coordinator.load().await.unwrap_err();
    check!(matches!(err, SyncError::Fetch { .. }));
    check!(err.to_string().contains("bucket listing timed out"));

    // The failure must not leave `already-indexing` latched.
    let err = coordinator.load().await.unwrap_err();
    check!(matches!(err, SyncError::Fetch { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_manifests_are_recorded_but_not_fatal() {
    let fetcher = StaticFetcher::new(&[
        ("atlas-master", common::ATLAS_MANIFEST),
        ("broken-master", "{ this is not json"),
    ]);
    let coordinator = Coordinator::new(fetcher, Pool::new(&PoolConfig::default(), None));
    coordinator.load().await.unwrap();

    let status = coordinator.status().await;
    check!(status.manifests == vec!["atlas-master".to_owned()]);
    check!(status.last_sync.errors.len() == 1);
    check!(status.last_sync.errors[0].contains("broken-master"));

    // The healthy manifest is searchable regardless.
    let found = coordinator
        .search("\"connect dialog\" compass", &[])
        .await
        .unwrap();
    check!(!found.results.is_empty());
}

struct HugeListingFetcher;

impl ManifestFetcher for HugeListingFetcher {
    async fn fetch(&self) -> marian::Result<Vec<FetchedManifest>> {
        Ok((0..1001)
            .map(|i| FetchedManifest {
                body: "{}".to_owned(),
                last_modified: SystemTime::now(),
                search_property: format!("property-{i}"),
            })
            .collect())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn truncated_listings_are_fatal() {
    let coordinator =
        Coordinator::new(HugeListingFetcher, Pool::new(&PoolConfig::default(), None));

    let err = coordinator.load().await.unwrap_err();
    check!(matches!(
        err,
        SyncError::TruncatedListing { count: 1001, limit: 1000 }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn all_workers_suspended_is_pool_unavailable() {
    let coordinator = synced_coordinator().await;

    coordinator.pool().suspend(0);
    coordinator.pool().suspend(1);

    let err = coordinator.search("connect", &[]).await.unwrap_err();
    check!(err == SearchError::PoolUnavailable);
    check!(err.http_status() == 503);

    let status = coordinator.status().await;
    check!(status.workers == vec![WorkerStatus::Suspended, WorkerStatus::Suspended]);

    coordinator.pool().resume(0);
    coordinator.pool().resume(1);
    check!(coordinator.search("connect", &[]).await.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn if_modified_since_compares_at_seconds_precision() {
    let coordinator = synced_coordinator().await;
    let last_sync = coordinator.last_sync_date().await.unwrap();

    // A client exactly as fresh as the last sync is current.
    check!(coordinator.is_not_modified(last_sync).await);
    check!(
        coordinator
            .is_not_modified(last_sync + Duration::from_secs(60))
            .await
    );

    // A stale client gets a full response, and so does Date(0).
    check!(
        !coordinator
            .is_not_modified(last_sync - Duration::from_secs(60))
            .await
    );
    check!(!coordinator.is_not_modified(UNIX_EPOCH).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn before_any_sync_nothing_is_current() {
    let coordinator = Coordinator::new(
        StaticFetcher::reference_corpus(),
        Pool::new(&PoolConfig::default(), None),
    );
    check!(!coordinator.is_not_modified(SystemTime::now()).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn reloading_replaces_the_generation() {
    let coordinator = synced_coordinator().await;
    let first_sync = coordinator.last_sync_date().await.unwrap();

    coordinator.load().await.unwrap();
    let second_sync = coordinator.last_sync_date().await.unwrap();
    check!(second_sync >= first_sync);

    // Searches keep working against the new generation.
    let found = coordinator
        .search("\"connect dialog\" compass", &[])
        .await
        .unwrap();
    check!(found.results.len() == 3);
}
