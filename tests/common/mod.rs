//! Shared fixtures for integration tests.
//!
//! The reference corpus is two small manifests, `atlas-master` and
//! `bi-connector-master`, fed through an in-memory fetcher so tests drive
//! the real coordinator/pool/worker path without touching the filesystem.

#![allow(dead_code)]

use marian::fetch::{FetchedManifest, ManifestFetcher};
use marian::{Coordinator, Pool, PoolConfig};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Notify;

pub const ATLAS_MANIFEST: &str = r#"{
    "url": "https://docs.atlas.test/",
    "aliases": ["atlas"],
    "includeInGlobalSearch": true,
    "documents": [
        {
            "slug": "connect/compass",
            "title": "Connect via Compass",
            "preview": "Use MongoDB Compass to explore your cluster.",
            "text": "Open the connect dialog and choose Compass to browse documents in your cluster.",
            "headings": ["Open the Connect Dialog"],
            "links": []
        },
        {
            "slug": "connect/driver",
            "title": "Connect via Driver",
            "preview": "Connect your application with a driver.",
            "text": "Open the connect dialog to copy your connection string. Compass users can paste it too.",
            "headings": [],
            "links": ["https://docs.atlas.test/connect/compass"]
        },
        {
            "slug": "deploy",
            "title": "Deploy a Cluster",
            "preview": "Provision a new cluster.",
            "text": "Deploy a cluster and connect monitoring tools to it.",
            "headings": [],
            "links": []
        }
    ]
}"#;

pub const BI_CONNECTOR_MANIFEST: &str = r#"{
    "url": "https://docs.bi.test/",
    "includeInGlobalSearch": true,
    "documents": [
        {
            "slug": "connect/shell",
            "title": "Connect via SQL Shell",
            "preview": "Query the BI connector from a SQL shell.",
            "text": "The BI connector accepts SQL clients. Open the connect dialog and copy the hostname, then launch compass or your shell with those connection details to explore the schema mapping.",
            "headings": [],
            "links": ["https://docs.atlas.test/connect/compass"]
        },
        {
            "slug": "supported-sql",
            "title": "Supported SQL Expressions",
            "preview": "SQL support reference.",
            "text": "This page lists officially supported expressions for the connector."
        }
    ]
}"#;

/// Serves a fixed set of manifest bodies.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    manifests: Vec<(String, String)>,
}

impl StaticFetcher {
    pub fn new(manifests: &[(&str, &str)]) -> Self {
        Self {
            manifests: manifests
                .iter()
                .map(|(property, body)| ((*property).to_owned(), (*body).to_owned()))
                .collect(),
        }
    }

    pub fn reference_corpus() -> Self {
        Self::new(&[
            ("atlas-master", ATLAS_MANIFEST),
            ("bi-connector-master", BI_CONNECTOR_MANIFEST),
        ])
    }
}

impl ManifestFetcher for StaticFetcher {
    async fn fetch(&self) -> marian::Result<Vec<FetchedManifest>> {
        Ok(self
            .manifests
            .iter()
            .map(|(property, body)| FetchedManifest {
                body: body.clone(),
                last_modified: SystemTime::now(),
                search_property: property.clone(),
            })
            .collect())
    }
}

/// Always fails, for fetch-error propagation tests.
#[derive(Debug)]
pub struct FailingFetcher;

impl ManifestFetcher for FailingFetcher {
    async fn fetch(&self) -> marian::Result<Vec<FetchedManifest>> {
        anyhow::bail!("bucket listing timed out")
    }
}

/// Waits for a notification before serving, so tests can observe a sync
/// mid-flight.
#[derive(Debug)]
pub struct GatedFetcher {
    inner: StaticFetcher,
    pub gate: Arc<Notify>,
}

impl GatedFetcher {
    pub fn reference_corpus() -> Self {
        Self {
            inner: StaticFetcher::reference_corpus(),
            gate: Arc::new(Notify::new()),
        }
    }
}

impl ManifestFetcher for GatedFetcher {
    async fn fetch(&self) -> marian::Result<Vec<FetchedManifest>> {
        self.gate.notified().await;
        self.inner.fetch().await
    }
}

/// A coordinator over the reference corpus with a default-size pool,
/// already synced.
pub async fn synced_coordinator() -> Coordinator<StaticFetcher> {
    let coordinator = Coordinator::new(
        StaticFetcher::reference_corpus(),
        Pool::new(&PoolConfig::default(), None),
    );
    coordinator.load().await.expect("reference corpus should sync");
    coordinator
}
