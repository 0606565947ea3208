//! The manifest JSON schema published by documentation projects.
//!
//! Each search property publishes one manifest enumerating its documents.
//! Parsing is tolerant at the fleet level — a malformed manifest is recorded
//! as a sync error and skipped — but strict per manifest: required fields
//! must be present and well-typed.

use crate::error::ManifestError;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static MANIFEST_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^/]+)\.json$").unwrap());

/// One search property's manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Base URL for every document in this property. Trailing slashes are
    /// stripped so that slug concatenation yields exactly one separator.
    pub url: String,

    /// Alternate tags that resolve to this property.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Whether this property's documents participate in unfiltered search.
    #[serde(default)]
    pub include_in_global_search: bool,

    /// The documents to index.
    pub documents: Vec<ManifestDocument>,
}

/// A single document within a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    /// Path component appended to the manifest's base URL.
    #[serde(default)]
    pub slug: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub preview: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub tags: String,

    /// Section headings; joined by a single space before indexing.
    #[serde(default)]
    pub headings: Vec<String>,

    /// Outgoing document URLs, used to build the link graph.
    #[serde(default)]
    pub links: Vec<String>,

    /// Ranking weight multiplier for this document.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl Manifest {
    /// Parse a manifest body, attributing failures to `search_property`.
    pub fn parse(search_property: &str, body: &str) -> Result<Self, ManifestError> {
        let mut manifest: Self =
            serde_json::from_str(body).map_err(|e| ManifestError::Parse {
                search_property: search_property.to_owned(),
                reason: e.to_string(),
            })?;

        while manifest.url.ends_with('/') {
            manifest.url.pop();
        }

        Ok(manifest)
    }
}

impl ManifestDocument {
    /// The document's full URL under the manifest's base URL.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url, self.slug.trim_start_matches('/'))
    }

    /// Headings as a single indexable string.
    pub fn joined_headings(&self) -> String {
        self.headings.join(" ")
    }
}

/// Derive the search property tag from a listing filename.
///
/// Fetchers report entries by path; only `<property>.json` basenames are
/// manifests. Anything else is a per-sync error, not a fatal one.
pub fn search_property_from_path(path: &str) -> Result<&str, ManifestError> {
    MANIFEST_FILENAME
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ManifestError::BadFilename {
            path: path.to_owned(),
        })
}
