//! The searcher facade: everything between a raw query string and the wire
//! payload.
//!
//! A searcher owns at most one installed index generation. Until the first
//! rebuild installs one, every search fails with `still-indexing`. Old
//! generations are dropped only once the last in-flight search releases its
//! reference.

use super::index::FTSIndex;
use super::query::{DocFilter, Query};
use crate::error::SearchError;
use crate::spelling::SpellingDictionary;
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Queries with more terms than this are rejected outright.
pub const MAXIMUM_TERMS: usize = 10;

/// When the best match scores at or below this, the query was probably
/// misspelled; ask the dictionary for alternatives.
const SPELLING_SCORE_THRESHOLD: f32 = 0.6;

/// One entry of the search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub preview: String,
    pub url: String,
}

/// The full search response payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    /// Query term → suggested replacement.
    pub spelling_corrections: BTreeMap<String, String>,
}

/// Drives the index from a parsed query, applying property filters and
/// spell correction.
pub struct Searcher {
    index: Option<Arc<FTSIndex>>,
    dictionary: Option<Arc<dyn SpellingDictionary>>,
}

impl Searcher {
    pub fn new(dictionary: Option<Arc<dyn SpellingDictionary>>) -> Self {
        Self {
            index: None,
            dictionary,
        }
    }

    /// Swap in a freshly built generation. The previous one is released
    /// once no search still holds it.
    pub fn install(&mut self, index: FTSIndex) {
        self.index = Some(Arc::new(index));
    }

    /// Whether a generation has been installed yet.
    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    /// Execute a search.
    ///
    /// `search_properties` restricts results to those (alias-resolved)
    /// corpora; empty means global search over documents that opted in.
    pub fn search(
        &self,
        raw_query: &str,
        search_properties: &[String],
        use_hits: bool,
    ) -> Result<SearchResults, SearchError> {
        let index = self.index.as_ref().ok_or(SearchError::StillIndexing)?;

        let mut query = Query::parse(raw_query);
        if query.terms.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if query.terms.len() > MAXIMUM_TERMS {
            return Err(SearchError::QueryTooLong);
        }

        query.filter = if search_properties.is_empty() {
            DocFilter::GlobalSearch
        } else {
            let resolved: AHashSet<String> = search_properties
                .iter()
                .map(|tag| index.resolve_alias(tag).to_owned())
                .collect();
            DocFilter::Properties(resolved)
        };

        let matches = index.search(&query, use_hits);
        let top_score = matches.first().map(|m| m.score);

        let results: Vec<SearchResult> = matches
            .iter()
            .map(|m| {
                let doc = index.document(m.id);
                SearchResult {
                    title: doc.title.clone(),
                    preview: doc.preview.clone(),
                    url: doc.url.clone(),
                }
            })
            .collect();

        let spelling_corrections =
            self.correct_spelling(&query, results.is_empty(), top_score);

        tracing::debug!(
            query = raw_query,
            results = results.len(),
            use_hits,
            "search complete"
        );

        Ok(SearchResults {
            results,
            spelling_corrections,
        })
    }

    /// Suggest one replacement per query term when the result set looks
    /// weak: empty, or topped by a low-scoring match.
    fn correct_spelling(
        &self,
        query: &Query,
        no_results: bool,
        top_score: Option<f32>,
    ) -> BTreeMap<String, String> {
        let mut corrections = BTreeMap::new();

        let Some(dictionary) = &self.dictionary else {
            return corrections;
        };
        let weak = no_results || top_score.is_some_and(|s| s <= SPELLING_SCORE_THRESHOLD);
        if !weak {
            return corrections;
        }

        for term in &query.terms {
            if let Some(suggestion) = dictionary.suggest(term) {
                corrections.insert(term.clone(), suggestion);
            }
        }

        corrections
    }
}
