//! Query parsing: bare terms, quoted phrases, and the mandatory-term
//! rewrite.
//!
//! Terms are what the index is searched with; phrases additionally constrain
//! candidates through the position-adjacency check. An unterminated opening
//! quote is treated as if it were closed at the end of the input, so a user
//! still typing `"officially supported` already gets phrase semantics.

use super::index::Document;
use super::tokenize::{is_stop_word, stem, tokenize};
use ahash::{AHashMap, AHashSet};
use regex::Regex;
use std::sync::LazyLock;

/// Product names that behave as if quoted: a result must literally contain
/// the word, not merely a prefix or synonym of it.
const MANDATORY_TERMS: &[&str] = &["realm", "atlas", "compass"];

static TERM_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());
static CLOSED_PHRASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());

/// Which documents a query is allowed to see.
#[derive(Debug, Clone)]
pub enum DocFilter {
    /// No property filter: only documents opted into global search.
    GlobalSearch,
    /// Only documents belonging to one of these (already alias-resolved)
    /// search properties.
    Properties(AHashSet<String>),
}

impl DocFilter {
    pub(crate) fn accepts(&self, doc: &Document) -> bool {
        match self {
            Self::GlobalSearch => doc.include_in_global_search,
            Self::Properties(properties) => properties.contains(&doc.search_property),
        }
    }
}

/// A parsed search query.
#[derive(Debug, Clone)]
pub struct Query {
    /// Deduplicated terms in first-occurrence order. Order matters: synonym
    /// correlation looks at adjacent pairs.
    pub terms: Vec<String>,
    /// Quoted phrases, lowercased, as literally typed.
    pub phrases: Vec<String>,
    /// Per phrase, the stems of its non-stop-word tokens in order.
    pub stemmed_phrases: Vec<Vec<String>>,
    /// Candidate filter, assigned by the searcher.
    pub filter: DocFilter,
}

impl Query {
    /// Parse a raw query string.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_lowercase();

        let mut terms = Vec::new();
        let mut seen = AHashSet::new();
        for part in TERM_SPLIT.split(&lowered) {
            if !part.is_empty() && seen.insert(part.to_owned()) {
                terms.push(part.to_owned());
            }
        }

        let mut phrases = Vec::new();
        let mut consumed_end = 0;
        for caps in CLOSED_PHRASE.captures_iter(&lowered) {
            let whole = caps.get(0).unwrap();
            if quote_boundary_ok(&lowered, whole.start(), whole.end()) {
                phrases.push(caps.get(1).unwrap().as_str().to_owned());
                consumed_end = whole.end();
            }
        }

        // A dangling open quote after the last closed block is a phrase
        // fragment running to the end of the input.
        if let Some(offset) = lowered[consumed_end..].find('"') {
            let at = consumed_end + offset;
            let fragment = lowered[at + 1..].trim();
            if leading_boundary_ok(&lowered, at) && !fragment.is_empty() {
                phrases.push(fragment.to_owned());
            }
        }

        let mut stemmed_phrases: Vec<Vec<String>> = phrases
            .iter()
            .map(|phrase| {
                tokenize(phrase, false)
                    .iter()
                    .filter(|token| !is_stop_word(token))
                    .map(|token| stem(token))
                    .collect::<Vec<_>>()
            })
            .filter(|stemmed: &Vec<String>| !stemmed.is_empty())
            .collect();

        // Mandatory bare terms behave as single-word phrases.
        for term in &terms {
            if MANDATORY_TERMS.contains(&term.as_str()) {
                stemmed_phrases.push(vec![stem(term)]);
            }
        }

        Self {
            terms,
            phrases,
            stemmed_phrases,
            filter: DocFilter::GlobalSearch,
        }
    }

    /// Whether the phrase post-filter applies to this query at all.
    pub(crate) fn has_phrase_constraints(&self) -> bool {
        !self.stemmed_phrases.is_empty()
    }

    /// Verify every stemmed phrase against a document's token positions.
    ///
    /// `positions` maps a stemmed token to the (ascending) global positions
    /// it occupies in the candidate document, across all fields. A phrase
    /// matches iff one position can be chosen per component such that each
    /// is exactly one greater than the previous.
    pub fn check_phrases(&self, positions: &AHashMap<String, Vec<u32>>) -> bool {
        self.stemmed_phrases
            .iter()
            .all(|phrase| phrase_matches(phrase, positions))
    }
}

fn phrase_matches(phrase: &[String], positions: &AHashMap<String, Vec<u32>>) -> bool {
    let Some(component_positions) = phrase
        .iter()
        .map(|token| positions.get(token).map(Vec::as_slice))
        .collect::<Option<Vec<_>>>()
    else {
        return false;
    };

    let Some((first, rest)) = component_positions.split_first() else {
        return false;
    };

    first.iter().any(|&start| {
        rest.iter()
            .enumerate()
            .all(|(i, list)| list.contains(&(start + i as u32 + 1)))
    })
}

fn leading_boundary_ok(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace)
}

fn quote_boundary_ok(text: &str, start: usize, end: usize) -> bool {
    leading_boundary_ok(text, start)
        && text[end..].chars().next().is_none_or(char::is_whitespace)
}
