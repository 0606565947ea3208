//! Text tokenization and stemming for search indexing.
//!
//! Tokenization is shared by the indexer and the query parser so both sides
//! agree on token boundaries. Stemming is Porter2 (the Snowball "english"
//! state machine, generated upstream and frozen in `rust-stemmers`), with a
//! thread-local memo since the same words recur constantly across fields.

use ahash::AHashMap;
use rust_stemmers::{Algorithm, Stemmer};
use std::cell::RefCell;

/// Common English stop words, filtered out at indexing and phrase-stemming
/// time. High-frequency words add nothing to relevance and bloat postings.
pub(crate) const STOP_WORDS: &[&str] = &[
    "a", "am", "an", "and", "are", "as", "at", "be", "because", "been", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "had", "has", "have", "he", "her", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "let", "may", "me", "must", "my", "no",
    "nor", "not", "of", "on", "or", "other", "our", "own", "she", "should", "since", "so",
    "some", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "to", "too", "was", "we", "were", "what", "when", "where", "which", "while", "who", "why",
    "will", "with", "would", "you", "your",
];

/// Two-word lexical items indexed as a single token. The pair is joined by a
/// space and bypasses stemming entirely.
const ATOMIC_PHRASES: &[(&str, &str)] = &[
    ("ops", "manager"),
    ("cloud", "manager"),
    ("real", "time"),
];

/// Characters that survive tokenization. Everything else is a separator.
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '%' | '.')
}

fn atomic_second_word(first: &str) -> Option<&'static str> {
    ATOMIC_PHRASES
        .iter()
        .find(|(f, _)| *f == first)
        .map(|(_, second)| *second)
}

/// Is this word on the stop list?
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Split text into searchable tokens.
///
/// Components are runs of `[A-Za-z0-9_$%.]`, lowercased, with leading and
/// trailing `.` stripped. Three escape rules apply:
/// - a lone `$` expands to the tokens `positional` and `operator`;
/// - an atomic-phrase pair ("ops" followed by "manager") is emitted as one
///   space-joined token, consuming both components;
/// - with `fuzzy`, a component containing `.` additionally emits each of its
///   `.`-separated sub-components (after the full token), so `db.coll.find`
///   is reachable by `find`.
///
/// Single-character components are dropped.
pub fn tokenize(text: &str, fuzzy: bool) -> Vec<String> {
    let components: Vec<String> = text
        .split(|c| !is_token_char(c))
        .map(|part| part.to_lowercase())
        .map(|part| part.trim_matches('.').to_owned())
        .filter(|part| !part.is_empty())
        .collect();

    let mut tokens = Vec::with_capacity(components.len());
    let mut i = 0;
    while i < components.len() {
        let component = &components[i];

        if component == "$" {
            tokens.push("positional".to_owned());
            tokens.push("operator".to_owned());
            i += 1;
            continue;
        }

        if let Some(second) = atomic_second_word(component) {
            if components.get(i + 1).is_some_and(|next| next == second) {
                tokens.push(format!("{component} {second}"));
                i += 2;
                continue;
            }
        }

        if component.len() > 1 {
            tokens.push(component.clone());
            if fuzzy && component.contains('.') {
                for part in component.split('.') {
                    if part.len() > 1 {
                        tokens.push(part.to_owned());
                    }
                }
            }
        }

        i += 1;
    }

    tokens
}

thread_local! {
    static STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static STEM_CACHE: RefCell<AHashMap<String, String>> = RefCell::new(AHashMap::new());
}

/// Stem a single token with Porter2.
///
/// Atomic-phrase tokens (the only ones containing a space) pass through
/// unchanged. Results are memoized per thread; stems are produced once and
/// reused.
pub fn stem(word: &str) -> String {
    if word.contains(' ') {
        return word.to_owned();
    }

    STEM_CACHE.with(|cache| {
        if let Some(stemmed) = cache.borrow().get(word) {
            return stemmed.clone();
        }

        let stemmed = STEMMER.with(|stemmer| stemmer.stem(word).into_owned());
        cache
            .borrow_mut()
            .insert(word.to_owned(), stemmed.clone());
        stemmed
    })
}
