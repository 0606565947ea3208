//! Spelling-suggestion contract.
//!
//! Loading a dictionary (aspell tables, corpus word lists) is the
//! embedder's job; the core only needs something that can propose a
//! replacement for a term that found nothing. [`FuzzyDictionary`] is the
//! default in-memory implementation over a plain word list.

use rapidfuzz::distance::jaro_winkler;

/// Minimum similarity before a suggestion is worth showing.
const MIN_SIMILARITY: f64 = 0.8;

/// Something that can suggest a replacement for a probably-misspelled term.
pub trait SpellingDictionary: Send + Sync {
    /// Suggest the closest known word, or `None` if the term is already
    /// known or nothing is close enough.
    fn suggest(&self, word: &str) -> Option<String>;
}

/// An in-memory word list scored by Jaro-Winkler similarity.
#[derive(Debug, Default)]
pub struct FuzzyDictionary {
    words: Vec<String>,
}

impl FuzzyDictionary {
    pub fn new(words: impl IntoIterator<Item = String>) -> Self {
        Self {
            words: words.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl SpellingDictionary for FuzzyDictionary {
    fn suggest(&self, word: &str) -> Option<String> {
        if self.words.iter().any(|known| known == word) {
            return None;
        }

        self.words
            .iter()
            .map(|known| (known, jaro_winkler::similarity(word.chars(), known.chars())))
            .filter(|(_, similarity)| *similarity >= MIN_SIMILARITY)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(known, _)| known.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    fn dictionary() -> FuzzyDictionary {
        FuzzyDictionary::new(
            ["aggregation", "sharding", "replication"]
                .map(str::to_owned),
        )
    }

    #[test]
    fn suggests_the_closest_word() {
        check!(dictionary().suggest("agregation").as_deref() == Some("aggregation"));
        check!(dictionary().suggest("shardin").as_deref() == Some("sharding"));
    }

    #[test]
    fn known_words_need_no_correction() {
        check!(dictionary().suggest("sharding").is_none());
    }

    #[test]
    fn distant_words_get_no_suggestion() {
        check!(dictionary().suggest("xylophone").is_none());
    }

    #[test]
    fn empty_dictionary_suggests_nothing() {
        check!(FuzzyDictionary::default().suggest("anything").is_none());
    }
}
