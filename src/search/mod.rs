//! Full-text search infrastructure: tokenization, the trie-backed inverted
//! index, query parsing, Dirichlet+/HITS ranking, and the searcher facade.

// Module declarations
pub mod index;
pub mod query;
mod scoring;
pub mod searcher;
mod tokenize;
mod trie;

// Re-exports for public API
pub use index::{DocId, Document, DocumentInput, FTSIndex, Field, default_fields};
pub use query::{DocFilter, Query};
pub use scoring::Match;
pub use searcher::{MAXIMUM_TERMS, SearchResult, SearchResults, Searcher};
pub use tokenize::{is_stop_word, stem, tokenize};
