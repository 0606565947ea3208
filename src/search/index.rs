//! The inverted index: per-field posting lists, term statistics, token
//! positions, the link graph, and synonym correlations.
//!
//! An index is one *generation*: document ids are dense, assigned in
//! insertion order from zero, and valid only within that generation.
//! Rebuilds construct a fresh index from a manifest snapshot and swap it in
//! wholesale; nothing here mutates after [`FTSIndex::build`].

use super::query::Query;
use super::scoring::{self, Match, MatchSet};
use super::tokenize::{is_stop_word, stem, tokenize};
use super::trie::Trie;
use ahash::{AHashMap, AHashSet};
use std::time::Instant;

/// Weight attached to the correlation between a sigil token (`$lookup`) and
/// its bare form (`lookup`).
const SIGIL_CORRELATION: f32 = 0.9;

/// A dense document identifier, stable within one index generation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub u32);

impl DocId {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub(crate) fn usize(self) -> usize {
        self.0 as usize
    }
}

/// Normalize a URL by chopping off a trailing `index.html` component, so a
/// directory and its index page are the same link-graph node.
fn normalize_url(url: &mut String) {
    if let Some(offset) = url.rfind("/index.html") {
        url.truncate(offset + 1);
    }

    if !url.ends_with('/') {
        url.push('/');
    }
}

/// Per-document statistics within a single field.
#[derive(Debug)]
pub(crate) struct DocumentEntry {
    /// Number of indexed (non-stop) tokens.
    pub(crate) len: u32,
    /// Token → occurrence count within this field.
    pub(crate) term_frequencies: AHashMap<String, u32>,
}

/// A named field bucket with a multiplicative ranking weight.
#[derive(Debug)]
pub struct Field {
    name: String,
    weight: f32,
    pub(crate) documents: AHashMap<DocId, DocumentEntry>,
    total_tokens: u32,
    length_weight: f32,
}

impl Field {
    pub fn new(name: &str, weight: f32) -> Self {
        Self {
            name: name.to_owned(),
            weight,
            documents: AHashMap::new(),
            total_tokens: 0,
            length_weight: 0.0,
        }
    }

    /// The inverse average number of unique terms per document. An odd
    /// quantity, but it keeps large fields from dwarfing small ones.
    fn compute_length_weight(&mut self) {
        let n_terms: usize = self
            .documents
            .values()
            .map(|doc| doc.term_frequencies.len())
            .sum();

        self.length_weight = if n_terms == 0 {
            0.0
        } else {
            self.documents.len() as f32 / n_terms as f32
        };
    }
}

/// The canonical field configuration.
pub fn default_fields() -> Vec<Field> {
    vec![
        Field::new("text", 1.0),
        Field::new("headings", 5.0),
        Field::new("title", 10.0),
        Field::new("tags", 75.0),
    ]
}

/// Cross-field statistics for one token.
#[derive(Debug)]
pub(crate) struct TermEntry {
    /// Documents containing the token in any field.
    docs: AHashSet<DocId>,
    /// Global token positions per document, strictly increasing.
    pub(crate) positions: AHashMap<DocId, Vec<u32>>,
    /// Per-field count of documents whose field contains the token,
    /// indexed by field order.
    times_appeared: Vec<u32>,
}

impl TermEntry {
    fn new(field_count: usize) -> Self {
        Self {
            docs: AHashSet::new(),
            positions: AHashMap::new(),
            times_appeared: vec![0; field_count],
        }
    }

    fn register(&mut self, field_index: usize, id: DocId) {
        self.docs.insert(id);
        self.times_appeared[field_index] += 1;
    }

    fn add_position(&mut self, id: DocId, position: u32) {
        self.positions.entry(id).or_default().push(position);
    }
}

/// Display metadata for a single indexed document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocId,
    pub url: String,
    pub title: String,
    pub preview: String,
    pub include_in_global_search: bool,
    pub search_property: String,
}

/// Everything the index needs to ingest one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    pub url: String,
    pub title: String,
    pub preview: String,
    pub headings: String,
    pub text: String,
    pub tags: String,
    pub links: Vec<String>,
    pub weight: f32,
    pub include_in_global_search: bool,
    pub search_property: String,
}

impl DocumentInput {
    fn field_text(&self, name: &str) -> Option<&str> {
        match name {
            "text" => Some(&self.text),
            "headings" => Some(&self.headings),
            "title" => Some(&self.title),
            "tags" => Some(&self.tags),
            _ => None,
        }
    }
}

/// The full-text index over one generation of documents.
pub struct FTSIndex {
    fields: Vec<Field>,
    trie: Trie,
    terms: AHashMap<String, TermEntry>,
    next_doc_id: DocId,
    /// Global position counter; bumped once extra between fields so tokens
    /// in different fields are never adjacent.
    position: u32,

    documents: Vec<Document>,
    document_weights: Vec<f32>,

    link_graph: AHashMap<String, Vec<String>>,
    inverse_link_graph: AHashMap<String, Vec<String>>,
    url_to_id: AHashMap<String, DocId>,
    incoming_neighbors: Vec<AHashSet<DocId>>,
    outgoing_neighbors: Vec<AHashSet<DocId>>,

    word_correlations: AHashMap<String, Vec<(String, f32)>>,
    search_property_aliases: AHashMap<String, String>,

    manifests: AHashSet<String>,
}

impl FTSIndex {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            trie: Trie::new(),
            terms: AHashMap::new(),
            next_doc_id: DocId(0),
            position: 0,

            documents: Vec::new(),
            document_weights: Vec::new(),

            link_graph: AHashMap::new(),
            inverse_link_graph: AHashMap::new(),
            url_to_id: AHashMap::new(),
            incoming_neighbors: Vec::new(),
            outgoing_neighbors: Vec::new(),

            word_correlations: AHashMap::new(),
            search_property_aliases: AHashMap::new(),

            manifests: AHashSet::new(),
        }
    }

    /// An index over the canonical field configuration.
    pub fn with_default_fields() -> Self {
        Self::new(default_fields())
    }

    /// Register a synonym. `word` may stem to multiple tokens (a bigram key,
    /// joined by a space); `synonym` must be a single token. Multiple
    /// correlations for the same key accumulate.
    pub fn correlate_word(&mut self, word: &str, synonym: &str, closeness: f32) {
        let key = tokenize(word, false)
            .iter()
            .map(|part| stem(part))
            .collect::<Vec<_>>()
            .join(" ");
        if key.is_empty() {
            return;
        }

        let pair = (stem(synonym), closeness);
        let entry = self.word_correlations.entry(key).or_default();
        if !entry.contains(&pair) {
            entry.push(pair);
        }
    }

    /// Declare an alternate tag resolving to `search_property`.
    pub fn alias_search_property(&mut self, alias: &str, search_property: &str) {
        self.search_property_aliases
            .insert(alias.to_owned(), search_property.to_owned());
    }

    /// Resolve a requested property tag through the alias table.
    pub fn resolve_alias<'a>(&'a self, tag: &'a str) -> &'a str {
        self.search_property_aliases
            .get(tag)
            .map_or(tag, String::as_str)
    }

    /// Ingest one document, assigning it the next dense id.
    pub fn add(&mut self, mut input: DocumentInput) -> DocId {
        let id = self.next_doc_id;
        self.next_doc_id = id.next();

        normalize_url(&mut input.url);
        for link in &mut input.links {
            normalize_url(link);
            self.inverse_link_graph
                .entry(link.clone())
                .or_default()
                .push(input.url.clone());
        }
        self.link_graph
            .insert(input.url.clone(), std::mem::take(&mut input.links));
        self.url_to_id.insert(input.url.clone(), id);

        // Sigil tokens are indexed verbatim; the correlation back to their
        // bare form is registered after the field walk.
        let mut sigil_correlations: Vec<(String, usize)> = Vec::new();

        for field_index in 0..self.fields.len() {
            let text = match input.field_text(&self.fields[field_index].name) {
                Some(text) if !text.is_empty() => text,
                _ => continue,
            };

            let tokens = tokenize(text, true);
            let mut term_frequencies: AHashMap<String, u32> = AHashMap::new();
            let mut number_of_tokens = 0u32;

            for raw in tokens {
                if is_stop_word(&raw) {
                    continue;
                }

                let token = if raw.starts_with("%%") {
                    sigil_correlations.push((raw.clone(), 2));
                    raw
                } else if raw.starts_with('$') || raw.starts_with('%') {
                    sigil_correlations.push((raw.clone(), 1));
                    raw
                } else {
                    stem(&raw)
                };

                number_of_tokens += 1;
                self.position += 1;

                let entry = self
                    .terms
                    .entry(token.clone())
                    .or_insert_with(|| TermEntry::new(self.fields.len()));
                let count = term_frequencies.entry(token.clone()).or_insert(0);
                if *count == 0 {
                    self.trie.insert(&token, id);
                    entry.register(field_index, id);
                }
                *count += 1;
                entry.add_position(id, self.position);
            }

            // Bump between fields so the last token of one field is never
            // adjacent to the first token of the next.
            self.position += 1;

            let field = &mut self.fields[field_index];
            field.total_tokens += number_of_tokens;
            field.documents.insert(
                id,
                DocumentEntry {
                    len: number_of_tokens,
                    term_frequencies,
                },
            );
        }

        for (token, sigil_len) in sigil_correlations {
            self.correlate_word(&token[sigil_len..], &token, SIGIL_CORRELATION);
        }

        self.documents.push(Document {
            id,
            url: input.url,
            title: input.title,
            preview: input.preview,
            include_in_global_search: input.include_in_global_search,
            search_property: input.search_property.clone(),
        });
        self.document_weights.push(input.weight);
        self.manifests.insert(input.search_property);

        id
    }

    /// Finalize the generation: derive field length weights and materialize
    /// the neighbor id-sets from the URL link graph.
    pub fn build(&mut self) {
        let start = Instant::now();

        for field in &mut self.fields {
            field.compute_length_weight();
        }

        let n = self.documents.len();
        self.outgoing_neighbors = vec![AHashSet::new(); n];
        self.incoming_neighbors = vec![AHashSet::new(); n];

        for doc in &self.documents {
            let slot = doc.id.usize();
            if let Some(links) = self.link_graph.get(&doc.url) {
                for link in links {
                    if let Some(&target) = self.url_to_id.get(link) {
                        self.outgoing_neighbors[slot].insert(target);
                    }
                }
            }
            if let Some(sources) = self.inverse_link_graph.get(&doc.url) {
                for source_url in sources {
                    if let Some(&source) = self.url_to_id.get(source_url) {
                        self.incoming_neighbors[slot].insert(source);
                    }
                }
            }
        }

        tracing::info!(
            documents = n,
            terms = self.terms.len(),
            elapsed = ?start.elapsed(),
            "built index generation"
        );
    }

    /// Search properties represented in this generation.
    pub fn manifests(&self) -> &AHashSet<String> {
        &self.manifests
    }

    pub fn document(&self, id: DocId) -> &Document {
        &self.documents[id.usize()]
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub(crate) fn neighbors(&self, id: DocId) -> (&AHashSet<DocId>, &AHashSet<DocId>) {
        (
            &self.incoming_neighbors[id.usize()],
            &self.outgoing_neighbors[id.usize()],
        )
    }

    /// Build the stemmed-term weight map for a query.
    ///
    /// Every stemmed query term seeds at weight 1. Correlations keyed by a
    /// single term or by an adjacent-pair bigram merge in at the max of the
    /// existing weight and the correlation's closeness. A second pass then
    /// applies correlations once more over the produced set, picking up
    /// one-hop transitive synonyms. Adding a correlation can only ever raise
    /// weights, never lower them.
    pub(crate) fn collect_correlations(&self, terms: &[String]) -> AHashMap<String, f32> {
        let mut stemmed_terms: AHashMap<String, f32> =
            terms.iter().map(|term| (stem(term), 1.0)).collect();

        for i in 0..terms.len() {
            let single = stem(&terms[i]);
            let mut keys = vec![single.clone()];
            if i + 1 < terms.len() {
                keys.push(format!("{} {}", single, stem(&terms[i + 1])));
            }

            for key in keys {
                self.merge_correlations(&key, &mut stemmed_terms);
            }
        }

        let produced: Vec<String> = stemmed_terms.keys().cloned().collect();
        for key in produced {
            self.merge_correlations(&key, &mut stemmed_terms);
        }

        stemmed_terms
    }

    fn merge_correlations(&self, key: &str, stemmed_terms: &mut AHashMap<String, f32>) {
        let Some(correlations) = self.word_correlations.get(key) else {
            return;
        };

        for (synonym, closeness) in correlations {
            let weight = stemmed_terms
                .get(synonym)
                .copied()
                .unwrap_or(0.0)
                .max(*closeness);
            stemmed_terms.insert(synonym.clone(), weight);
        }
    }

    /// Execute a parsed query: candidate generation, Dirichlet+ relevance,
    /// phrase filtering, and ranking (optionally HITS).
    pub(crate) fn search(&self, query: &Query, use_hits: bool) -> Vec<Match> {
        let stemmed_terms = self.collect_correlations(&query.terms);

        // Candidate generation: prefix-trie hits per stemmed term, merged
        // into doc → matched-token sets, property-filtered. First-seen order
        // is kept so equal scores tie-break deterministically.
        let mut candidate_order: Vec<DocId> = Vec::new();
        let mut candidates: AHashMap<DocId, AHashSet<String>> = AHashMap::new();
        for term in stemmed_terms.keys() {
            for (id, tokens) in self.trie.search(term, true) {
                if !query.filter.accepts(self.document(id)) {
                    continue;
                }
                let entry = candidates.entry(id).or_insert_with(|| {
                    candidate_order.push(id);
                    AHashSet::new()
                });
                entry.extend(tokens);
            }
        }

        // Relevance scoring.
        let mut matches = MatchSet::new();
        for id in candidate_order {
            let doc_weight = self.document_weights[id.usize()];
            for token in &candidates[&id] {
                let term_entry = &self.terms[token];
                let tfq = stemmed_terms.get(token).copied().unwrap_or(0.1);

                let mut term_relevancy = 0.0f32;
                for (field_index, field) in self.fields.iter().enumerate() {
                    let Some(doc_entry) = field.documents.get(&id) else {
                        continue;
                    };

                    let tfd = doc_entry.term_frequencies.get(token).copied().unwrap_or(0);
                    let probability = term_entry.times_appeared[field_index] as f32
                        / field.total_tokens.max(500) as f32;

                    term_relevancy += scoring::dirichlet_plus(
                        tfq,
                        tfd,
                        probability,
                        doc_entry.len,
                        query.terms.len() as u32,
                    ) * field.weight
                        * field.length_weight;
                }

                matches.add(id, token, term_relevancy * doc_weight);
            }
        }

        // Phrase post-filter. Positions are drawn from all fields; the
        // between-field bump keeps cross-field tokens non-adjacent.
        if query.has_phrase_constraints() {
            matches.retain(|id| {
                let mut positions: AHashMap<String, Vec<u32>> = AHashMap::new();
                for component in query.stemmed_phrases.iter().flatten() {
                    if positions.contains_key(component) {
                        continue;
                    }
                    if let Some(list) = self
                        .terms
                        .get(component)
                        .and_then(|entry| entry.positions.get(&id))
                    {
                        positions.insert(component.clone(), list.clone());
                    }
                }
                query.check_phrases(&positions)
            });
        }

        if use_hits {
            scoring::rank_with_hits(matches, self)
        } else {
            scoring::rank_by_relevancy(matches)
        }
    }
}
