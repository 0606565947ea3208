//! Relevance and authority ranking.
//!
//! Relevance is a Dirichlet+ smoothed language-model score (Lv & Zhai 2011,
//! "Lower-bounding term frequency normalization", CIKM '11). Authority comes
//! from Kleinberg's HITS run over the base set: the phrase-filtered root
//! candidates plus everything linking to or linked from them. The two are
//! merged log-normalized, with authority discounted by half.

use super::index::{DocId, FTSIndex};
use ahash::{AHashMap, AHashSet};

/// Maximum number of matches returned from a single search.
pub(crate) const MAX_MATCHES: usize = 150;

/// Authority contributes at half strength: 1 / log2(4).
const LOG4_DIVISOR: f32 = 0.5;

/// Smoothing constants, in the ranges suggested by Zhai & Lafferty's "A
/// Study of Smoothing Methods for Language Models Applied to Ad Hoc
/// Information Retrieval".
const MU: f32 = 2000.0;
const DELTA: f32 = 0.05;

const MAX_HITS_ITERATIONS: usize = 200;
const CONVERGENCE_THRESHOLD: f32 = 1e-5;

/// Candidates whose relevancy falls below `threshold * RELEVANCY_PENALTY_SPAN`
/// have a penalty subtracted from their final score.
const RELEVANCY_PENALTY_SPAN: f32 = 2.5;

/// A ranked search result within one index generation.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: DocId,
    pub relevancy_score: f32,
    /// Final merged score; equals `relevancy_score` when HITS is skipped.
    pub score: f32,
    /// The actual index tokens that matched.
    pub terms: AHashSet<String>,
}

/// Per-candidate scoring state, keyed by doc id with insertion order
/// preserved so equal scores keep first-generated-first ordering.
#[derive(Debug, Default)]
pub(crate) struct MatchSet {
    order: Vec<DocId>,
    states: AHashMap<DocId, MatchState>,
}

#[derive(Debug)]
struct MatchState {
    relevancy_score: f32,
    terms: AHashSet<String>,
    authority_score: f32,
    hub_score: f32,
    incoming: AHashSet<DocId>,
    outgoing: AHashSet<DocId>,
}

impl MatchState {
    fn new() -> Self {
        Self {
            relevancy_score: 0.0,
            terms: AHashSet::new(),
            authority_score: 1.0,
            hub_score: 1.0,
            incoming: AHashSet::new(),
            outgoing: AHashSet::new(),
        }
    }
}

impl MatchSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Accumulate one term's relevancy contribution for a document.
    pub(crate) fn add(&mut self, id: DocId, term: &str, relevancy: f32) {
        let state = self.states.entry(id).or_insert_with(|| {
            self.order.push(id);
            MatchState::new()
        });
        state.relevancy_score += relevancy;
        state.terms.insert(term.to_owned());
    }

    /// Drop candidates failing `keep`, preserving order.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(DocId) -> bool) {
        let states = &mut self.states;
        self.order.retain(|&id| {
            if keep(id) {
                true
            } else {
                states.remove(&id);
                false
            }
        });
    }

    fn ensure(&mut self, id: DocId) {
        self.states.entry(id).or_insert_with(|| {
            self.order.push(id);
            MatchState::new()
        });
    }

    fn into_matches(mut self) -> Vec<Match> {
        self.order
            .iter()
            .filter_map(|id| {
                self.states.remove(id).map(|state| Match {
                    id: *id,
                    relevancy_score: state.relevancy_score,
                    score: state.relevancy_score,
                    terms: state.terms,
                })
            })
            .collect()
    }
}

/// Dirichlet+ contribution of one term within one field.
///
/// A probability of zero means the term never occurs in this field's
/// language at all; its contribution is defined to be zero rather than NaN,
/// since while Dirichlet+ rewards rare terms, a nonexistent one should be
/// ignored.
pub(crate) fn dirichlet_plus(
    term_frequency_in_query: f32,
    term_frequency_in_doc: u32,
    term_probability_in_language: f32,
    doc_length: u32,
    query_length: u32,
) -> f32 {
    if term_probability_in_language == 0.0 {
        return 0.0;
    }

    let smoothed = MU * term_probability_in_language;
    let term2 = (1.0 + term_frequency_in_doc as f32 / smoothed).log2()
        + (1.0 + DELTA / smoothed).log2();
    let term3 = query_length as f32 * (MU / (doc_length as f32 + MU)).log2();

    term_frequency_in_query * term2 + term3
}

/// Rank by relevancy alone: the degraded path when HITS is skipped.
pub(crate) fn rank_by_relevancy(set: MatchSet) -> Vec<Match> {
    let mut matches = set.into_matches();
    matches.sort_by(|a, b| b.relevancy_score.total_cmp(&a.relevancy_score));
    matches.truncate(MAX_MATCHES);
    matches
}

/// Expand the root set into a base set, run HITS, and merge relevancy with
/// authority into the final score.
pub(crate) fn rank_with_hits(mut set: MatchSet, index: &FTSIndex) -> Vec<Match> {
    if set.order.is_empty() {
        return Vec::new();
    }

    // Base set: root candidates plus every page linking to or linked from
    // them, the latter as zero-relevance placeholders.
    let roots = set.order.clone();
    for &id in &roots {
        let (incoming, outgoing) = index.neighbors(id);
        for &neighbor in incoming.iter().chain(outgoing) {
            set.ensure(neighbor);
        }
    }

    // Wire up neighbor id-sets restricted to the base set.
    let base: AHashSet<DocId> = set.order.iter().copied().collect();
    for (&id, state) in &mut set.states {
        let (incoming, outgoing) = index.neighbors(id);
        state.incoming = incoming.intersection(&base).copied().collect();
        state.outgoing = outgoing.intersection(&base).copied().collect();
    }

    run_hits(&mut set);

    // Placeholders and phrase-rejected leftovers with zero relevancy are
    // link-graph scaffolding, not results.
    let relevant: AHashSet<DocId> = set
        .order
        .iter()
        .copied()
        .filter(|id| set.states[id].relevancy_score > 0.0)
        .collect();
    set.retain(|id| relevant.contains(&id));
    if set.order.is_empty() {
        return Vec::new();
    }

    for state in set.states.values_mut() {
        if state.authority_score.is_nan() {
            state.authority_score = 1e-10;
        }
    }

    let scores: Vec<f32> = set
        .order
        .iter()
        .map(|id| set.states[id].relevancy_score)
        .collect();
    let threshold = relevancy_threshold(&scores);

    // Normalization denominators consider only candidates at or above the
    // threshold, so one weak outlier cannot deflate everyone else's score.
    let mut max_relevancy = 0.0f32;
    let mut max_authority = 0.0f32;
    for id in &set.order {
        let state = &set.states[id];
        if state.relevancy_score < threshold {
            continue;
        }
        max_relevancy = max_relevancy.max(state.relevancy_score);
        max_authority = max_authority.max(state.authority_score);
    }
    if max_relevancy == 0.0 {
        max_relevancy = 1.0;
    }
    if max_authority == 0.0 {
        max_authority = 1.0;
    }

    let mut matches: Vec<Match> = set
        .order
        .iter()
        .map(|id| {
            let state = &set.states[id];
            let normalized_relevancy = state.relevancy_score / max_relevancy + 1.0;
            let normalized_authority = state.authority_score / max_authority + 1.0;
            let mut score =
                normalized_relevancy.log2() + normalized_authority.log2() * LOG4_DIVISOR;

            // Penalize anything with especially poor relevancy.
            if state.relevancy_score < threshold * RELEVANCY_PENALTY_SPAN {
                score -= threshold / state.relevancy_score;
            }

            Match {
                id: *id,
                relevancy_score: state.relevancy_score,
                score,
                terms: state.terms.clone(),
            }
        })
        .collect();

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(MAX_MATCHES);
    matches
}

/// The HITS iteration: authority from incoming hubs, hubs from outgoing
/// authorities, L2-normalized, until both norms stabilize.
fn run_hits(set: &mut MatchSet) {
    let mut last_authority_norm = 0.0f32;
    let mut last_hub_norm = 0.0f32;

    for _ in 0..MAX_HITS_ITERATIONS {
        let hubs: AHashMap<DocId, f32> = set
            .states
            .iter()
            .map(|(&id, state)| (id, state.hub_score))
            .collect();
        let mut authority_norm = 0.0f32;
        for state in set.states.values_mut() {
            let score: f32 = state.incoming.iter().map(|id| hubs[id]).sum();
            state.authority_score = score;
            authority_norm += score * score;
        }
        authority_norm = authority_norm.sqrt();
        if authority_norm > 0.0 {
            for state in set.states.values_mut() {
                state.authority_score /= authority_norm;
            }
        }

        let authorities: AHashMap<DocId, f32> = set
            .states
            .iter()
            .map(|(&id, state)| (id, state.authority_score))
            .collect();
        let mut hub_norm = 0.0f32;
        for state in set.states.values_mut() {
            let score: f32 = state.outgoing.iter().map(|id| authorities[id]).sum();
            state.hub_score = score;
            hub_norm += score * score;
        }
        hub_norm = hub_norm.sqrt();
        if hub_norm > 0.0 {
            for state in set.states.values_mut() {
                state.hub_score /= hub_norm;
            }
        }

        if (authority_norm - last_authority_norm).abs() < CONVERGENCE_THRESHOLD
            && (hub_norm - last_hub_norm).abs() < CONVERGENCE_THRESHOLD
        {
            break;
        }

        last_authority_norm = authority_norm;
        last_hub_norm = hub_norm;
    }
}

/// Matches in the bottom standard deviation of relevancy get penalized;
/// return that minimum relevancy. Population σ, so a single candidate
/// yields zero rather than NaN.
fn relevancy_threshold(scores: &[f32]) -> f32 {
    let n = scores.len() as f32;
    let mean: f32 = scores.iter().sum::<f32>() / n;
    let variance: f32 = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}
