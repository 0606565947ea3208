//! Character trie over stemmed tokens.
//!
//! Terminal nodes hold the set of documents containing the exact token.
//! Prefix search walks the subtree and reports, per document, which full
//! tokens produced the hit — the ranker needs the actual terms to look up
//! their statistics.
//!
//! Rebuilds replace the whole trie, so there is no removal path.

use super::index::DocId;
use ahash::{AHashMap, AHashSet};

#[derive(Debug, Default)]
struct TrieNode {
    children: AHashMap<char, TrieNode>,
    /// Documents containing the token that ends at this node.
    docs: AHashSet<DocId>,
}

/// Character-keyed trie supporting exact and prefix retrieval of document
/// ids.
#[derive(Debug, Default)]
pub(crate) struct Trie {
    root: TrieNode,
}

impl Trie {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `id` under `token`. Idempotent: re-inserting the same pair
    /// leaves search results unchanged.
    pub(crate) fn insert(&mut self, token: &str, id: DocId) {
        let mut node = &mut self.root;
        for c in token.chars() {
            node = node.children.entry(c).or_default();
        }
        node.docs.insert(id);
    }

    /// Find documents by token.
    ///
    /// With `prefix` unset, only exact-token hits are returned. With it set,
    /// every terminal in the subtree contributes, and the value set records
    /// which full token led to each document.
    pub(crate) fn search(
        &self,
        token: &str,
        prefix: bool,
    ) -> AHashMap<DocId, AHashSet<String>> {
        let mut results: AHashMap<DocId, AHashSet<String>> = AHashMap::new();

        let mut node = &self.root;
        for c in token.chars() {
            match node.children.get(&c) {
                Some(child) => node = child,
                None => return results,
            }
        }

        for &id in &node.docs {
            results.entry(id).or_default().insert(token.to_owned());
        }

        if prefix {
            let mut buf = token.to_owned();
            collect_subtree(node, &mut buf, &mut results);
        }

        results
    }
}

/// Depth-first walk accumulating every descendant terminal's documents.
fn collect_subtree(
    node: &TrieNode,
    buf: &mut String,
    results: &mut AHashMap<DocId, AHashSet<String>>,
) {
    for (&c, child) in &node.children {
        buf.push(c);
        for &id in &child.docs {
            results.entry(id).or_default().insert(buf.clone());
        }
        collect_subtree(child, buf, results);
        buf.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    fn doc(n: u32) -> DocId {
        DocId(n)
    }

    #[test]
    fn exact_search_returns_only_exact_tokens() {
        let mut trie = Trie::new();
        trie.insert("shard", doc(0));
        trie.insert("sharding", doc(1));

        let exact = trie.search("shard", false);
        check!(exact.len() == 1);
        check!(exact[&doc(0)].contains("shard"));
    }

    #[test]
    fn prefix_search_includes_descendants() {
        let mut trie = Trie::new();
        trie.insert("shard", doc(0));
        trie.insert("sharding", doc(1));
        trie.insert("shell", doc(2));

        let hits = trie.search("shard", true);
        check!(hits.len() == 2);
        check!(hits[&doc(0)].contains("shard"));
        check!(hits[&doc(1)].contains("sharding"));

        let all = trie.search("sh", true);
        check!(all.len() == 3);
        check!(all[&doc(2)].contains("shell"));
    }

    #[test]
    fn prefix_search_records_every_matching_token_per_doc() {
        let mut trie = Trie::new();
        trie.insert("index", doc(0));
        trie.insert("indexes", doc(0));

        let hits = trie.search("index", true);
        check!(hits[&doc(0)].len() == 2);
        check!(hits[&doc(0)].contains("index"));
        check!(hits[&doc(0)].contains("indexes"));
    }

    #[test]
    fn insert_is_idempotent() {
        let mut once = Trie::new();
        once.insert("replica", doc(3));

        let mut twice = Trie::new();
        twice.insert("replica", doc(3));
        twice.insert("replica", doc(3));

        check!(once.search("replica", true) == twice.search("replica", true));
        check!(twice.search("replica", false)[&doc(3)].len() == 1);
    }

    #[test]
    fn missing_tokens_return_nothing() {
        let mut trie = Trie::new();
        trie.insert("atlas", doc(0));
        check!(trie.search("compass", true).is_empty());
        check!(trie.search("atlasx", false).is_empty());
    }
}
