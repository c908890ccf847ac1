//! Inverted index over a memory snapshot.

use std::collections::{BTreeSet, HashMap};

use crate::config::ScoringWeights;
use crate::normalize::{stem, tokenize};
use crate::ranking;
use crate::types::{MemoryMap, RankedResult};

/// Position of a record: normalized key and slot in that key's sequence.
pub type Location = (String, usize);

/// Per-search knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub limit: usize,
    pub weights: ScoringWeights,
    /// Attach a score breakdown to every result and log the query terms.
    pub debug: bool,
}

impl SearchOptions {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            weights: ScoringWeights::default(),
            debug: false,
        }
    }
}

/// Token and stem -> locations where it occurs.
///
/// Built from a full snapshot and never updated in place; rebuild it after
/// any change to the snapshot.
#[derive(Debug, Default, Clone)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Location>>,
}

impl InvertedIndex {
    pub fn build(memory: &MemoryMap) -> Self {
        let mut postings: HashMap<String, Vec<Location>> = HashMap::new();
        for (key, records) in memory {
            let key_terms = with_stems(tokenize(key));
            for (slot, record) in records.iter().enumerate() {
                let mut words = tokenize(&record.text);
                if let Some(object) = record.triple_object() {
                    words.extend(tokenize(object));
                }
                let mut terms = with_stems(words);
                terms.extend(key_terms.iter().cloned());
                for term in terms.into_iter().filter(|term| !term.is_empty()) {
                    postings
                        .entry(term)
                        .or_default()
                        .push((key.clone(), slot));
                }
            }
        }
        Self { postings }
    }

    /// Number of distinct tokens and stems.
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Whether every location points at a record of `memory`.
    pub fn resolves(&self, memory: &MemoryMap) -> bool {
        self.postings.values().flatten().all(|(key, slot)| {
            memory
                .get(key)
                .is_some_and(|records| *slot < records.len())
        })
    }

    pub fn lookup(&self, term: &str) -> &[Location] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rank records of `memory` against `query`.
    ///
    /// `memory` must be the snapshot this index was built from.
    pub fn search(
        &self,
        memory: &MemoryMap,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<RankedResult> {
        ranking::rank(self, memory, query, options)
    }
}

fn with_stems(tokens: Vec<String>) -> BTreeSet<String> {
    let stems: Vec<String> = tokens.iter().map(|token| stem(token)).collect();
    tokens.into_iter().chain(stems).collect()
}
