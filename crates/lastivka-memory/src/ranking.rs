//! Multi-pass lexical scoring and freshness rescoring.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::config::ScoringWeights;
use crate::normalize::{
    normalize_key, normalize_text, similarity, stem, tokenize, truncate_chars,
};
use crate::search::{InvertedIndex, Location, SearchOptions};
use crate::types::{MemoryMap, MemoryRecord, RankedResult, ScoreBreakdown};

/// Key-similarity contributions below this are discarded.
const MIN_KEY_SCORE: f64 = 20.0;
const KEY_COMPARE_CHARS: usize = 64;
const TEXT_COMPARE_CHARS: usize = 256;
/// Age at which the freshness bonus reaches zero.
const FRESHNESS_HORIZON_DAYS: f64 = 365.0;

/// A query after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTerms {
    pub text: String,
    pub key: String,
    pub tokens: BTreeSet<String>,
    pub stems: BTreeSet<String>,
}

impl QueryTerms {
    pub fn parse(query: &str) -> Self {
        let text = normalize_text(query);
        let key = normalize_key(&text);
        let tokens: BTreeSet<String> = tokenize(&text).into_iter().chain(tokenize(&key)).collect();
        let stems = tokens.iter().map(|token| stem(token)).collect();
        Self {
            text,
            key,
            tokens,
            stems,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Terms of a piece of record text, normalized once per hit.
struct TextTerms {
    text: String,
    tokens: BTreeSet<String>,
    stems: BTreeSet<String>,
}

impl TextTerms {
    fn new(raw: &str) -> Self {
        let text = normalize_text(raw);
        let tokens: BTreeSet<String> = tokenize(&text).into_iter().collect();
        let stems = tokens.iter().map(|token| stem(token)).collect();
        Self { text, tokens, stems }
    }

    fn overlap(&self, query: &QueryTerms) -> usize {
        self.tokens.intersection(&query.tokens).count()
    }

    fn shares_stem(&self, query: &QueryTerms) -> bool {
        !self.stems.is_disjoint(&query.stems)
    }
}

type Candidates = BTreeMap<Location, ScoreBreakdown>;

/// Rank `memory` against `query`, best first, capped at `options.limit`.
pub(crate) fn rank(
    index: &InvertedIndex,
    memory: &MemoryMap,
    query: &str,
    options: &SearchOptions,
) -> Vec<RankedResult> {
    let terms = QueryTerms::parse(query);
    if options.debug {
        debug!(
            text = %terms.text,
            key = %terms.key,
            tokens = ?terms.tokens,
            stems = ?terms.stems,
            "search query terms"
        );
    }
    if terms.is_empty() {
        return Vec::new();
    }

    let weights = &options.weights;
    let mut candidates = Candidates::new();
    key_token_pass(memory, &terms, weights, &mut candidates);
    key_similarity_pass(memory, &terms, weights, &mut candidates);
    token_overlap_pass(index, memory, &terms, weights, &mut candidates);
    if candidates.is_empty() {
        fallback_pass(memory, &terms, weights, &mut candidates);
    }

    // BTreeMap iteration is store order; the stable sort keeps it for ties.
    let mut ranked: Vec<(Location, ScoreBreakdown)> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total().total_cmp(&a.1.total()));
    ranked.truncate(options.limit);

    let results: Vec<RankedResult> = ranked
        .into_iter()
        .filter_map(|((key, slot), breakdown)| {
            let record = memory.get(&key)?.get(slot)?.clone();
            Some(RankedResult {
                key,
                record,
                score: breakdown.total(),
                breakdown: options.debug.then_some(breakdown),
            })
        })
        .collect();

    if options.debug {
        for result in &results {
            debug!(key = %result.key, score = result.score, breakdown = ?result.breakdown, "candidate");
        }
    }
    results
}

fn award<F>(candidates: &mut Candidates, key: &str, slots: usize, mut apply: F)
where
    F: FnMut(&mut ScoreBreakdown),
{
    for slot in 0..slots {
        apply(candidates.entry((key.to_string(), slot)).or_default());
    }
}

/// Keys whose tokens or stems meet the query.
fn key_token_pass(
    memory: &MemoryMap,
    terms: &QueryTerms,
    weights: &ScoringWeights,
    candidates: &mut Candidates,
) {
    for (key, records) in memory {
        let key_tokens: BTreeSet<String> = tokenize(key).into_iter().collect();
        let key_stems: BTreeSet<String> = key_tokens
            .iter()
            .map(|token| stem(token))
            .chain(std::iter::once(stem(key)))
            .collect();
        let hit = !key_tokens.is_disjoint(&terms.tokens)
            || !key_stems.is_disjoint(&terms.stems)
            || terms.tokens.contains(key);
        if hit {
            award(candidates, key, records.len(), |score| {
                score.key_token += weights.key_token
            });
        }
    }
}

/// Exact, prefix, or approximate match of the whole key.
fn key_similarity_pass(
    memory: &MemoryMap,
    terms: &QueryTerms,
    weights: &ScoringWeights,
    candidates: &mut Candidates,
) {
    for (key, records) in memory {
        let key_norm = normalize_key(key);
        let base = if key_norm == terms.key {
            weights.exact
        } else if key_norm.starts_with(&terms.key) {
            weights.prefix
        } else {
            weights.fuzzy
                * similarity(
                    truncate_chars(&key_norm, KEY_COMPARE_CHARS),
                    truncate_chars(&terms.key, KEY_COMPARE_CHARS),
                )
        };
        if base >= MIN_KEY_SCORE {
            award(candidates, key, records.len(), |score| {
                score.key_similarity += base
            });
        }
    }
}

/// Records reached through the inverted index.
fn token_overlap_pass(
    index: &InvertedIndex,
    memory: &MemoryMap,
    terms: &QueryTerms,
    weights: &ScoringWeights,
    candidates: &mut Candidates,
) {
    let hits: BTreeSet<&Location> = terms
        .tokens
        .iter()
        .chain(&terms.stems)
        .flat_map(|term| index.lookup(term))
        .collect();

    for location in hits {
        let Some(record) = memory.get(&location.0).and_then(|records| records.get(location.1))
        else {
            continue;
        };
        let score = overlap_score(record, terms, weights);
        if score > 0.0 {
            candidates.entry(location.clone()).or_default().token_overlap += score;
        }
    }
}

fn overlap_score(record: &MemoryRecord, terms: &QueryTerms, weights: &ScoringWeights) -> f64 {
    let body = TextTerms::new(&record.text);
    let mut score = weights.token * body.overlap(terms) as f64;
    if body.text.contains(&terms.text) {
        score += weights.text_match;
    }
    let prefixing = terms
        .tokens
        .iter()
        .filter(|query_token| body.tokens.iter().any(|word| word.starts_with(query_token.as_str())))
        .count();
    score += weights.prefix_token * prefixing as f64;
    if body.shares_stem(terms) {
        score += weights.stem_bonus;
    }
    score += weights.text_fuzzy
        * similarity(
            truncate_chars(&body.text, TEXT_COMPARE_CHARS),
            truncate_chars(&terms.text, TEXT_COMPARE_CHARS),
        );

    if let Some(object) = record.triple_object() {
        let object = TextTerms::new(object);
        if object.text.contains(&terms.text) {
            score += weights.triple_obj;
        }
        score += weights.token * object.overlap(terms) as f64;
        if object.shares_stem(terms) {
            score += weights.stem_bonus;
        }
    }
    score
}

/// Flat score for keys in a prefix relation with any query token or stem.
fn fallback_pass(
    memory: &MemoryMap,
    terms: &QueryTerms,
    weights: &ScoringWeights,
    candidates: &mut Candidates,
) {
    for (key, records) in memory {
        let key_norm = normalize_key(key);
        if key_norm.is_empty() {
            continue;
        }
        let related = terms
            .tokens
            .iter()
            .chain(&terms.stems)
            .any(|term| key_norm.starts_with(term.as_str()) || term.starts_with(key_norm.as_str()));
        if related {
            award(candidates, key, records.len(), |score| {
                score.fallback = weights.fallback
            });
        }
    }
}

/// Recency bonus for a record created at `created`, as seen at `now`.
pub fn freshness_bonus(created: DateTime<Local>, now: DateTime<Local>, weight: f64) -> f64 {
    let days = (now - created).num_days().max(0) as f64;
    weight.max(0.0) * (1.0 - days.min(FRESHNESS_HORIZON_DAYS) / FRESHNESS_HORIZON_DAYS).max(0.0)
}

/// Add a recency bonus to every result and re-sort, as of now.
pub fn rescore(results: Vec<RankedResult>, weight: f64) -> Vec<RankedResult> {
    rescore_at(results, weight, Local::now())
}

/// Add a recency bonus to every result and re-sort, as of `now`.
///
/// Records with an unreadable timestamp get no bonus. Ties keep their
/// incoming order.
pub fn rescore_at(
    mut results: Vec<RankedResult>,
    weight: f64,
    now: DateTime<Local>,
) -> Vec<RankedResult> {
    for result in &mut results {
        let bonus = result
            .record
            .created_at()
            .map(|created| freshness_bonus(created, now, weight))
            .unwrap_or(0.0);
        result.score += bonus;
        if let Some(breakdown) = result.breakdown.as_mut() {
            breakdown.freshness += bonus;
        }
    }
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}
