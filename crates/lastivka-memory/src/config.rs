//! Configuration for ranking and recall.

use serde::{Deserialize, Serialize};

/// Tone written when the caller does not give one.
pub const DEFAULT_TONE: &str = "нейтральний";

/// Additive weights used by the scorer.
///
/// Every field has a default, so a partial TOML table or JSON object
/// overrides only the weights it names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    /// Key equals the normalized query.
    pub exact: f64,
    /// Key starts with the normalized query.
    pub prefix: f64,
    /// Scaled by key/query similarity.
    pub fuzzy: f64,
    /// Per query token found in the record text.
    pub token: f64,
    /// Normalized query is a substring of the record text.
    pub text_match: f64,
    /// Per query token that prefixes a text token.
    pub prefix_token: f64,
    /// Scaled by text/query similarity.
    pub text_fuzzy: f64,
    /// Normalized query is a substring of the triple object.
    pub triple_obj: f64,
    pub stem_bonus: f64,
    /// Key tokens or stems overlap the query.
    pub key_token: f64,
    /// Flat score when only a key prefix relation matched.
    pub fallback: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact: 100.0,
            prefix: 65.0,
            fuzzy: 55.0,
            token: 20.0,
            text_match: 25.0,
            prefix_token: 5.0,
            text_fuzzy: 30.0,
            triple_obj: 40.0,
            stem_bonus: 5.0,
            key_token: 60.0,
            fallback: 35.0,
        }
    }
}

/// Top-level memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Maximum recency bonus; zero disables freshness rescoring.
    #[serde(default = "default_freshness_weight")]
    pub freshness_weight: f64,

    /// Result cap when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_tone")]
    pub default_tone: String,
}

fn default_freshness_weight() -> f64 {
    15.0
}

fn default_limit() -> usize {
    10
}

fn default_tone() -> String {
    DEFAULT_TONE.to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            freshness_weight: default_freshness_weight(),
            default_limit: default_limit(),
            default_tone: default_tone(),
        }
    }
}
