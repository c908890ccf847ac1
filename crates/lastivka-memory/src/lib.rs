//! Long-term memory for the Lastivka assistant.
//!
//! Memories are short statements filed under a normalized topic key and
//! persisted to a JSON file. Queries are answered by a lexical ranker over
//! an inverted index of keys, text, and triple objects, with light
//! Ukrainian stemming to match inflected forms.

pub mod cache;
pub mod config;
pub mod error;
pub mod intent;
pub mod merge;
pub mod normalize;
pub mod ranking;
pub mod search;
pub mod store;
pub mod types;

pub use cache::IndexCache;
pub use config::{MemoryConfig, ScoringWeights};
pub use error::{MemoryError, Result};
pub use merge::{decode_memory_map, merge_sources, Triggers};
pub use normalize::{normalize_key, normalize_text, stem, tokenize};
pub use ranking::{rescore, rescore_at, QueryTerms};
pub use search::{InvertedIndex, SearchOptions};
pub use store::MemoryStore;
pub use types::{
    AddOutcome, Answer, AnswerSource, IndexHealth, IndexStats, MemoryMap, MemoryRecord,
    RankedResult, ScoreBreakdown, StoreStats, Thought, Triple,
};
