//! Core types for the memory store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Relation label used when a record is written without one.
pub const DEFAULT_RELATION: &str = "is";

/// Normalized key -> records in insertion order.
pub type MemoryMap = BTreeMap<String, Vec<MemoryRecord>>;

/// One remembered statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Topic exactly as the writer gave it.
    pub key_raw: String,
    /// Normalized topic; the store's mapping key.
    pub key_norm: String,
    /// Body of the statement.
    pub text: String,
    /// Free-form emotional register.
    #[serde(default)]
    pub tone: String,
    /// Creation time, written once.
    #[serde(default)]
    pub timestamp: String,
    /// Lower-cased labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, rename = "rel")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triple: Option<Triple>,
}

impl MemoryRecord {
    /// Case-insensitive (text, tone) pair used for deduplication.
    pub fn signature(&self) -> (String, String) {
        signature(&self.text, &self.tone)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag.trim().to_lowercase())
    }

    pub fn created_at(&self) -> Option<DateTime<Local>> {
        parse_timestamp(&self.timestamp)
    }

    /// Object of the attached triple, if any.
    pub fn triple_object(&self) -> Option<&str> {
        self.triple.as_ref().map(|triple| triple.object.as_str())
    }
}

pub(crate) fn signature(text: &str, tone: &str) -> (String, String) {
    (text.trim().to_lowercase(), tone.trim().to_lowercase())
}

/// Lower-case, trim, and drop empty labels.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Parse an RFC 3339 or naive ISO-8601 timestamp. Naive values are local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local));
    }
    let naive = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// (subject, relation, object), persisted as a three-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct Triple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

impl From<(String, String, String)> for Triple {
    fn from((subject, relation, object): (String, String, String)) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }
}

impl From<Triple> for (String, String, String) {
    fn from(triple: Triple) -> Self {
        (triple.subject, triple.relation, triple.object)
    }
}

/// A statement to remember, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thought {
    pub key: String,
    pub text: String,
    /// Falls back to the configured default tone.
    pub tone: Option<String>,
    pub tags: Vec<String>,
    pub relation: Option<String>,
    pub triple: Option<Triple>,
}

impl Thought {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn triple(mut self, triple: Triple) -> Self {
        self.triple = Some(triple);
        self
    }
}

/// What `MemoryStore::add` did with a thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// A record with the same text and tone already exists under the key.
    Duplicate,
    /// Blank key; nothing stored.
    Ignored,
}

/// Per-pass contributions to a candidate's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub key_token: f64,
    pub key_similarity: f64,
    pub token_overlap: f64,
    pub fallback: f64,
    /// Recency bonus added by freshness rescoring.
    #[serde(default)]
    pub freshness: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.key_token + self.key_similarity + self.token_overlap + self.fallback + self.freshness
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub key: String,
    pub record: MemoryRecord,
    pub score: f64,
    /// Present only for debug searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

/// How `ask` arrived at its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Search,
    ShoppingIntent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub result: RankedResult,
    pub via: AnswerSource,
}

/// Summary of an index rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Which persisted sources fed the index.
    pub source: String,
    pub keys: usize,
    pub entries: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHealth {
    pub tokens: usize,
    pub probe_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub keys: usize,
    pub records: usize,
    pub triggers: usize,
    pub path: PathBuf,
}
