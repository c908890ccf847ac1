//! Decoding persisted memory files and reconciling two sources.
//!
//! Both the primary store file and the older sectioned format are read
//! through the same decoder: each top-level entry is a bucket that may be a
//! list of records, an object wrapping a list under `items` or `entries`,
//! or a single record object.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::normalize::normalize_key;
use crate::types::{normalize_tags, signature, MemoryMap, MemoryRecord, Triple};

/// Reserved top-level entry holding key -> response triggers.
pub const TRIGGERS_KEY: &str = "triggers";

/// Top-level triggers object, kept verbatim.
pub type Triggers = Map<String, Value>;

/// Shapes a persisted bucket can take.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBucket {
    List(Vec<Value>),
    Items { items: Vec<Value> },
    Entries { entries: Vec<Value> },
    Single(Map<String, Value>),
    Other(Value),
}

impl RawBucket {
    fn into_values(self) -> Vec<Value> {
        match self {
            RawBucket::List(values)
            | RawBucket::Items { items: values }
            | RawBucket::Entries { entries: values } => values,
            RawBucket::Single(record) => vec![Value::Object(record)],
            RawBucket::Other(_) => Vec::new(),
        }
    }
}

/// A record as found on disk; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    key_raw: Option<String>,
    text: Option<Value>,
    value: Option<Value>,
    tone: Option<String>,
    timestamp: Option<String>,
    ts: Option<String>,
    tags: Option<Value>,
    rel: Option<String>,
    triple: Option<Value>,
}

impl RawRecord {
    fn into_record(self, section: &str, key_norm: &str) -> MemoryRecord {
        let text = self
            .text
            .as_ref()
            .map(scalar_text)
            .filter(|text| !text.is_empty())
            .or_else(|| self.value.as_ref().map(scalar_text))
            .unwrap_or_default();
        let tags = match self.tags {
            Some(Value::Array(items)) => normalize_tags(items.iter().map(scalar_text)),
            Some(Value::String(tag)) => normalize_tags([tag]),
            _ => BTreeSet::new(),
        };
        MemoryRecord {
            key_raw: self.key_raw.unwrap_or_else(|| section.to_string()),
            key_norm: key_norm.to_string(),
            text,
            tone: self.tone.unwrap_or_default(),
            timestamp: self.timestamp.or(self.ts).unwrap_or_default(),
            tags,
            relation: self.rel,
            triple: self.triple.as_ref().and_then(decode_triple),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_triple(value: &Value) -> Option<Triple> {
    match value.as_array()?.as_slice() {
        [subject, relation, object] => Some(Triple::new(
            scalar_text(subject),
            scalar_text(relation),
            scalar_text(object),
        )),
        _ => None,
    }
}

/// Decode one bucket; misshaped records are skipped.
fn decode_bucket(section: &str, key_norm: &str, bucket: Value) -> Vec<MemoryRecord> {
    let values = match RawBucket::deserialize(bucket) {
        Ok(bucket) => bucket.into_values(),
        Err(_) => return Vec::new(),
    };
    values
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|value| match RawRecord::deserialize(value) {
            Ok(raw) => Some(raw.into_record(section, key_norm)),
            Err(err) => {
                warn!(section, "skipping malformed memory record: {err}");
                None
            }
        })
        .collect()
}

/// Decode a whole persisted document into memory and triggers.
///
/// Anything other than a JSON object yields an empty result. Records are
/// filed under the normalized section name.
pub fn decode_memory_map(document: Value) -> (MemoryMap, Triggers) {
    let Value::Object(sections) = document else {
        warn!("memory file top level is not an object; ignoring it");
        return (MemoryMap::new(), Triggers::new());
    };

    let mut memory = MemoryMap::new();
    let mut triggers = Triggers::new();
    for (section, bucket) in sections {
        if section == TRIGGERS_KEY {
            if let Value::Object(map) = bucket {
                triggers = map;
            }
            continue;
        }
        let key_norm = normalize_key(&section);
        if key_norm.is_empty() {
            continue;
        }
        let records = decode_bucket(&section, &key_norm, bucket);
        if !records.is_empty() {
            memory.entry(key_norm).or_default().extend(records);
        }
    }
    (memory, triggers)
}

/// Parse persisted text, tolerating a leading BOM and blank content.
pub fn parse_document(contents: &str) -> Option<Value> {
    let contents = contents.trim_start_matches('\u{feff}');
    if contents.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(contents) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("memory file is not valid JSON: {err}");
            None
        }
    }
}

/// Union of two mappings, primary records first.
///
/// Within a key, a record whose case-insensitive (text, tone) signature is
/// already present is dropped. Neither input is modified.
pub fn merge_sources(primary: &MemoryMap, secondary: &MemoryMap) -> MemoryMap {
    let mut merged = MemoryMap::new();
    for source in [primary, secondary] {
        for (key, records) in source {
            let bucket = merged.entry(key.clone()).or_default();
            let mut seen: BTreeSet<(String, String)> =
                bucket.iter().map(MemoryRecord::signature).collect();
            for record in records {
                if seen.insert(signature(&record.text, &record.tone)) {
                    bucket.push(record.clone());
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_primary_shape() {
        let (memory, triggers) = decode_memory_map(json!({
            "кав": [{
                "key_raw": "кава",
                "key_norm": "кав",
                "text": "чорна",
                "tone": "нейтральний",
                "timestamp": "2025-08-20T10:00:00",
                "tags": ["напій"],
                "rel": "is",
                "triple": ["кав", "is", "чорна"]
            }],
            "triggers": {"привіт": "вітаю"}
        }));

        assert_eq!(triggers.len(), 1);
        let record = &memory["кав"][0];
        assert_eq!(record.key_raw, "кава");
        assert_eq!(record.relation.as_deref(), Some("is"));
        assert_eq!(record.triple_object(), Some("чорна"));
        assert!(record.has_tag("напій"));
    }

    #[test]
    fn decodes_legacy_bucket_shapes() {
        let (memory, _) = decode_memory_map(json!({
            "Кава": {"value": "чорна", "ts": "2025-01-01"},
            "чай": {"items": [{"text": "зелений"}, 5, {"text": "чорний"}]},
            "сир": {"entries": [{"text": "твердий"}]},
            "мед": [{"value": 42}],
            "число": 7,
            "  ": [{"text": "порожній ключ"}]
        }));

        assert_eq!(memory["кав"][0].text, "чорна");
        assert_eq!(memory["кав"][0].key_raw, "Кава");
        assert_eq!(memory["кав"][0].timestamp, "2025-01-01");
        assert_eq!(memory["чай"].len(), 2);
        assert_eq!(memory["сир"][0].text, "твердий");
        assert_eq!(memory["мед"][0].text, "42");
        assert!(!memory.contains_key("число"));
        assert_eq!(memory.len(), 4);
    }

    #[test]
    fn skips_records_with_wrong_field_types() {
        let (memory, _) = decode_memory_map(json!({
            "чай": [{"text": "зелений", "tone": 5}, {"text": "чорний"}]
        }));
        assert_eq!(memory["чай"].len(), 1);
        assert_eq!(memory["чай"][0].text, "чорний");
    }

    #[test]
    fn non_object_document_is_empty() {
        let (memory, triggers) = decode_memory_map(json!([1, 2, 3]));
        assert!(memory.is_empty());
        assert!(triggers.is_empty());
    }

    #[test]
    fn parse_document_tolerates_bom_and_blank() {
        assert!(parse_document("").is_none());
        assert!(parse_document("  \n").is_none());
        assert!(parse_document("{not json").is_none());
        assert_eq!(parse_document("\u{feff}{}"), Some(json!({})));
    }

    #[test]
    fn merge_keeps_primary_first_and_dedups() {
        let (primary, _) = decode_memory_map(json!({
            "чай": [{"text": "Зелений", "tone": "радість"}]
        }));
        let (secondary, _) = decode_memory_map(json!({
            "чай": [
                {"text": "зелений ", "tone": "Радість"},
                {"text": "чорний", "tone": "радість"}
            ],
            "сир": {"value": "твердий"}
        }));

        let merged = merge_sources(&primary, &secondary);
        let texts: Vec<&str> = merged["чай"].iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Зелений", "чорний"]);
        assert_eq!(merged["сир"].len(), 1);
        assert_eq!(primary["чай"].len(), 1);
        assert_eq!(secondary["чай"].len(), 2);
    }
}
