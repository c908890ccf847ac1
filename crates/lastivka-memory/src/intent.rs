//! "What should I buy" fallback for `ask`.

use std::sync::OnceLock;

use regex::Regex;

use crate::normalize::normalize_text;
use crate::types::{MemoryMap, MemoryRecord};

/// Score reported for an answer picked by the shopping fallback.
pub const SHOPPING_SCORE: f64 = 50.0;

const TAG_PRIORITY: [(&str, u8); 6] = [
    ("покупка", 3),
    ("покупки", 3),
    ("товар", 3),
    ("магазин", 3),
    ("напій", 2),
    ("їжа", 1),
];

fn shopping_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(куп\w*|придб\w*|візьми|додай до списку)\b").ok())
        .as_ref()
}

/// True when `query` asks what to buy.
pub fn is_shopping_query(query: &str) -> bool {
    shopping_pattern().is_some_and(|pattern| pattern.is_match(&normalize_text(query)))
}

fn tag_priority(record: &MemoryRecord) -> u8 {
    TAG_PRIORITY
        .iter()
        .filter(|(tag, _)| record.tags.contains(*tag))
        .map(|(_, priority)| *priority)
        .max()
        .unwrap_or(0)
}

/// The record with the highest tag priority, then the latest timestamp.
///
/// The first record in store order wins a tie.
pub fn best_shopping_record(memory: &MemoryMap) -> Option<(&str, &MemoryRecord)> {
    let mut best: Option<(&str, &MemoryRecord)> = None;
    let mut best_rank = None;
    for (key, records) in memory {
        for record in records {
            let rank = (tag_priority(record), record.created_at());
            if best_rank.as_ref().map_or(true, |current| rank > *current) {
                best_rank = Some(rank);
                best = Some((key.as_str(), record));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize_tags;

    fn record(text: &str, tags: &[&str], timestamp: &str) -> MemoryRecord {
        MemoryRecord {
            key_raw: text.to_string(),
            key_norm: text.to_string(),
            text: text.to_string(),
            tone: String::new(),
            timestamp: timestamp.to_string(),
            tags: normalize_tags(tags.iter().copied()),
            relation: None,
            triple: None,
        }
    }

    #[test]
    fn detects_shopping_verbs() {
        assert!(is_shopping_query("Що купити?"));
        assert!(is_shopping_query("треба придбати хліб"));
        assert!(is_shopping_query("візьми молоко"));
        assert!(is_shopping_query("додай до списку сир"));
        assert!(!is_shopping_query("що я казав про каву"));
        assert!(!is_shopping_query(""));
    }

    #[test]
    fn prefers_priority_then_recency() {
        let mut memory = MemoryMap::new();
        memory.insert(
            "а".into(),
            vec![
                record("сік", &["напій"], "2025-08-01T10:00:00"),
                record("книга", &["подарунок"], "2025-09-01T10:00:00"),
            ],
        );
        memory.insert(
            "б".into(),
            vec![
                record("хліб", &["покупка"], "2025-07-01T10:00:00"),
                record("молоко", &["Товар"], "2025-07-02T10:00:00"),
            ],
        );

        let (key, best) = best_shopping_record(&memory).expect("a candidate");
        assert_eq!(key, "б");
        assert_eq!(best.text, "молоко");
    }

    #[test]
    fn first_record_wins_a_tie() {
        let mut memory = MemoryMap::new();
        memory.insert(
            "а".into(),
            vec![
                record("перший", &[], "2025-07-01T10:00:00"),
                record("другий", &[], "2025-07-01T10:00:00"),
            ],
        );
        assert_eq!(best_shopping_record(&memory).expect("a candidate").1.text, "перший");
    }

    #[test]
    fn empty_memory_has_no_answer() {
        assert!(best_shopping_record(&MemoryMap::new()).is_none());
    }
}
