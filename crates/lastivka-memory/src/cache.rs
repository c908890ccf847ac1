//! Lazily rebuilt search view over the store.
//!
//! Without a legacy source the index resolves straight against the store's
//! own map. With one, it keeps the merged snapshot it was built from, so
//! index locations always resolve against the records they were computed for.

use tracing::info;

use crate::merge::merge_sources;
use crate::search::{InvertedIndex, SearchOptions};
use crate::types::{IndexStats, MemoryMap, RankedResult};

/// Index plus the merged snapshot it describes, when one was needed.
#[derive(Debug, Clone)]
pub struct IndexCache {
    dirty: bool,
    merged: Option<MemoryMap>,
    index: InvertedIndex,
    source: &'static str,
    keys: usize,
    entries: usize,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self {
            dirty: true,
            merged: None,
            index: InvertedIndex::default(),
            source: "empty",
            keys: 0,
            entries: 0,
        }
    }
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store contents changed; rebuild before the next query.
    pub fn mark_stale(&mut self) {
        self.dirty = true;
    }

    pub fn is_stale(&self) -> bool {
        self.dirty
    }

    /// Reindex `primary`, merged with `legacy` when that has records.
    ///
    /// Later calls that take `primary` must pass the same, unchanged map
    /// until the cache is rebuilt.
    pub fn rebuild(&mut self, primary: &MemoryMap, legacy: Option<&MemoryMap>) -> IndexStats {
        let legacy = legacy.filter(|legacy| !legacy.is_empty());
        self.source = match (primary.is_empty(), legacy.is_some()) {
            (false, true) => "primary+legacy",
            (false, false) => "primary",
            (true, true) => "legacy",
            (true, false) => "empty",
        };
        self.merged = legacy.map(|legacy| merge_sources(primary, legacy));

        let view = self.merged.as_ref().unwrap_or(primary);
        let index = InvertedIndex::build(view);
        let keys = view.len();
        let entries = view.values().map(Vec::len).sum();
        self.index = index;
        self.keys = keys;
        self.entries = entries;
        self.dirty = false;

        let stats = self.stats();
        info!(
            source = stats.source,
            keys = stats.keys,
            entries = stats.entries,
            tokens = stats.tokens,
            "memory index rebuilt"
        );
        stats
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            source: self.source.to_string(),
            keys: self.keys,
            entries: self.entries,
            tokens: self.index.token_count(),
        }
    }

    pub fn token_count(&self) -> usize {
        self.index.token_count()
    }

    /// The records the index describes: the merged snapshot, or `primary`.
    pub fn view<'a>(&'a self, primary: &'a MemoryMap) -> &'a MemoryMap {
        self.merged.as_ref().unwrap_or(primary)
    }

    /// Whether every indexed location still points at a record.
    pub fn resolves(&self, primary: &MemoryMap) -> bool {
        self.index.resolves(self.view(primary))
    }

    pub fn search(
        &self,
        primary: &MemoryMap,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<RankedResult> {
        self.index.search(self.view(primary), query, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::decode_memory_map;
    use serde_json::json;

    #[test]
    fn starts_stale_and_clears_on_rebuild() {
        let mut cache = IndexCache::new();
        assert!(cache.is_stale());

        let stats = cache.rebuild(&MemoryMap::new(), None);
        assert!(!cache.is_stale());
        assert_eq!(stats.source, "empty");
        assert_eq!(stats.entries, 0);

        cache.mark_stale();
        assert!(cache.is_stale());
    }

    #[test]
    fn rebuild_labels_and_merges_sources() {
        let (primary, _) = decode_memory_map(json!({"чай": [{"text": "зелений", "tone": "x"}]}));
        let (legacy, _) = decode_memory_map(json!({
            "чай": {"value": "зелений", "tone": "X"},
            "сир": {"value": "твердий"}
        }));

        let mut cache = IndexCache::new();
        let stats = cache.rebuild(&primary, Some(&legacy));
        assert_eq!(stats.source, "primary+legacy");
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.entries, 2);
        assert!(stats.tokens > 0);

        let results = cache.search(&primary, "твердий", &SearchOptions::default());
        assert_eq!(results[0].key, "сир");
        assert_eq!(cache.view(&primary).len(), 2);

        assert_eq!(cache.rebuild(&primary, None).source, "primary");
        assert_eq!(cache.rebuild(&MemoryMap::new(), Some(&legacy)).source, "legacy");
        assert_eq!(cache.rebuild(&primary, Some(&MemoryMap::new())).source, "primary");
    }

    #[test]
    fn without_legacy_resolves_against_primary() {
        let (primary, _) = decode_memory_map(json!({
            "чай": [{"text": "зелений"}, {"text": "чорний"}]
        }));
        let mut cache = IndexCache::new();
        let stats = cache.rebuild(&primary, None);
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.entries, 2);
        assert!(std::ptr::eq(cache.view(&primary), &primary));
        assert!(cache.resolves(&primary));

        let results = cache.search(&primary, "чорний", &SearchOptions::default());
        assert_eq!(results[0].record.text, "чорний");
    }

    #[test]
    fn resolves_fails_once_records_are_gone() {
        let (primary, _) = decode_memory_map(json!({
            "чай": [{"text": "зелений"}, {"text": "чорний"}]
        }));
        let (shrunk, _) = decode_memory_map(json!({"чай": [{"text": "зелений"}]}));
        let mut cache = IndexCache::new();
        cache.rebuild(&primary, None);
        assert!(!cache.resolves(&shrunk));
        assert!(!cache.resolves(&MemoryMap::new()));
    }
}
