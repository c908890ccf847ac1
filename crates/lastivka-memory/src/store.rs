//! Persistent memory store.
//!
//! The store owns every record. Each mutation rewrites the whole file through
//! a temp file in the same directory followed by an atomic rename, so the
//! file on disk is always either the old or the new version.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cache::IndexCache;
use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::intent::{best_shopping_record, is_shopping_query, SHOPPING_SCORE};
use crate::merge::{decode_memory_map, parse_document, Triggers, TRIGGERS_KEY};
use crate::normalize::{normalize_key, within_one_edit};
use crate::search::SearchOptions;
use crate::types::{
    normalize_tags, signature, AddOutcome, Answer, AnswerSource, IndexHealth, IndexStats,
    MemoryMap, MemoryRecord, RankedResult, StoreStats, Thought, Triple, DEFAULT_RELATION,
};

/// Query used by `verify_index` to exercise the search path.
const PROBE_QUERY: &str = "перевірка";

/// Keys whose length differs from the query by more than this are not
/// considered near matches by `find`.
const FIND_LENGTH_SLACK: usize = 2;

#[derive(Debug, Default)]
struct StoreState {
    memory: MemoryMap,
    triggers: Triggers,
    cache: IndexCache,
}

/// Long-term memory backed by a JSON file.
///
/// Safe to share between threads: writers serialize on an internal lock
/// held across the in-memory change and the file rewrite.
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
    config: MemoryConfig,
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Open the store at `path`, creating an empty file if none exists.
    ///
    /// An unreadable or malformed file loads as an empty store.
    pub fn open(path: impl Into<PathBuf>, config: MemoryConfig) -> Result<Self> {
        let path = path.into();
        let store = Self {
            path,
            legacy_path: None,
            config,
            state: RwLock::new(StoreState::default()),
        };
        if store.path.exists() {
            store.reload();
        } else {
            store.persist(&store.state.read())?;
            info!(path = %store.path.display(), "created empty memory store");
        }
        Ok(store)
    }

    /// Also index records from an older sectioned memory file.
    pub fn with_legacy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_path = Some(path.into());
        self.state.get_mut().cache.mark_stale();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Search options carrying the configured limit and weights.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::new(self.config.default_limit).weights(self.config.weights)
    }

    /// Re-read the store file, replacing in-memory state.
    pub fn reload(&self) {
        let (memory, triggers) = read_memory_file(&self.path);
        let mut state = self.state.write();
        state.memory = memory;
        state.triggers = triggers;
        state.cache.mark_stale();
    }

    /// Remember a thought.
    ///
    /// A blank key is ignored. A thought whose text and tone match an
    /// existing record under the same key (ignoring case) is not stored again.
    pub fn add(&self, thought: Thought) -> Result<AddOutcome> {
        let key_raw = thought.key.trim();
        if key_raw.is_empty() {
            return Ok(AddOutcome::Ignored);
        }
        let key_norm = normalize_key(key_raw);
        if key_norm == TRIGGERS_KEY {
            warn!(key = key_raw, "refusing to store memory under the reserved triggers key");
            return Ok(AddOutcome::Ignored);
        }

        let text = thought.text.trim().to_string();
        let tone = thought
            .tone
            .unwrap_or_else(|| self.config.default_tone.clone());
        let relation = thought
            .relation
            .filter(|relation| !relation.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RELATION.to_string());

        let mut state = self.state.write();
        let wanted = signature(&text, &tone);
        let duplicate = state
            .memory
            .get(&key_norm)
            .is_some_and(|records| records.iter().any(|record| record.signature() == wanted));
        if duplicate {
            debug!(key = %key_norm, "duplicate thought ignored");
            return Ok(AddOutcome::Duplicate);
        }

        let triple = thought
            .triple
            .unwrap_or_else(|| Triple::new(key_norm.clone(), relation.clone(), text.clone()));
        let record = MemoryRecord {
            key_raw: key_raw.to_string(),
            key_norm: key_norm.clone(),
            text,
            tone,
            timestamp: Local::now().to_rfc3339(),
            tags: normalize_tags(&thought.tags),
            relation: Some(relation),
            triple: Some(triple),
        };
        state.memory.entry(key_norm.clone()).or_default().push(record);
        state.cache.mark_stale();
        if let Err(err) = self.persist(&state) {
            if let Some(records) = state.memory.get_mut(&key_norm) {
                records.pop();
                if records.is_empty() {
                    state.memory.remove(&key_norm);
                }
            }
            return Err(err);
        }
        Ok(AddOutcome::Added)
    }

    /// Shorthand for [`MemoryStore::add`] with the common fields.
    pub fn add_thought<I, S>(&self, key: &str, text: &str, tone: &str, tags: I) -> Result<AddOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(Thought::new(key, text).tone(tone).tags(tags))
    }

    /// Records under `key`, in insertion order.
    pub fn get_by_key(&self, key: &str) -> Vec<MemoryRecord> {
        let key_norm = normalize_key(key);
        self.state
            .read()
            .memory
            .get(&key_norm)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every record.
    pub fn get_all(&self) -> MemoryMap {
        self.state.read().memory.clone()
    }

    /// Drop every record under `key`. Returns whether anything was removed.
    pub fn delete_by_key(&self, key: &str) -> Result<bool> {
        let key_norm = normalize_key(key);
        let mut state = self.state.write();
        let Some(removed) = state.memory.remove(&key_norm) else {
            return Ok(false);
        };
        state.cache.mark_stale();
        if let Err(err) = self.persist(&state) {
            state.memory.insert(key_norm, removed);
            return Err(err);
        }
        Ok(true)
    }

    /// Forget everything. Triggers are kept.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        let previous = std::mem::take(&mut state.memory);
        state.cache.mark_stale();
        if let Err(err) = self.persist(&state) {
            state.memory = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Write the full store to `path`, leaving the store file untouched.
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.state.read();
        write_atomic(path.as_ref(), &encode(&state)?)
    }

    /// Normalized keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().memory.keys().cloned().collect()
    }

    /// Records carrying `tag`, most recent first.
    pub fn search_by_tag(&self, tag: &str) -> Vec<MemoryRecord> {
        let mut found: Vec<MemoryRecord> = self
            .state
            .read()
            .memory
            .values()
            .flatten()
            .filter(|record| record.has_tag(tag))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        found
    }

    /// Records by key: exact match, else key prefix, else keys one edit away.
    pub fn find(&self, query: &str) -> Vec<MemoryRecord> {
        let wanted = normalize_key(query);
        let state = self.state.read();
        if let Some(records) = state.memory.get(&wanted) {
            return records.clone();
        }
        if wanted.is_empty() {
            return Vec::new();
        }

        let prefixed: Vec<MemoryRecord> = state
            .memory
            .iter()
            .filter(|(key, _)| key.starts_with(&wanted))
            .flat_map(|(_, records)| records.iter().cloned())
            .collect();
        if !prefixed.is_empty() {
            return prefixed;
        }

        let wanted_len = wanted.chars().count();
        state
            .memory
            .iter()
            .filter(|(key, _)| key.chars().count().abs_diff(wanted_len) <= FIND_LENGTH_SLACK)
            .filter(|(key, _)| within_one_edit(key, &wanted))
            .flat_map(|(_, records)| records.iter().cloned())
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            keys: state.memory.len(),
            records: state.memory.values().map(Vec::len).sum(),
            triggers: state.triggers.len(),
            path: self.path.clone(),
        }
    }

    /// Key -> response triggers, as loaded.
    pub fn triggers(&self) -> Triggers {
        self.state.read().triggers.clone()
    }

    /// Ranked records for `query`.
    pub fn smart_search(&self, query: &str, options: &SearchOptions) -> Vec<RankedResult> {
        let state = self.fresh_state();
        state.cache.search(&state.memory, query, options)
    }

    /// Best single answer for `query`.
    ///
    /// Falls back to the most relevant shopping record when nothing matches
    /// lexically and the query asks what to buy.
    pub fn ask(&self, query: &str) -> Option<Answer> {
        let options = self.search_options();
        let state = self.fresh_state();
        if let Some(result) = state
            .cache
            .search(&state.memory, query, &SearchOptions { limit: 1, ..options })
            .into_iter()
            .next()
        {
            return Some(Answer {
                result,
                via: AnswerSource::Search,
            });
        }

        if !is_shopping_query(query) {
            return None;
        }
        let (key, record) = best_shopping_record(&state.memory)?;
        debug!(key, "answered from shopping fallback");
        Some(Answer {
            result: RankedResult {
                key: key.to_string(),
                record: record.clone(),
                score: SHOPPING_SCORE,
                breakdown: None,
            },
            via: AnswerSource::ShoppingIntent,
        })
    }

    /// Rebuild the index from the store and the legacy file, if configured.
    pub fn rebuild_index(&self) -> IndexStats {
        let legacy = self.read_legacy();
        let mut state = self.state.write();
        let StoreState { memory, cache, .. } = &mut *state;
        cache.rebuild(memory, legacy.as_ref())
    }

    /// Rebuild the index if needed, then check that every indexed location
    /// resolves to a record and that a probe search honours its limit.
    pub fn verify_index(&self) -> IndexHealth {
        let state = self.fresh_state();
        let tokens = state.cache.token_count();
        let probe = state
            .cache
            .search(&state.memory, PROBE_QUERY, &SearchOptions::new(1));
        let health = IndexHealth {
            tokens,
            probe_ok: state.cache.resolves(&state.memory) && probe.len() <= 1,
        };
        info!(tokens, probe_ok = health.probe_ok, "memory index verified");
        health
    }

    /// The index lives in memory only; there is nothing to compact.
    pub fn compact_index(&self) {
        info!("memory index compact: nothing to compact");
    }

    /// Read access with an up-to-date index.
    ///
    /// A stale index is rebuilt under the write lock, so a rebuild never
    /// interleaves with a mutation.
    fn fresh_state(&self) -> RwLockReadGuard<'_, StoreState> {
        let state = self.state.read();
        if !state.cache.is_stale() {
            return state;
        }
        drop(state);

        let legacy = self.read_legacy();
        let mut state = self.state.write();
        if state.cache.is_stale() {
            let StoreState { memory, cache, .. } = &mut *state;
            cache.rebuild(memory, legacy.as_ref());
        }
        RwLockWriteGuard::downgrade(state)
    }

    fn read_legacy(&self) -> Option<MemoryMap> {
        let path = self.legacy_path.as_deref()?;
        if !path.exists() {
            return None;
        }
        Some(read_memory_file(path).0)
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        write_atomic(&self.path, &encode(state)?)
    }
}

/// Load a memory file, degrading to empty on any problem.
fn read_memory_file(path: &Path) -> (MemoryMap, Triggers) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return (MemoryMap::new(), Triggers::new());
        }
        Err(err) => {
            warn!(path = %path.display(), "cannot read memory file: {err}");
            return (MemoryMap::new(), Triggers::new());
        }
    };
    match parse_document(&contents) {
        Some(document) => decode_memory_map(document),
        None => {
            warn!(path = %path.display(), "memory file is empty or malformed; starting empty");
            (MemoryMap::new(), Triggers::new())
        }
    }
}

fn encode(state: &StoreState) -> Result<Vec<u8>> {
    let mut document = Map::new();
    for (key, records) in &state.memory {
        document.insert(key.clone(), serde_json::to_value(records)?);
    }
    document.insert(TRIGGERS_KEY.to_string(), Value::Object(state.triggers.clone()));
    Ok(serde_json::to_vec_pretty(&Value::Object(document))?)
}

/// Replace `path` with `bytes` via a synced temp file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| MemoryError::io("create directory", parent, err))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| MemoryError::io("create temporary file in", parent, err))?;
    if let Err(err) = write_synced(&mut temp, bytes) {
        return Err(MemoryError::io("write", temp.path(), err));
    }
    temp.persist(path).map_err(|err| MemoryError::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

fn write_synced(temp: &mut NamedTempFile, bytes: &[u8]) -> io::Result<()> {
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()
}
