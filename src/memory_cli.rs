//! CLI subcommands for long-term memory.
//!
//! Provides `lastivka remember <key> <text>`, `lastivka search <query>`,
//! `lastivka ask <question>` and the index maintenance commands, each a thin
//! wrapper over one [`MemoryStore`] operation.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Subcommand;
use lastivka_memory::{
    rescore, AnswerSource, MemoryRecord, MemoryStore, RankedResult, ScoringWeights, Thought,
};
use serde_json::Value;

/// Key used by `insert` when none is given.
pub const DEFAULT_INSERT_KEY: &str = "manual/notes";

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MemoryCommands {
    /// Remember a thought under a key
    Remember {
        /// Topic key
        key: String,
        /// Text to remember
        text: String,
        /// Emotional tone (default from config)
        #[arg(long)]
        tone: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Relation label for the attached triple
        #[arg(long)]
        rel: Option<String>,
    },
    /// Quickly note a thought under a catch-all key
    Insert {
        /// Text to remember
        text: String,
        #[arg(short, long, default_value = DEFAULT_INSERT_KEY)]
        key: String,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Show everything remembered under a key
    Recall { key: String },
    /// Forget (delete) every thought under a key
    Forget { key: String },
    /// List all memory entries
    List,
    /// Show thoughts carrying a tag, newest first
    Tags {
        tag: String,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Look up thoughts by key: exact, prefix, or near spelling
    Find { query: String },
    /// Ranked search over keys, text, and triples
    Search {
        query: String,
        /// Maximum number of results (default from config)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print per-pass score breakdowns
        #[arg(long)]
        debug: bool,
        /// Print only the best result
        #[arg(long)]
        best: bool,
        /// Skip the recency bonus
        #[arg(long)]
        no_fresh: bool,
        /// Maximum recency bonus (default from config)
        #[arg(long)]
        fresh_weight: Option<f64>,
        /// JSON object overriding individual ranking weights
        #[arg(long)]
        weights: Option<String>,
    },
    /// Answer a question with the single best memory
    Ask { question: String },
    /// Write the whole store to another file
    Export { path: PathBuf },
    /// List stored keys
    Keys,
    /// Show store statistics
    Stats,
    /// Forget everything
    Clear,
    /// Rebuild the search index
    Rebuild,
    /// Rebuild if needed and probe the search index
    Verify,
    /// Compact the search index
    Compact,
}

/// Overlay a JSON object of weights onto `base`.
pub fn parse_weights(base: &ScoringWeights, overrides: &str) -> Result<ScoringWeights> {
    let overrides: Value =
        serde_json::from_str(overrides).context("Weights must be a JSON object")?;
    let Value::Object(overrides) = overrides else {
        anyhow::bail!("Weights must be a JSON object");
    };
    let mut merged = serde_json::to_value(base)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    serde_json::from_value(merged).context("Invalid ranking weights")
}

/// Timestamp as local minutes; unreadable values are shown as stored.
fn format_timestamp(created: Option<DateTime<Local>>, raw: &str) -> String {
    match created {
        Some(created) => created.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

fn format_record(record: &MemoryRecord) -> String {
    format!(
        "{} | {} | {}",
        format_timestamp(record.created_at(), &record.timestamp),
        record.tone,
        record.text
    )
}

fn format_ranked(result: &RankedResult) -> String {
    format!("[{:.2}] {} | {}", result.score, result.key, format_record(&result.record))
}

fn print_records(out: &mut impl Write, records: &[MemoryRecord], empty: &str) -> Result<()> {
    if records.is_empty() {
        writeln!(out, "{empty}")?;
    }
    for record in records {
        writeln!(out, "{}", format_record(record))?;
    }
    Ok(())
}

pub fn handle_command(cmd: MemoryCommands, store: &MemoryStore, out: &mut impl Write) -> Result<()> {
    match cmd {
        MemoryCommands::Remember {
            key,
            text,
            tone,
            tags,
            rel,
        } => {
            let mut thought = Thought::new(&key, &text).tags(tags);
            thought.tone = tone;
            thought.relation = rel;
            let outcome = store
                .add(thought)
                .with_context(|| format!("Failed to remember {key}"))?;
            writeln!(out, "{outcome:?}: {key} -> {text}")?;
        }

        MemoryCommands::Insert {
            text,
            key,
            tone,
            tags,
        } => {
            let mut thought = Thought::new(&key, &text).tags(tags);
            thought.tone = tone;
            let outcome = store
                .add(thought)
                .with_context(|| format!("Failed to remember {key}"))?;
            writeln!(out, "{outcome:?}: {key} -> {text}")?;
        }

        MemoryCommands::Recall { key } => {
            let records = store.get_by_key(&key);
            print_records(out, &records, &format!("No memory found for key: {key}"))?;
        }

        MemoryCommands::Forget { key } => {
            if store
                .delete_by_key(&key)
                .with_context(|| format!("Failed to forget {key}"))?
            {
                writeln!(out, "Forgot memory: {key}")?;
            } else {
                writeln!(out, "No memory found for key: {key}")?;
            }
        }

        MemoryCommands::List => {
            let memory = store.get_all();
            if memory.is_empty() {
                writeln!(out, "No memory entries found.")?;
            }
            for (key, records) in &memory {
                writeln!(out, "{key} ({})", records.len())?;
                for record in records {
                    writeln!(out, "  {}", format_record(record))?;
                }
            }
        }

        MemoryCommands::Tags { tag, limit } => {
            let mut records = store.search_by_tag(&tag);
            records.truncate(limit);
            print_records(out, &records, &format!("No memory tagged: {tag}"))?;
        }

        MemoryCommands::Find { query } => {
            let records = store.find(&query);
            print_records(out, &records, &format!("Nothing found for: {query}"))?;
        }

        MemoryCommands::Search {
            query,
            limit,
            debug,
            best,
            no_fresh,
            fresh_weight,
            weights,
        } => {
            let mut options = store.search_options().debug(debug);
            if let Some(limit) = limit {
                options.limit = limit;
            }
            if best {
                options.limit = options.limit.min(1);
            }
            if let Some(weights) = weights {
                options.weights = parse_weights(&options.weights, &weights)?;
            }

            let mut results = store.smart_search(&query, &options);
            let fresh_weight = fresh_weight.unwrap_or(store.config().freshness_weight);
            if !no_fresh && fresh_weight > 0.0 {
                results = rescore(results, fresh_weight);
            }

            if results.is_empty() {
                writeln!(out, "Nothing found for: {query}")?;
            }
            for result in &results {
                writeln!(out, "{}", format_ranked(result))?;
                if let Some(breakdown) = &result.breakdown {
                    writeln!(
                        out,
                        "    key_token={:.2} key_similarity={:.2} token_overlap={:.2} fallback={:.2} freshness={:.2}",
                        breakdown.key_token,
                        breakdown.key_similarity,
                        breakdown.token_overlap,
                        breakdown.fallback,
                        breakdown.freshness
                    )?;
                }
            }
        }

        MemoryCommands::Ask { question } => match store.ask(&question) {
            Some(answer) => {
                let via = match answer.via {
                    AnswerSource::Search => "search",
                    AnswerSource::ShoppingIntent => "shopping",
                };
                writeln!(out, "{} ({via})", format_ranked(&answer.result))?;
            }
            None => writeln!(out, "No answer.")?,
        },

        MemoryCommands::Export { path } => {
            store
                .export_to(&path)
                .with_context(|| format!("Failed to export memory to {}", path.display()))?;
            writeln!(out, "Exported memory to {}", path.display())?;
        }

        MemoryCommands::Keys => {
            for key in store.keys() {
                writeln!(out, "{key}")?;
            }
        }

        MemoryCommands::Stats => {
            let stats = store.stats();
            writeln!(out, "Keys:     {}", stats.keys)?;
            writeln!(out, "Records:  {}", stats.records)?;
            writeln!(out, "Triggers: {}", stats.triggers)?;
            writeln!(out, "File:     {}", stats.path.display())?;
        }

        MemoryCommands::Clear => {
            store.clear().context("Failed to clear memory")?;
            writeln!(out, "Memory cleared")?;
        }

        MemoryCommands::Rebuild => {
            let stats = store.rebuild_index();
            writeln!(
                out,
                "Index rebuilt: source={}, keys={}, entries={}, tokens={}",
                stats.source, stats.keys, stats.entries, stats.tokens
            )?;
        }

        MemoryCommands::Verify => {
            let health = store.verify_index();
            let probe = if health.probe_ok { "OK" } else { "FAILED" };
            writeln!(out, "Index verified: tokens={}, probe={probe}", health.tokens)?;
        }

        MemoryCommands::Compact => {
            store.compact_index();
            writeln!(out, "Index compact: nothing to compact")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_overlay_keeps_base() {
        let base = ScoringWeights {
            exact: 7.0,
            ..Default::default()
        };
        let merged = parse_weights(&base, r#"{"token": 1.5}"#).unwrap();
        assert_eq!(merged.token, 1.5);
        assert_eq!(merged.exact, 7.0);
    }

    #[test]
    fn timestamps_print_as_local_minutes() {
        let mut record = MemoryRecord {
            key_raw: "кава".into(),
            key_norm: "кав".into(),
            text: "чорна".into(),
            tone: "радість".into(),
            timestamp: "2025-08-20T10:00:00".into(),
            tags: Default::default(),
            relation: None,
            triple: None,
        };
        assert_eq!(format_record(&record), "2025-08-20 10:00 | радість | чорна");

        record.timestamp = "колись".into();
        assert_eq!(format_record(&record), "колись | радість | чорна");
    }

    #[test]
    fn weights_must_be_an_object() {
        assert!(parse_weights(&ScoringWeights::default(), "[1, 2]").is_err());
        assert!(parse_weights(&ScoringWeights::default(), "{oops").is_err());
        assert!(parse_weights(&ScoringWeights::default(), r#"{"exact": "high"}"#).is_err());
    }
}
