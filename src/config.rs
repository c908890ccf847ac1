//! Command-line configuration: store location, ranking, logging.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lastivka_memory::MemoryConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `store.path`.
pub const STORE_PATH_ENV: &str = "LASTIVKA_MEMORY_STORE";

const STORE_FILE_NAME: &str = "memory_store.json";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Older sectioned memory file merged into search results.
    pub legacy_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            legacy_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_store_path() -> String {
    ProjectDirs::from("", "", "lastivka")
        .map(|dirs| dirs.data_dir().join(STORE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(STORE_FILE_NAME))
        .to_string_lossy()
        .into_owned()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load from `path`; a missing file yields defaults.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        let expanded_path = Path::new(expanded_path.as_ref());
        if !expanded_path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = fs::read_to_string(expanded_path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(STORE_PATH_ENV) {
            if !path.trim().is_empty() {
                self.store.path = path;
            }
        }
        self
    }

    /// Store file path with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        expand(&self.store.path)
    }

    pub fn legacy_path(&self) -> Option<PathBuf> {
        self.store.legacy_path.as_deref().map(expand)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Default location of the config file.
pub fn default_config_path() -> String {
    ProjectDirs::from("", "", "lastivka")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("lastivka.toml"))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.memory, MemoryConfig::default());
        assert_eq!(config.logging.level, "warn");
        assert!(config.store.path.ends_with(STORE_FILE_NAME));
        assert!(config.store.legacy_path.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let config: Config = toml::from_str(
            r#"
[store]
path = "~/lastivka/memory.json"
legacy_path = "/tmp/legacy.json"

[memory]
freshness_weight = 0.0
default_tone = "радість"

[memory.weights]
exact = 300.0

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.memory.weights.exact, 300.0);
        assert_eq!(config.memory.weights.prefix, 65.0);
        assert_eq!(config.memory.default_tone, "радість");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.legacy_path(), Some(PathBuf::from("/tmp/legacy.json")));
        assert!(config.store_path().ends_with("lastivka/memory.json"));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = Config::default();
        config.store.path = "/var/lib/lastivka/memory.json".into();
        config.memory.default_limit = 3;

        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
