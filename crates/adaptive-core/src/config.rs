//! Configuration management for Adaptive.
//!
//! Loads configuration from ${ADAPTIVE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::reasoning::{DEFAULT_SEPARATOR, DEFAULT_TAG_NAMES, ReasoningOptions, TagPatterns};

/// Comma-separated tag names overriding `[reasoning].tag_patterns`.
pub const REASONING_TAGS_ENV: &str = "ADAPTIVE_REASONING_TAGS";

pub mod paths {
    //! Path resolution for Adaptive configuration.
    //!
    //! ADAPTIVE_HOME resolution order:
    //! 1. ADAPTIVE_HOME environment variable (if set)
    //! 2. ~/.config/adaptive (default)

    use std::path::PathBuf;

    /// Returns the Adaptive home directory.
    pub fn adaptive_home() -> PathBuf {
        if let Ok(home) = std::env::var("ADAPTIVE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".adaptive"),
            |h| h.join(".config").join("adaptive"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        adaptive_home().join("config.toml")
    }
}

/// Reasoning extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Candidate tag names, tried in order
    pub tag_patterns: Vec<String>,
    /// Custom expression used instead of `tag_patterns`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub separator: String,
    pub start_with_reasoning: bool,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            tag_patterns: DEFAULT_TAG_NAMES.iter().map(ToString::to_string).collect(),
            pattern: None,
            separator: DEFAULT_SEPARATOR.to_string(),
            start_with_reasoning: false,
        }
    }
}

impl ReasoningConfig {
    /// Resolves middleware options, applying `ADAPTIVE_REASONING_TAGS`.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn to_options(&self) -> Result<ReasoningOptions> {
        let env_tags = std::env::var(REASONING_TAGS_ENV).ok();
        self.to_options_with(env_tags.as_deref())
    }

    /// Resolves middleware options with precedence: env > config > default.
    ///
    /// A non-empty `pattern` takes priority over any tag list.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn to_options_with(&self, env_tags: Option<&str>) -> Result<ReasoningOptions> {
        let custom = self
            .pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let tag_patterns = if let Some(pattern) = custom {
            let regex = Regex::new(pattern)
                .with_context(|| format!("Invalid reasoning pattern: {pattern}"))?;
            TagPatterns::Custom(regex)
        } else {
            let from_env = env_tags.map(parse_tag_list).unwrap_or_default();
            if from_env.is_empty() {
                TagPatterns::Names(self.tag_patterns.clone())
            } else {
                TagPatterns::Names(from_env)
            }
        };

        Ok(ReasoningOptions {
            tag_patterns,
            separator: self.separator.clone(),
            start_with_reasoning: self.start_with_reasoning,
        })
    }
}

/// Splits a comma-separated tag list, dropping blanks.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `ADAPTIVE_LOG` is not set
    pub level: String,
    /// Log file; stderr when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Returns the default config template.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a config file from the default template.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        Self::default().render()
    }

    /// Renders this config as TOML on top of the commented template.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn render(&self) -> Result<String> {
        use toml_edit::{DocumentMut, Item};

        fn merge(target: &mut toml_edit::Table, source: &toml_edit::Table) {
            for (key, value) in source.iter() {
                match value {
                    Item::Value(v) => {
                        target[key] = Item::Value(v.clone());
                    }
                    Item::Table(src_table) => {
                        if let Some(Item::Table(target_table)) = target.get_mut(key) {
                            merge(target_table, src_table);
                        } else {
                            target[key] = Item::Table(src_table.clone());
                        }
                    }
                    Item::ArrayOfTables(arr) => {
                        target[key] = Item::ArrayOfTables(arr.clone());
                    }
                    Item::None => {}
                }
            }
        }

        let generated_toml = toml::to_string(self).context("Failed to serialize config to TOML")?;

        // Parse template as base (preserves comments)
        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
