use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use logsaw_logs::PatternSyntax;

/// Settings read from the TOML file, before command-line overrides
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub buffer: BufferConfig,
    pub receiver: ReceiverConfig,
    pub filter: FilterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    /// Overwrite the oldest events once `capacity` is reached
    pub cyclic: bool,
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            cyclic: true,
            capacity: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiverConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 4445,
        }
    }
}

impl ReceiverConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Display filter expression, e.g. `level >= WARN`
    pub expression: Option<String>,
    pub pattern_syntax: Option<String>,
    /// Initial sort, `COLUMN` or `COLUMN:desc`
    pub sort: Option<String>,
}

impl FilterConfig {
    pub fn syntax(&self) -> Result<PatternSyntax> {
        match &self.pattern_syntax {
            Some(name) => name
                .parse()
                .with_context(|| format!("invalid pattern syntax '{}'", name)),
            None => Ok(PatternSyntax::default()),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default directive for logsaw's own diagnostics; `RUST_LOG` adds to it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Read `path`; a missing file is an error
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load the file if one was given, defaults otherwise
    pub fn load_optional(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Split `COLUMN[:asc|:desc]` into a column name and direction
pub fn parse_sort(text: &str) -> Result<(String, bool)> {
    let (column, direction) = match text.rsplit_once(':') {
        Some((column, direction)) => (column, Some(direction)),
        None => (text, None),
    };
    let ascending = match direction.map(str::to_lowercase).as_deref() {
        None | Some("asc") => true,
        Some("desc") => false,
        Some(other) => anyhow::bail!("unknown sort direction '{}'", other),
    };
    if column.trim().is_empty() {
        anyhow::bail!("missing sort column in '{}'", text);
    }
    Ok((column.trim().to_string(), ascending))
}
