//! Tokenizer configuration
//!
//! Settings are read from TOML, either at the document root or under a
//! `[tokenizer]` table.
//!
//! Example:
//! ```text
//! [tokenizer]
//! time-budget-ms = 20
//! max-line-length = 10000
//! worker-name = "tm-model-worker"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use toml::{Table, Value};

use crate::error::{Result, TextMateError};

/// Default wall-clock budget for one worker invocation
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(20);

/// Default cap on characters handed to the tokenizer per line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 10_000;

/// Configuration settings for a tokenization model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Time budget for one background tokenization pass
    pub time_budget: Duration,
    /// Lines longer than this get one untyped trailing token
    pub max_line_length: usize,
    /// Thread name of the background worker
    pub worker_name: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            worker_name: "tm-model-worker".to_string(),
        }
    }
}

impl TokenizerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text, starting from the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: Table = contents.parse()?;
        let settings = match table.get("tokenizer") {
            Some(Value::Table(section)) => section,
            Some(_) => {
                return Err(TextMateError::InvalidConfig(
                    "`tokenizer` must be a table".to_string(),
                ))
            }
            None => &table,
        };

        let mut config = Self::default();
        config.apply(settings)?;
        Ok(config)
    }

    /// Apply settings from a parsed table
    fn apply(&mut self, settings: &Table) -> Result<()> {
        if let Some(value) = settings.get("time-budget-ms") {
            let ms = integer(value, "time-budget-ms")?;
            self.time_budget = Duration::from_millis(ms.clamp(1, 1000) as u64);
        }

        if let Some(value) = settings.get("max-line-length") {
            let len = integer(value, "max-line-length")?;
            self.max_line_length = len.max(1) as usize;
        }

        if let Some(value) = settings.get("worker-name") {
            match value.as_str() {
                Some(name) if !name.trim().is_empty() => self.worker_name = name.trim().to_string(),
                _ => {
                    return Err(TextMateError::InvalidConfig(
                        "`worker-name` must be a non-empty string".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}

fn integer(value: &Value, key: &str) -> Result<i64> {
    value
        .as_integer()
        .ok_or_else(|| TextMateError::InvalidConfig(format!("`{key}` must be an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TokenizerConfig::default();
        assert_eq!(config.time_budget, Duration::from_millis(20));
        assert_eq!(config.max_line_length, 10_000);
    }

    #[test]
    fn test_parse_section() {
        let contents = r#"
# Tokenizer settings
[tokenizer]
time-budget-ms = 35
max-line-length = 400
worker-name = "doc-1"
        "#;

        let config = TokenizerConfig::from_toml_str(contents).unwrap();
        assert_eq!(config.time_budget, Duration::from_millis(35));
        assert_eq!(config.max_line_length, 400);
        assert_eq!(config.worker_name, "doc-1");
    }

    #[test]
    fn test_parse_root_keys_and_clamp() {
        let config = TokenizerConfig::from_toml_str("time-budget-ms = 50000\nmax-line-length = 0").unwrap();
        assert_eq!(config.time_budget, Duration::from_millis(1000));
        assert_eq!(config.max_line_length, 1);
        assert_eq!(config.worker_name, "tm-model-worker");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            TokenizerConfig::from_toml_str("time-budget-ms = \"fast\""),
            Err(TextMateError::InvalidConfig(_))
        ));
        assert!(matches!(
            TokenizerConfig::from_toml_str("tokenizer = 3"),
            Err(TextMateError::InvalidConfig(_))
        ));
        assert!(matches!(
            TokenizerConfig::from_toml_str("not toml ["),
            Err(TextMateError::Config(_))
        ));
    }
}
