//! Error types for the tokenization engine

use thiserror::Error;

use crate::tokens::RuleId;

/// Result type alias for tokenization operations
pub type Result<T> = std::result::Result<T, TextMateError>;

/// Engine error types
#[derive(Error, Debug)]
pub enum TextMateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid pattern #{index} for rule {rule_id}: {source}")]
    InvalidPattern {
        rule_id: RuleId,
        index: usize,
        #[source]
        source: regex::Error,
    },

    #[error("Tokenization failed: {0}")]
    Tokenize(String),
}

impl TextMateError {
    /// Rule the error is attributed to, if any
    pub fn rule_id(&self) -> Option<RuleId> {
        match self {
            TextMateError::InvalidPattern { rule_id, .. } => Some(*rule_id),
            _ => None,
        }
    }
}
