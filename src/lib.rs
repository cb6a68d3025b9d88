//! textmate-model - incremental TextMate tokenization
//!
//! Scans grammar patterns for the earliest match, binds raw grammars and a
//! live theme in a registry, and keeps a buffer's line tokens current with a
//! time-budgeted background worker.

pub mod config;
pub mod error;
pub mod grammar;
pub mod model;
pub mod registry;
pub mod scan;
pub mod tokens;

#[cfg(test)]
mod testing;

pub use config::TokenizerConfig;
pub use error::{Result, TextMateError};
pub use grammar::{Grammar, StateOf, Tokenizer};
pub use model::{LineRange, ModelLines, ModelTokensChangedEvent, TokenizationModel};
pub use registry::{Registry, RegistryOptions};
pub use tokens::{LineTokens, RuleId, Token};
