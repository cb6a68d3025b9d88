//! Grammar and theme registry
//!
//! This module provides the registry binding raw grammars to compiled
//! grammars and to the live theme.

mod raw;
mod store;
mod theme;

pub use raw::{RawGrammar, RawRepository, RawRule};
pub use store::{GrammarFactory, GrammarRepository, Registry, RegistryOptions};
pub use theme::{FontStyle, StyleRule, ThemeProvider};
