//! Grammar and tokenizer capabilities
//!
//! The rule interpreter that turns a grammar into scope stacks lives outside
//! this crate. The registry builds grammars through a factory, and the model
//! drives whatever tokenizer a grammar hands back.

use std::fmt;

use crate::error::Result;
use crate::tokens::LineTokens;

/// Line-by-line tokenizer built from a compiled grammar
pub trait Tokenizer: Send + Sync + 'static {
    /// Lexical state carried from one line to the next, compared by value
    type State: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// State for the first line of a document
    fn initial_state(&self) -> Self::State;

    /// Tokenize `line` from `offset`, consuming at most `max_chars` bytes
    fn tokenize(
        &self,
        line: &str,
        start_state: &Self::State,
        offset: usize,
        max_chars: usize,
    ) -> Result<LineTokens<Self::State>>;
}

/// A compiled grammar
pub trait Grammar: Send + Sync + 'static {
    type Tokenizer: Tokenizer;

    /// Root scope name, e.g. `source.rust`
    fn scope_name(&self) -> &str;

    /// Build a fresh tokenizer for this grammar
    fn tokenizer(&self) -> Self::Tokenizer;

    /// Drop caches derived from the active theme
    fn on_did_change_theme(&self);
}

/// Tokenization state type of a grammar
pub type StateOf<G> = <<G as Grammar>::Tokenizer as Tokenizer>::State;
