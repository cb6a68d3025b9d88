//! Token types produced by tokenization
//!
//! A line is tokenized into an ordered list of tokens. Each token starts at
//! a byte offset and carries the scope stack that applies until the next
//! token starts.

use std::fmt;

/// Identity of a grammar rule, correlating compiled patterns back to rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub i32);

impl RuleId {
    /// Pseudo rule for the `end` pattern of a begin/end rule
    pub const END: RuleId = RuleId(-1);
    /// Pseudo rule for the `while` pattern of a begin/while rule
    pub const WHILE: RuleId = RuleId(-2);

    /// Check if this id refers to a real grammar rule
    pub fn is_rule(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RuleId::END => f.write_str("$end"),
            RuleId::WHILE => f.write_str("$while"),
            RuleId(id) => write!(f, "{id}"),
        }
    }
}

/// A scoped token within a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte offset where this token starts
    pub start: usize,
    /// Scope names, outermost first
    pub scopes: Vec<String>,
}

impl Token {
    /// Create a new token
    pub fn new(start: usize, scopes: Vec<String>) -> Self {
        Self { start, scopes }
    }

    /// Create a token without any scopes
    pub fn untyped(start: usize) -> Self {
        Self { start, scopes: Vec::new() }
    }

    /// Innermost scope, if any
    pub fn scope(&self) -> Option<&str> {
        self.scopes.last().map(|s| s.as_str())
    }
}

/// Result of tokenizing a single line
#[derive(Debug, Clone, PartialEq)]
pub struct LineTokens<S> {
    /// Tokens in increasing start order
    pub tokens: Vec<Token>,
    /// State at end of line (for next line)
    pub end_state: S,
    /// Offset at which the tokenizer stopped consuming the line
    pub actual_stop_offset: usize,
}

impl<S> LineTokens<S> {
    /// Create a new result
    pub fn new(tokens: Vec<Token>, end_state: S, actual_stop_offset: usize) -> Self {
        Self { tokens, end_state, actual_stop_offset }
    }

    /// Clamp a long-line result at the tokenizer's stop offset
    ///
    /// The stop offset is never placed before the last token. Any text left
    /// after it becomes one untyped token, and the end state falls back to
    /// `start_state` since the line was not fully understood.
    pub fn finish(mut self, line_len: usize, start_state: &S) -> Self
    where
        S: Clone,
    {
        if let Some(last) = self.tokens.last() {
            self.actual_stop_offset = self.actual_stop_offset.max(last.start + 1);
        }
        if self.actual_stop_offset < line_len {
            self.tokens.push(Token::untyped(self.actual_stop_offset));
            self.end_state = start_state.clone();
        }
        self
    }
}
