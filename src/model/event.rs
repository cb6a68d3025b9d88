//! Change notifications emitted by the model

use std::sync::Arc;

/// Inclusive range of 0-based line indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub first: usize,
    pub last: usize,
}

impl LineRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// Check if this range contains a line
    pub fn contains(&self, line: usize) -> bool {
        line >= self.first && line <= self.last
    }

    /// Number of lines covered
    pub fn line_count(&self) -> usize {
        self.last - self.first + 1
    }
}

/// Tokens changed for a range of lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTokensChangedEvent {
    pub range: LineRange,
}

/// Receives change events from a model
pub trait ModelTokensChangedListener: Send + Sync {
    fn model_tokens_changed(&self, event: &ModelTokensChangedEvent);
}

impl<F> ModelTokensChangedListener for F
where
    F: Fn(&ModelTokensChangedEvent) + Send + Sync,
{
    fn model_tokens_changed(&self, event: &ModelTokensChangedEvent) {
        self(event)
    }
}

/// Shared listener handle; identity is the allocation
pub type Listener = Arc<dyn ModelTokensChangedListener>;

/// Collects the lines touched by one tokenization pass
#[derive(Debug, Default)]
pub(crate) struct EventBuilder {
    range: Option<LineRange>,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_changed_line(&mut self, line: usize) {
        self.range = Some(match self.range {
            Some(range) => LineRange::new(range.first.min(line), range.last.max(line)),
            None => LineRange::new(line, line),
        });
    }

    /// The event, or None if no line was tokenized
    pub fn build(self) -> Option<ModelTokensChangedEvent> {
        self.range.map(|range| ModelTokensChangedEvent { range })
    }
}
