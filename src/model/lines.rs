//! Line access and per-line tokenization records
//!
//! The buffer owns line text; the model keeps one record per line with the
//! start state, the cached tokens and the dirty flag. Records are swapped
//! under a short lock so readers never see a half-written line.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::tokens::Token;

/// Read access to a line-oriented text buffer
pub trait ModelLines: Send + Sync {
    /// Number of lines in the buffer
    fn line_count(&self) -> usize;

    /// Text of a line, without its terminator
    fn line_text(&self, index: usize) -> Option<String>;

    /// Length of a line in bytes
    fn line_length(&self, index: usize) -> usize {
        self.line_text(index).map_or(0, |text| text.len())
    }
}

#[derive(Debug, Clone)]
struct LineRecord<S> {
    /// State at the start of the line (None = not computed)
    state: Option<S>,
    /// Cached tokens (None = never tokenized)
    tokens: Option<Arc<[Token]>>,
    invalid: bool,
    /// Bumped on every invalidation
    version: u64,
}

impl<S> LineRecord<S> {
    fn fresh() -> Self {
        Self {
            state: None,
            tokens: None,
            invalid: true,
            version: 0,
        }
    }
}

/// Start state and version of a line read before tokenizing it
#[derive(Debug, Clone)]
pub(crate) struct LineSnapshot<S> {
    pub state: Option<S>,
    pub version: u64,
}

#[derive(Debug)]
struct Table<S> {
    lines: Vec<LineRecord<S>>,
    /// Bumped on every reset; writes from an older grammar are dropped
    generation: u64,
    /// End state of the last line
    last_state: Option<S>,
}

/// Tokenization records, one per buffer line
#[derive(Debug)]
pub(crate) struct LineRecords<S> {
    table: RwLock<Table<S>>,
}

impl<S: Clone + PartialEq> LineRecords<S> {
    pub fn new(line_count: usize) -> Self {
        Self {
            table: RwLock::new(Table {
                lines: (0..line_count).map(|_| LineRecord::fresh()).collect(),
                generation: 0,
                last_state: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Table<S>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<S>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().lines.len()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Grow or shrink to match the buffer
    pub fn ensure_size(&self, line_count: usize) {
        let mut table = self.write();
        if table.lines.len() != line_count {
            table.lines.resize_with(line_count, LineRecord::fresh);
            table.last_state = None;
        }
    }

    pub fn snapshot(&self, index: usize) -> Option<LineSnapshot<S>> {
        self.read().lines.get(index).map(|record| LineSnapshot {
            state: record.state.clone(),
            version: record.version,
        })
    }

    pub fn state(&self, index: usize) -> Option<S> {
        self.read().lines.get(index).and_then(|record| record.state.clone())
    }

    pub fn has_state(&self, index: usize) -> bool {
        self.read().lines.get(index).is_some_and(|record| record.state.is_some())
    }

    /// Check the stored start state against `state` by value
    pub fn state_equals(&self, index: usize, state: &S) -> bool {
        self.read()
            .lines
            .get(index)
            .and_then(|record| record.state.as_ref())
            .is_some_and(|stored| stored == state)
    }

    /// Store a start state computed under `generation`
    pub fn set_state(&self, index: usize, generation: u64, state: S) -> bool {
        let mut table = self.write();
        if table.generation != generation {
            return false;
        }
        match table.lines.get_mut(index) {
            Some(record) => {
                record.state = Some(state);
                true
            }
            None => false,
        }
    }

    pub fn last_state(&self) -> Option<S> {
        self.read().last_state.clone()
    }

    pub fn has_last_state(&self) -> bool {
        self.read().last_state.is_some()
    }

    /// Store the end state of the last line computed under `generation`
    pub fn set_last_state(&self, generation: u64, state: S) {
        let mut table = self.write();
        if table.generation == generation {
            table.last_state = Some(state);
        }
    }

    pub fn clear_last_state(&self) {
        self.write().last_state = None;
    }

    pub fn tokens(&self, index: usize) -> Option<Arc<[Token]>> {
        self.read().lines.get(index).and_then(|record| record.tokens.clone())
    }

    pub fn is_invalid(&self, index: usize) -> bool {
        self.read().lines.get(index).is_some_and(|record| record.invalid)
    }

    /// Mark a line dirty; returns false if the index is out of range
    pub fn invalidate(&self, index: usize) -> bool {
        match self.write().lines.get_mut(index) {
            Some(record) => {
                record.invalid = true;
                record.version += 1;
                true
            }
            None => false,
        }
    }

    /// Store tokens and clear the dirty flag
    ///
    /// Nothing is written if the line was invalidated after `version` was
    /// read, or if the records were reset for another grammar since
    /// `generation` was read; the newer edit wins.
    pub fn commit(&self, index: usize, generation: u64, version: u64, tokens: Vec<Token>) -> bool {
        let mut table = self.write();
        if table.generation != generation {
            return false;
        }
        match table.lines.get_mut(index) {
            Some(record) if record.version == version => {
                record.tokens = Some(tokens.into());
                record.invalid = false;
                true
            }
            _ => false,
        }
    }

    /// Forget all cached state, mark every line dirty and seed line 0
    ///
    /// Returns the new generation.
    pub fn reset(&self, initial: Option<S>) -> u64 {
        let mut table = self.write();
        for record in table.lines.iter_mut() {
            record.state = None;
            record.tokens = None;
            record.invalid = true;
            record.version += 1;
        }
        if let Some(first) = table.lines.first_mut() {
            first.state = initial;
        }
        table.last_state = None;
        table.generation += 1;
        table.generation
    }

    /// Insert fresh records before `index`
    ///
    /// The last-line state is dropped when the insert lands at the end.
    pub fn insert(&self, index: usize, count: usize) {
        let mut table = self.write();
        let index = index.min(table.lines.len());
        if index == table.lines.len() {
            table.last_state = None;
        }
        table.lines.splice(index..index, (0..count).map(|_| LineRecord::fresh()));
    }

    /// Remove up to `count` records from `index`
    ///
    /// The last-line state is dropped when the removal reaches the end.
    pub fn remove(&self, index: usize, count: usize) {
        let mut table = self.write();
        let start = index.min(table.lines.len());
        let end = index.saturating_add(count).min(table.lines.len());
        if end == table.lines.len() {
            table.last_state = None;
        }
        table.lines.drain(start..end);
    }

    /// Indices of all dirty lines, ascending
    pub fn dirty_lines(&self) -> Vec<usize> {
        self.read()
            .lines
            .iter()
            .enumerate()
            .filter(|(_, record)| record.invalid)
            .map(|(index, _)| index)
            .collect()
    }
}
