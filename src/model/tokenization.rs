//! Incremental tokenization model
//!
//! The model keeps tokens for every line of one buffer consistent with the
//! active grammar. Edits only mark lines dirty; a background worker
//! re-tokenizes from each dirty line, carrying end states forward until a
//! line's end state matches what the next line already started with.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::event::{EventBuilder, Listener};
use super::lines::{LineRecords, ModelLines};
use super::worker::WorkerHandle;
use crate::config::TokenizerConfig;
use crate::error::Result;
use crate::grammar::{Grammar, StateOf, Tokenizer};
use crate::tokens::{LineTokens, Token};

/// How a range update ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Next line that may need work
    Next(usize),
    /// Gave up without error: missing state, or a newer edit took over
    Stopped,
    /// The tokenizer failed on this line
    Failed(usize),
}

/// How a budgeted worker pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    Completed,
    /// Out of time; resume at this line
    Deferred(usize),
    Failed(usize),
}

/// Tokenizer of the active grammar and the record generation it owns
pub(crate) struct ActiveTokenizer<T> {
    tokenizer: Arc<T>,
    generation: u64,
}

impl<T> Clone for ActiveTokenizer<T> {
    fn clone(&self) -> Self {
        Self {
            tokenizer: self.tokenizer.clone(),
            generation: self.generation,
        }
    }
}

/// State shared between the model and its worker
pub(crate) struct ModelInner<G: Grammar> {
    lines: Arc<dyn ModelLines>,
    records: LineRecords<StateOf<G>>,
    grammar: RwLock<Option<Arc<G>>>,
    tokenizer: RwLock<Option<ActiveTokenizer<G::Tokenizer>>>,
    listeners: Mutex<Vec<Listener>>,
    config: TokenizerConfig,
}

impl<G: Grammar> ModelInner<G> {
    fn tokenizer(&self) -> Option<ActiveTokenizer<G::Tokenizer>> {
        self.tokenizer.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn line_count(&self) -> usize {
        self.lines.line_count().min(self.records.len())
    }

    pub(crate) fn is_line_invalid(&self, line: usize) -> bool {
        self.records.is_invalid(line)
    }

    pub(crate) fn invalidate(&self, line: usize) -> bool {
        self.records.invalidate(line)
    }

    /// Re-tokenize from `start` until states settle or the budget runs out
    ///
    /// The cost of the next line is estimated from the average time per
    /// character spent so far in this pass; a line that would overrun the
    /// budget is left for the next pass.
    pub(crate) fn revalidate_tokens_now(&self, start: usize) -> Pass {
        let Some(active) = self.tokenizer() else {
            return Pass::Completed;
        };

        let budget = self.config.time_budget;
        let started = Instant::now();
        let mut builder = EventBuilder::new();
        let mut tokenized_chars = 0usize;
        let mut line = start;

        let pass = loop {
            if line >= self.line_count() {
                break Pass::Completed;
            }

            let elapsed = started.elapsed();
            if elapsed > budget {
                break Pass::Deferred(line);
            }

            let chars = self.lines.line_length(line).min(self.config.max_line_length);
            if tokenized_chars > 0 {
                let per_char = elapsed.as_secs_f64() / tokenized_chars as f64;
                let estimate = Duration::from_secs_f64(per_char * chars as f64);
                if elapsed + estimate > budget {
                    break Pass::Deferred(line);
                }
            }

            match self.update_tokens_in_range(&active, &mut builder, line, line) {
                Progress::Next(next) => line = next,
                Progress::Stopped => break Pass::Completed,
                Progress::Failed(failed) => break Pass::Failed(failed),
            }
            tokenized_chars += chars;
        };

        trace!(start, ?pass, elapsed = ?started.elapsed(), "tokenization pass");
        self.emit(builder);
        pass
    }

    /// Tokenize lines `start..=end`, skipping lines whose state is stable
    ///
    /// Returns the next line that may still need work. A line past `end`
    /// whose start state was changed here is marked dirty.
    pub(crate) fn update_tokens_in_range(
        &self,
        active: &ActiveTokenizer<G::Tokenizer>,
        builder: &mut EventBuilder,
        start: usize,
        end: usize,
    ) -> Progress {
        let tokenizer = &*active.tokenizer;
        let generation = active.generation;
        let count = self.line_count();
        let mut line = start;
        let mut carried = false;

        while line <= end && line < count {
            let Some(snapshot) = self.records.snapshot(line) else {
                return Progress::Stopped;
            };
            let start_state = match snapshot.state {
                Some(state) => state,
                None if line == 0 => tokenizer.initial_state(),
                None => {
                    trace!(line, "no start state yet");
                    return Progress::Stopped;
                }
            };
            let Some(text) = self.lines.line_text(line) else {
                return Progress::Stopped;
            };

            let LineTokens { tokens, end_state, .. } =
                match tokenizer.tokenize(&text, &start_state, 0, self.config.max_line_length) {
                    Ok(result) => result.finish(text.len(), &start_state),
                    Err(error) => {
                        warn!(line, %error, "tokenization failed");
                        return Progress::Failed(line);
                    }
                };

            if !self.records.commit(line, generation, snapshot.version, tokens) {
                trace!(line, "line changed while tokenizing");
                return Progress::Stopped;
            }
            builder.register_changed_line(line);

            let next = line + 1;
            carried = false;
            if next >= count {
                self.records.set_last_state(generation, end_state);
                line = next;
            } else if self.records.state_equals(next, &end_state) {
                line = self.skip_stable_lines(next, count);
            } else {
                if !self.records.set_state(next, generation, end_state) {
                    return Progress::Stopped;
                }
                carried = true;
                line = next;
            }
        }

        if carried && line < count {
            // Its tokens were computed from the old start state
            self.records.invalidate(line);
        }
        Progress::Next(line)
    }

    /// First line from `from` that is dirty or whose successor has no state
    fn skip_stable_lines(&self, from: usize, count: usize) -> usize {
        let last_known = self.records.has_last_state();
        let mut line = from;
        while line < count {
            let is_last = line + 1 >= count;
            if self.records.is_invalid(line)
                || (!is_last && !self.records.has_state(line + 1))
                || (is_last && !last_known)
            {
                break;
            }
            line += 1;
        }
        line
    }

    fn emit(&self, builder: EventBuilder) {
        let Some(event) = builder.build() else { return };
        // Listeners may unsubscribe from inside the callback
        let listeners = self.listeners().clone();
        for listener in listeners {
            listener.model_tokens_changed(&event);
        }
    }
}

#[derive(Debug, Default)]
struct WorkerSlot {
    handle: Option<WorkerHandle>,
    disposed: bool,
}

/// Tokenization state of one text buffer
pub struct TokenizationModel<G: Grammar> {
    inner: Arc<ModelInner<G>>,
    worker: Mutex<WorkerSlot>,
}

impl<G: Grammar> TokenizationModel<G> {
    /// Create a model over a buffer with the default configuration
    pub fn new(lines: Arc<dyn ModelLines>) -> Self {
        Self::with_config(lines, TokenizerConfig::default())
    }

    /// Create a model over a buffer
    pub fn with_config(lines: Arc<dyn ModelLines>, config: TokenizerConfig) -> Self {
        let records = LineRecords::new(lines.line_count());
        Self {
            inner: Arc::new(ModelInner {
                lines,
                records,
                grammar: RwLock::new(None),
                tokenizer: RwLock::new(None),
                listeners: Mutex::new(Vec::new()),
                config,
            }),
            worker: Mutex::new(WorkerSlot::default()),
        }
    }

    fn worker(&self) -> MutexGuard<'_, WorkerSlot> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a line for the worker, if one is running
    fn request(&self, line: usize) {
        if let Some(handle) = &self.worker().handle {
            handle.request(line);
        }
    }

    /// The active grammar
    pub fn grammar(&self) -> Option<Arc<G>> {
        self.inner.grammar.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Switch to a new grammar
    ///
    /// Setting the grammar already in use does nothing. Otherwise all
    /// cached tokens and states are dropped and line 0 is queued with the
    /// new tokenizer's initial state.
    pub fn set_grammar(&self, grammar: Arc<G>) {
        {
            let mut current = self.inner.grammar.write().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|g| Arc::ptr_eq(g, &grammar)) {
                return;
            }
            *current = Some(grammar.clone());
        }
        debug!(scope = grammar.scope_name(), "grammar changed");

        let tokenizer = Arc::new(grammar.tokenizer());
        let initial = tokenizer.initial_state();
        {
            // Readers see the new tokenizer only together with its generation
            let mut active = self.inner.tokenizer.write().unwrap_or_else(PoisonError::into_inner);
            self.inner.records.ensure_size(self.inner.lines.line_count());
            let generation = self.inner.records.reset(Some(initial));
            *active = Some(ActiveTokenizer { tokenizer, generation });
        }
        self.invalidate_line(0);
    }

    /// Mark a line dirty and wake the worker
    pub fn invalidate_line(&self, line: usize) {
        if self.inner.invalidate(line) {
            self.request(line);
        }
    }

    /// The text of a line changed
    pub fn line_updated(&self, line: usize) {
        self.invalidate_line(line);
    }

    /// `count` lines were inserted before `index`
    pub fn lines_inserted(&self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.inner.records.insert(index, count);
        self.reseed_from(index);
    }

    /// `count` lines starting at `index` were removed
    pub fn lines_removed(&self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.inner.records.remove(index, count);
        self.reseed_from(index);
    }

    /// Queue the line whose end state seeds `index`
    fn reseed_from(&self, index: usize) {
        if self.inner.records.len() == 0 {
            return;
        }
        if index == 0 {
            if let Some(active) = self.inner.tokenizer() {
                self.inner
                    .records
                    .set_state(0, active.generation, active.tokenizer.initial_state());
            }
            self.invalidate_line(0);
        } else {
            self.invalidate_line((index - 1).min(self.inner.records.len() - 1));
        }
    }

    /// Tokenize one line now, on the calling thread
    pub fn force_tokenization(&self, line: usize) {
        self.force_tokenization_range(line, line);
    }

    /// Tokenize lines `start..=end` now, on the calling thread
    ///
    /// The time budget does not apply. Listeners receive one event for the
    /// lines tokenized.
    pub fn force_tokenization_range(&self, start: usize, end: usize) {
        let Some(active) = self.inner.tokenizer() else { return };

        let mut builder = EventBuilder::new();
        match self.inner.update_tokens_in_range(&active, &mut builder, start, end) {
            // Still dirty; make sure the worker picks it up
            Progress::Failed(line) => self.request(line),
            Progress::Next(line) if self.inner.is_line_invalid(line) => self.request(line),
            _ => {}
        }
        self.inner.emit(builder);
    }

    /// Cached tokens of a line
    pub fn get_line_tokens(&self, line: usize) -> Option<Arc<[Token]>> {
        self.inner.records.tokens(line)
    }

    /// Whether a line is waiting to be re-tokenized
    pub fn is_line_invalid(&self, line: usize) -> bool {
        self.inner.is_line_invalid(line)
    }

    /// Start state recorded for a line
    pub fn line_state(&self, line: usize) -> Option<StateOf<G>> {
        self.inner.records.state(line)
    }

    /// Number of lines tracked
    pub fn line_count(&self) -> usize {
        self.inner.records.len()
    }

    /// Subscribe to change events
    ///
    /// The first subscriber starts the background worker, which picks up
    /// every line that is currently dirty.
    pub fn add_listener(&self, listener: Listener) -> Result<()> {
        let mut slot = self.worker();
        if slot.handle.is_none() && !slot.disposed {
            let seed = self.inner.records.dirty_lines();
            let handle = WorkerHandle::spawn(self.inner.clone(), seed, &self.inner.config.worker_name)?;
            slot.handle = Some(handle);
        }

        let mut listeners = self.inner.listeners();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
        Ok(())
    }

    /// Unsubscribe; the worker stops when nobody is listening
    pub fn remove_listener(&self, listener: &Listener) {
        // Same lock order as `add_listener`: slot, then listeners
        let mut slot = self.worker();
        let now_empty = {
            let mut listeners = self.inner.listeners();
            listeners.retain(|l| !same_listener(l, listener));
            listeners.is_empty()
        };
        if now_empty {
            if let Some(handle) = slot.handle.take() {
                handle.stop();
            }
        }
    }

    /// Whether the background worker is not running
    pub fn is_stopped(&self) -> bool {
        self.worker().handle.is_none()
    }

    /// Stop the worker for good
    pub fn dispose(&self) {
        self.worker().disposed = true;
        self.stop();
    }

    fn stop(&self) {
        if let Some(handle) = self.worker().handle.take() {
            handle.stop();
        }
    }
}

impl<G: Grammar> Drop for TokenizationModel<G> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
