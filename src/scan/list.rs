//! Ordered pattern lists for one rule branch
//!
//! The list compiles its sources into a single `CompiledRule`. Lists without
//! anchors build one scanner and reuse it. Lists with anchors keep a table of
//! four lazily built scanners, one per (allow `\A`, allow `\G`) combination.
//! Any source change drops every cached scanner.

use tracing::trace;

use super::scanner::{CompiledRule, Scanner};
use super::source::{anchor_slot, RegexSource};
use crate::tokens::RuleId;

/// Pattern sources tagged with their owning rules
#[derive(Debug, Default)]
pub struct RegexSourceList {
    items: Vec<RegexSource>,
    has_anchors: bool,
    cached: Option<CompiledRule>,
    anchor_cache: [Option<CompiledRule>; 4],
}

impl RegexSourceList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source at the end
    pub fn append(&mut self, item: RegexSource) {
        self.has_anchors |= item.has_anchor();
        self.items.push(item);
    }

    /// Add a source at the front
    pub fn prepend(&mut self, item: RegexSource) {
        self.has_anchors |= item.has_anchor();
        self.items.insert(0, item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any source ever added uses anchors
    pub fn has_anchors(&self) -> bool {
        self.has_anchors
    }

    /// Source at `index`
    pub fn get(&self, index: usize) -> Option<&RegexSource> {
        self.items.get(index)
    }

    /// Replace the text of the source at `index`
    ///
    /// Compiled scanners are only dropped when the text actually changes.
    pub fn set_source(&mut self, index: usize, source: &str) {
        let Some(item) = self.items.get_mut(index) else { return };
        if item.set_source(source) {
            self.has_anchors |= item.has_anchor();
            self.cached = None;
            self.anchor_cache = Default::default();
        }
    }

    /// Rule ids parallel to the sources
    pub fn rules(&self) -> Vec<RuleId> {
        self.items.iter().map(|item| item.rule_id()).collect()
    }

    /// Compile the list for a search with the given anchor permissions
    pub fn compile(&mut self, allow_a: bool, allow_g: bool) -> CompiledRule {
        if !self.has_anchors {
            if let Some(cached) = &self.cached {
                return cached.clone();
            }
            let sources: Vec<&str> = self.items.iter().map(|item| item.source()).collect();
            let compiled = self.build(&sources);
            self.cached = Some(compiled.clone());
            return compiled;
        }

        let slot = anchor_slot(allow_a, allow_g);
        if let Some(cached) = &self.anchor_cache[slot] {
            return cached.clone();
        }
        trace!(allow_a, allow_g, patterns = self.items.len(), "resolving anchors");
        let sources: Vec<String> = self
            .items
            .iter_mut()
            .map(|item| item.resolve_anchors(allow_a, allow_g).to_string())
            .collect();
        let compiled = self.build(&sources);
        self.anchor_cache[slot] = Some(compiled.clone());
        compiled
    }

    fn build<S: AsRef<str>>(&self, sources: &[S]) -> CompiledRule {
        let rules = self.rules();
        CompiledRule::new(Scanner::new(sources, &rules), rules)
    }
}
