//! Grammar registry
//!
//! The registry keeps raw grammars by scope name, memoizes compiled
//! grammars, and tracks injection grammars. Compiled grammars reach raw
//! grammars and the theme through two separate capabilities, so the theme
//! can be swapped without rebuilding anything.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use super::raw::{add_included_scope, RawGrammar};
use super::theme::{StyleRule, ThemeProvider};
use crate::grammar::Grammar;

/// Raw grammar lookup handed to compiled grammars
pub trait GrammarRepository: Send + Sync {
    /// Raw grammar registered for a scope
    fn lookup(&self, scope_name: &str) -> Option<Arc<RawGrammar>>;

    /// Injection grammars declared for a scope
    fn injections(&self, scope_name: &str) -> Option<Vec<String>>;
}

/// Source of raw grammars for `Registry::load_grammar`
pub trait RegistryOptions {
    /// Raw grammar for a scope, if the source knows it
    fn grammar(&self, scope_name: &str) -> Option<RawGrammar>;

    /// Injection grammars to register alongside a scope
    fn injections(&self, _scope_name: &str) -> Option<Vec<String>> {
        None
    }
}

/// Builds compiled grammars from raw ones
pub trait GrammarFactory: Send + Sync {
    type Grammar: Grammar;

    fn create_grammar(
        &self,
        raw: &RawGrammar,
        initial_language: u32,
        embedded_languages: &HashMap<String, u32>,
        repository: Arc<dyn GrammarRepository>,
        theme: Arc<dyn ThemeProvider>,
    ) -> Self::Grammar;
}

#[derive(Default)]
struct GrammarStore {
    raw: RwLock<HashMap<String, Arc<RawGrammar>>>,
    injections: RwLock<HashMap<String, Vec<String>>>,
}

impl GrammarRepository for GrammarStore {
    fn lookup(&self, scope_name: &str) -> Option<Arc<RawGrammar>> {
        let raw = self.raw.read().unwrap_or_else(PoisonError::into_inner);
        raw.get(scope_name).cloned()
    }

    fn injections(&self, scope_name: &str) -> Option<Vec<String>> {
        let injections = self.injections.read().unwrap_or_else(PoisonError::into_inner);
        injections.get(scope_name).cloned()
    }
}

/// Live theme slot; grammars hold this, never the theme itself
struct ThemeHandle {
    current: RwLock<Arc<dyn ThemeProvider>>,
}

impl ThemeHandle {
    fn get(&self) -> Arc<dyn ThemeProvider> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, theme: Arc<dyn ThemeProvider>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = theme;
    }
}

impl ThemeProvider for ThemeHandle {
    fn defaults(&self) -> StyleRule {
        self.get().defaults()
    }

    fn theme_match(&self, scopes: &[String]) -> Vec<StyleRule> {
        self.get().theme_match(scopes)
    }

    fn color_map(&self) -> Vec<String> {
        self.get().color_map()
    }
}

/// Central repository of grammars
pub struct Registry<F: GrammarFactory> {
    factory: F,
    store: Arc<GrammarStore>,
    theme: Arc<ThemeHandle>,
    grammars: Mutex<HashMap<String, Arc<F::Grammar>>>,
}

impl<F: GrammarFactory> Registry<F> {
    /// Create a registry with an initial theme
    pub fn new(factory: F, theme: Arc<dyn ThemeProvider>) -> Self {
        Self {
            factory,
            store: Arc::new(GrammarStore::default()),
            theme: Arc::new(ThemeHandle {
                current: RwLock::new(theme),
            }),
            grammars: Mutex::new(HashMap::new()),
        }
    }

    /// Register a raw grammar
    ///
    /// A grammar registered under an existing scope name replaces the old
    /// entry. Returns every other scope the grammar depends on: scopes it
    /// includes plus the declared injections.
    pub fn add_grammar(&self, grammar: RawGrammar, injection_scope_names: Option<Vec<String>>) -> Vec<String> {
        let scope_name = grammar.scope_name.clone();
        let mut included = grammar.included_scopes();

        {
            let mut injections = self.store.injections.write().unwrap_or_else(PoisonError::into_inner);
            match injection_scope_names {
                Some(names) => {
                    for name in &names {
                        add_included_scope(&mut included, name);
                    }
                    injections.insert(scope_name.clone(), names);
                }
                None => {
                    injections.remove(&scope_name);
                }
            }
        }

        let previous = self
            .store
            .raw
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope_name.clone(), Arc::new(grammar));
        if previous.is_some() {
            debug!(scope = %scope_name, "replaced registered grammar");
        }

        included
    }

    /// Compiled grammar for a scope, built on first request
    ///
    /// Returns None if no raw grammar is registered for the scope.
    pub fn grammar_for_scope_name(
        &self,
        scope_name: &str,
        initial_language: u32,
        embedded_languages: &HashMap<String, u32>,
    ) -> Option<Arc<F::Grammar>> {
        let mut grammars = self.grammars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(grammar) = grammars.get(scope_name) {
            return Some(grammar.clone());
        }

        let raw = self.store.lookup(scope_name)?;
        debug!(scope = %scope_name, "compiling grammar");
        let grammar = Arc::new(self.factory.create_grammar(
            &raw,
            initial_language,
            embedded_languages,
            self.store.clone(),
            self.theme.clone(),
        ));
        grammars.insert(scope_name.to_string(), grammar.clone());
        Some(grammar)
    }

    /// Register a grammar and everything it depends on, then compile it
    ///
    /// Scopes already registered are not requested again. Dependencies the
    /// options cannot supply are skipped.
    pub fn load_grammar(&self, scope_name: &str, options: &dyn RegistryOptions) -> Option<Arc<F::Grammar>> {
        let mut remaining = VecDeque::from([scope_name.to_string()]);
        let mut seen = HashSet::new();

        while let Some(scope) = remaining.pop_front() {
            if !seen.insert(scope.clone()) || self.store.lookup(&scope).is_some() {
                continue;
            }
            let Some(raw) = options.grammar(&scope) else {
                debug!(scope = %scope, "no grammar available");
                continue;
            };
            let injections = options.injections(&scope);
            remaining.extend(self.add_grammar(raw, injections));
        }

        self.grammar_for_scope_name(scope_name, 0, &HashMap::new())
    }

    /// Swap the active theme
    ///
    /// Compiled grammars are told their theme caches are stale; none are
    /// rebuilt or dropped.
    pub fn set_theme(&self, theme: Arc<dyn ThemeProvider>) {
        self.theme.set(theme);
        let grammars = self.grammars.lock().unwrap_or_else(PoisonError::into_inner);
        for grammar in grammars.values() {
            grammar.on_did_change_theme();
        }
    }

    pub fn lookup(&self, scope_name: &str) -> Option<Arc<RawGrammar>> {
        self.store.lookup(scope_name)
    }

    pub fn injections(&self, scope_name: &str) -> Option<Vec<String>> {
        self.store.injections(scope_name)
    }

    pub fn defaults(&self) -> StyleRule {
        self.theme.defaults()
    }

    pub fn theme_match(&self, scopes: &[String]) -> Vec<StyleRule> {
        self.theme.theme_match(scopes)
    }

    pub fn color_map(&self) -> Vec<String> {
        self.theme.color_map()
    }

    /// Number of compiled grammars
    pub fn compiled_count(&self) -> usize {
        self.grammars.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
