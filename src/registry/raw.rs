//! Raw grammar definitions
//!
//! This is the uncompiled rule tree of a grammar as read from its source
//! file. Only the parts the registry inspects are modelled here; the rule
//! interpreter owns everything else.

use std::collections::BTreeMap;

/// Named rules a grammar or rule can include with `#name`
pub type RawRepository = BTreeMap<String, RawRule>;

/// A single raw grammar rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRule {
    /// Scope assigned to text matched by this rule
    pub name: Option<String>,
    /// Scope assigned to text between `begin` and `end`
    pub content_name: Option<String>,
    /// Single-line match pattern
    pub match_pattern: Option<String>,
    /// Start pattern of a begin/end rule
    pub begin: Option<String>,
    /// End pattern of a begin/end rule
    pub end: Option<String>,
    /// Reference to another rule or grammar
    pub include: Option<String>,
    /// Nested rules
    pub patterns: Option<Vec<RawRule>>,
    /// Rules local to this rule
    pub repository: Option<RawRepository>,
}

impl RawRule {
    /// Create a match rule
    pub fn matching(name: &str, pattern: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            match_pattern: Some(pattern.to_string()),
            ..Default::default()
        }
    }

    /// Create a begin/end rule
    pub fn begin_end(name: &str, begin: &str, end: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            begin: Some(begin.to_string()),
            end: Some(end.to_string()),
            ..Default::default()
        }
    }

    /// Create an include rule
    pub fn include(target: &str) -> Self {
        Self {
            include: Some(target.to_string()),
            ..Default::default()
        }
    }

    /// Builder: set nested rules
    pub fn with_patterns(mut self, patterns: Vec<RawRule>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Builder: add a local repository entry
    pub fn with_repository_rule(mut self, key: &str, rule: RawRule) -> Self {
        self.repository
            .get_or_insert_with(RawRepository::new)
            .insert(key.to_string(), rule);
        self
    }
}

/// A raw grammar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrammar {
    /// Root scope name, e.g. `source.js`
    pub scope_name: String,
    /// Display name
    pub name: Option<String>,
    /// File extensions this grammar applies to
    pub file_types: Vec<String>,
    /// Top-level rules
    pub patterns: Vec<RawRule>,
    /// Named rules available to `#name` includes
    pub repository: Option<RawRepository>,
    /// Selector for injecting this grammar into others
    pub injection_selector: Option<String>,
}

impl RawGrammar {
    /// Create an empty grammar
    pub fn new(scope_name: &str) -> Self {
        Self {
            scope_name: scope_name.to_string(),
            ..Default::default()
        }
    }

    /// Add a top-level rule
    pub fn add_pattern(&mut self, rule: RawRule) {
        self.patterns.push(rule);
    }

    /// Add a repository rule
    pub fn add_repository_rule(&mut self, key: &str, rule: RawRule) {
        self.repository
            .get_or_insert_with(RawRepository::new)
            .insert(key.to_string(), rule);
    }

    /// Add a file extension
    pub fn add_file_type(&mut self, ext: &str) {
        self.file_types.push(ext.to_string());
    }

    /// Scope names of other grammars this grammar includes
    ///
    /// Walks top-level rules and every repository, nested ones included.
    /// `$base`, `$self`, local `#name` references and the grammar's own
    /// scope are left out. Names keep first-seen order.
    pub fn included_scopes(&self) -> Vec<String> {
        let mut result = Vec::new();
        collect_in_patterns(&mut result, &self.patterns);
        if let Some(repository) = &self.repository {
            collect_in_repository(&mut result, repository);
        }
        result.retain(|scope| *scope != self.scope_name);
        result
    }
}

/// Add a scope name once, keeping insertion order
pub(crate) fn add_included_scope(result: &mut Vec<String>, scope_name: &str) {
    if !result.iter().any(|s| s == scope_name) {
        result.push(scope_name.to_string());
    }
}

fn collect_in_patterns(result: &mut Vec<String>, patterns: &[RawRule]) {
    for rule in patterns {
        collect_in_rule(result, rule);
    }
}

fn collect_in_repository(result: &mut Vec<String>, repository: &RawRepository) {
    for rule in repository.values() {
        collect_in_rule(result, rule);
    }
}

fn collect_in_rule(result: &mut Vec<String>, rule: &RawRule) {
    if let Some(nested) = &rule.patterns {
        collect_in_patterns(result, nested);
    }
    if let Some(repository) = &rule.repository {
        collect_in_repository(result, repository);
    }

    let Some(include) = rule.include.as_deref() else { return };
    if include.is_empty() || include == "$base" || include == "$self" || include.starts_with('#') {
        return;
    }

    // `other.scope#rule` depends on the grammar before the `#`
    let scope_name = include.split_once('#').map_or(include, |(scope, _)| scope);
    add_included_scope(result, scope_name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_local_references() {
        let mut grammar = RawGrammar::new("source.test");
        grammar.add_pattern(RawRule::include("#local"));
        grammar.add_pattern(RawRule::include("$self"));
        grammar.add_pattern(RawRule::include("$base"));
        grammar.add_pattern(RawRule::include("other.scope"));
        grammar.add_pattern(RawRule::include("source.test"));

        assert_eq!(grammar.included_scopes(), vec!["other.scope".to_string()]);
    }

    #[test]
    fn test_walks_nested_repositories() {
        let mut grammar = RawGrammar::new("text.html");
        grammar.add_pattern(
            RawRule::begin_end("meta.embedded", "<script>", "</script>")
                .with_patterns(vec![RawRule::include("source.js")]),
        );
        grammar.add_repository_rule(
            "style",
            RawRule::default()
                .with_patterns(vec![RawRule::include("source.css#rules")])
                .with_repository_rule(
                    "inner",
                    RawRule::default().with_patterns(vec![
                        RawRule::include("source.js"),
                        RawRule::include("text.markdown"),
                    ]),
                ),
        );
        grammar.add_repository_rule("direct", RawRule::include("source.sql"));

        let scopes = grammar.included_scopes();
        assert_eq!(scopes.len(), 4);
        assert!(scopes.contains(&"source.js".to_string()));
        assert!(scopes.contains(&"source.css".to_string()));
        assert!(scopes.contains(&"text.markdown".to_string()));
        assert!(scopes.contains(&"source.sql".to_string()));
        assert_eq!(scopes[0], "source.js");
    }

    #[test]
    fn test_no_includes() {
        let mut grammar = RawGrammar::new("source.plain");
        grammar.add_pattern(RawRule::matching("keyword.control", r"\bif\b"));
        assert!(grammar.included_scopes().is_empty());
    }
}
