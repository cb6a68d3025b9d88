//! Fixtures shared by unit tests
//!
//! `CommentGrammar` is a tiny grammar with block comments and a few
//! keywords, tokenized with a `RegexSourceList` so the fixtures run through
//! the real scanner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use crate::error::{Result, TextMateError};
use crate::grammar::{Grammar, Tokenizer};
use crate::model::ModelLines;
use crate::registry::{GrammarFactory, GrammarRepository, RawGrammar, StyleRule, ThemeProvider};
use crate::scan::{CompiledRule, RegexSource, RegexSourceList};
use crate::tokens::{LineTokens, RuleId, Token};

const COMMENT_BEGIN: RuleId = RuleId(1);
const KEYWORD: RuleId = RuleId(2);

/// Lexical state: inside a block comment or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct CommentState {
    pub in_comment: bool,
}

/// In-memory line buffer
#[derive(Debug, Default)]
pub(crate) struct VecLines {
    lines: RwLock<Vec<String>>,
}

impl VecLines {
    pub fn new(lines: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            lines: RwLock::new(lines.iter().map(|s| s.to_string()).collect()),
        })
    }

    pub fn set(&self, index: usize, text: &str) {
        self.lines.write().unwrap()[index] = text.to_string();
    }

    pub fn insert(&self, index: usize, text: &str) {
        self.lines.write().unwrap().insert(index, text.to_string());
    }

    pub fn remove(&self, index: usize) {
        self.lines.write().unwrap().remove(index);
    }
}

impl ModelLines for VecLines {
    fn line_count(&self) -> usize {
        self.lines.read().unwrap().len()
    }

    fn line_text(&self, index: usize) -> Option<String> {
        self.lines.read().unwrap().get(index).cloned()
    }
}

/// Grammar with `/* */` comments and `if`/`else`/`while` keywords
pub(crate) struct CommentGrammar {
    scope_name: String,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    theme_changes: AtomicUsize,
    repository: Option<Arc<dyn GrammarRepository>>,
    theme: Option<Arc<dyn ThemeProvider>>,
}

impl CommentGrammar {
    pub fn new(scope_name: &str) -> Arc<Self> {
        Arc::new(Self::build(scope_name, None, None, None))
    }

    /// Grammar whose tokenizer sleeps before every line
    pub fn slow(scope_name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(scope_name, Some(delay), None, None))
    }

    fn build(
        scope_name: &str,
        delay: Option<Duration>,
        repository: Option<Arc<dyn GrammarRepository>>,
        theme: Option<Arc<dyn ThemeProvider>>,
    ) -> Self {
        Self {
            scope_name: scope_name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay,
            theme_changes: AtomicUsize::new(0),
            repository,
            theme,
        }
    }

    /// Lines handed to tokenizers of this grammar, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn theme_changes(&self) -> usize {
        self.theme_changes.load(Ordering::SeqCst)
    }

    pub fn repository(&self) -> Arc<dyn GrammarRepository> {
        self.repository.clone().expect("grammar built without a registry")
    }

    pub fn theme(&self) -> Arc<dyn ThemeProvider> {
        self.theme.clone().expect("grammar built without a registry")
    }
}

impl Grammar for CommentGrammar {
    type Tokenizer = CommentTokenizer;

    fn scope_name(&self) -> &str {
        &self.scope_name
    }

    fn tokenizer(&self) -> CommentTokenizer {
        let mut normal = RegexSourceList::new();
        normal.append(RegexSource::new(r"/\*", COMMENT_BEGIN));
        normal.append(RegexSource::new(r"\b(?:if|else|while)\b", KEYWORD));

        let mut comment = RegexSourceList::new();
        comment.append(RegexSource::new(r"\*/", RuleId::END));

        CommentTokenizer {
            scope_name: self.scope_name.clone(),
            normal: normal.compile(false, false),
            comment: comment.compile(false, false),
            calls: self.calls.clone(),
            delay: self.delay,
        }
    }

    fn on_did_change_theme(&self) {
        self.theme_changes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct CommentTokenizer {
    scope_name: String,
    normal: CompiledRule,
    comment: CompiledRule,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl CommentTokenizer {
    fn scopes(&self, inner: Option<&str>) -> Vec<String> {
        let mut scopes = vec![self.scope_name.clone()];
        scopes.extend(inner.map(str::to_string));
        scopes
    }
}

/// Append a token unless it would repeat the previous token's scopes
fn push(tokens: &mut Vec<Token>, start: usize, scopes: Vec<String>) {
    if tokens.last().map_or(true, |last| last.scopes != scopes) {
        tokens.push(Token::new(start, scopes));
    }
}

impl Tokenizer for CommentTokenizer {
    type State = CommentState;

    fn initial_state(&self) -> CommentState {
        CommentState::default()
    }

    fn tokenize(
        &self,
        line: &str,
        start_state: &CommentState,
        offset: usize,
        max_chars: usize,
    ) -> Result<LineTokens<CommentState>> {
        self.calls.lock().unwrap().push(line.to_string());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if line.contains("!fail") {
            return Err(TextMateError::Tokenize(format!("cannot tokenize {line:?}")));
        }

        let mut limit = line.len().min(offset.saturating_add(max_chars));
        while !line.is_char_boundary(limit) {
            limit -= 1;
        }
        let text = &line[..limit];

        let mut tokens = Vec::new();
        let mut in_comment = start_state.in_comment;
        let mut pos = offset;

        while pos < limit {
            if in_comment {
                push(&mut tokens, pos, self.scopes(Some("comment.block")));
                match self.comment.find_next_match(text, pos).and_then(|m| m.captures[0].clone()) {
                    Some(end) => {
                        pos = end.end;
                        in_comment = false;
                    }
                    None => pos = limit,
                }
                continue;
            }

            let Some(found) = self.normal.find_next_match(text, pos) else {
                push(&mut tokens, pos, self.scopes(None));
                break;
            };
            let Some(range) = found.captures[0].clone() else { break };
            if range.start > pos {
                push(&mut tokens, pos, self.scopes(None));
            }
            if found.rule_id == COMMENT_BEGIN {
                push(&mut tokens, range.start, self.scopes(Some("comment.block")));
                in_comment = true;
            } else {
                push(&mut tokens, range.start, self.scopes(Some("keyword.control")));
            }
            pos = range.end;
        }

        if tokens.is_empty() {
            let inner = in_comment.then_some("comment.block");
            tokens.push(Token::new(offset, self.scopes(inner)));
        }

        Ok(LineTokens::new(tokens, CommentState { in_comment }, limit))
    }
}

/// Factory counting how many grammars it built
#[derive(Default)]
pub(crate) struct TestFactory {
    pub built: AtomicUsize,
}

impl GrammarFactory for TestFactory {
    type Grammar = CommentGrammar;

    fn create_grammar(
        &self,
        raw: &RawGrammar,
        _initial_language: u32,
        _embedded_languages: &HashMap<String, u32>,
        repository: Arc<dyn GrammarRepository>,
        theme: Arc<dyn ThemeProvider>,
    ) -> CommentGrammar {
        self.built.fetch_add(1, Ordering::SeqCst);
        CommentGrammar::build(&raw.scope_name, None, Some(repository), Some(theme))
    }
}

/// Theme matching rules by scope prefix
pub(crate) struct StaticTheme {
    colors: Vec<String>,
    rules: Vec<(String, StyleRule)>,
}

impl StaticTheme {
    pub fn dark() -> Self {
        Self {
            colors: vec!["#000000".into(), "#D4D4D4".into(), "#6A9955".into(), "#C586C0".into()],
            rules: vec![
                ("comment".into(), StyleRule::fg(2).with_depth(1)),
                ("keyword.control".into(), StyleRule::fg(3).with_depth(2)),
            ],
        }
    }

    pub fn light() -> Self {
        Self {
            colors: vec!["#FFFFFF".into(), "#000000".into(), "#008000".into(), "#AF00DB".into()],
            rules: vec![("comment".into(), StyleRule::fg(2).with_depth(1))],
        }
    }
}

impl ThemeProvider for StaticTheme {
    fn defaults(&self) -> StyleRule {
        StyleRule::fg(1)
    }

    fn theme_match(&self, scopes: &[String]) -> Vec<StyleRule> {
        let mut matched: Vec<StyleRule> = self
            .rules
            .iter()
            .filter(|(selector, _)| scopes.iter().any(|scope| scope.starts_with(selector.as_str())))
            .map(|(_, rule)| rule.clone())
            .collect();
        matched.sort_by(|a, b| b.scope_depth.cmp(&a.scope_depth));
        matched
    }

    fn color_map(&self) -> Vec<String> {
        self.colors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(line: &str, state: CommentState) -> LineTokens<CommentState> {
        let grammar = CommentGrammar::new("source.test");
        grammar.tokenizer().tokenize(line, &state, 0, 10_000).unwrap()
    }

    #[test]
    fn test_fixture_grammar() {
        let result = tokenize("if x /* note", CommentState::default());
        assert!(result.end_state.in_comment);
        let starts: Vec<usize> = result.tokens.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![0, 2, 5]);
        assert_eq!(result.tokens[0].scope(), Some("keyword.control"));
        assert_eq!(result.tokens[2].scope(), Some("comment.block"));

        let result = tokenize("still */ else", CommentState { in_comment: true });
        assert!(!result.end_state.in_comment);
        let starts: Vec<usize> = result.tokens.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![0, 8, 9]);
    }

    #[test]
    fn test_fixture_theme() {
        let theme = StaticTheme::dark();
        let rules = theme.theme_match(&["source.test".into(), "keyword.control".into(), "comment.block".into()]);
        assert_eq!(rules[0].foreground, 3);
        assert_eq!(rules.len(), 2);
    }
}
