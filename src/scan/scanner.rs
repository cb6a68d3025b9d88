//! Multi-pattern search
//!
//! A `Scanner` holds independently compiled patterns and finds the earliest
//! match among them. Ties go to the pattern registered first, and a match
//! starting exactly at the search offset ends the search early.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use super::source::NEVER_MATCH;
use crate::error::TextMateError;
use crate::tokens::RuleId;

/// Capture ranges of a single match; index 0 is the whole match
pub type Captures = Vec<Option<Range<usize>>>;

/// Single-pattern search primitive
pub trait PatternMatcher: Send + Sync {
    /// First match starting at or after byte `offset`
    fn search(&self, text: &str, offset: usize) -> Option<Captures>;
}

/// Pattern backed by the `regex` crate
///
/// `regex` has no `\G`. A pattern using it is compiled twice: once with
/// `\G` dropped, accepted only when its leftmost match starts at the search
/// offset, and once with `\G` made impossible for matches further on. Both
/// always search the full line so other anchors and word boundaries keep
/// their context.
pub struct RegexPattern {
    regex: Regex,
    at_offset: Option<Regex>,
}

impl RegexPattern {
    /// Compile a pattern
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        match split_search_anchor(source) {
            Some((at_offset, elsewhere)) => Ok(Self {
                regex: Regex::new(&elsewhere)?,
                at_offset: Some(Regex::new(&at_offset)?),
            }),
            None => Ok(Self {
                regex: Regex::new(source)?,
                at_offset: None,
            }),
        }
    }
}

fn capture_ranges(caps: &regex::Captures<'_>) -> Captures {
    caps.iter().map(|m| m.map(|m| m.range())).collect()
}

impl PatternMatcher for RegexPattern {
    fn search(&self, text: &str, offset: usize) -> Option<Captures> {
        if offset > text.len() || !text.is_char_boundary(offset) {
            return None;
        }
        if let Some(at_offset) = &self.at_offset {
            // A leftmost match starting at `offset` is the anchored match
            let found = at_offset
                .captures_at(text, offset)
                .filter(|caps| caps.get(0).is_some_and(|m| m.start() == offset));
            if let Some(caps) = found {
                return Some(capture_ranges(&caps));
            }
        }
        let caps = self.regex.captures_at(text, offset)?;
        Some(capture_ranges(&caps))
    }
}

impl fmt::Debug for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexPattern")
            .field("regex", &self.regex.as_str())
            .field("at_offset", &self.at_offset.as_ref().map(|r| r.as_str()))
            .finish()
    }
}

/// Split a `\G` pattern into its at-offset and elsewhere variants
///
/// Returns None if the pattern has no `\G`.
fn split_search_anchor(source: &str) -> Option<(String, String)> {
    let mut at_offset = String::with_capacity(source.len());
    let mut elsewhere = String::with_capacity(source.len());
    let mut found = false;
    let mut chars = source.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            at_offset.push(ch);
            elsewhere.push(ch);
            continue;
        }
        match chars.next() {
            Some('G') => {
                elsewhere.push_str(NEVER_MATCH);
                found = true;
            }
            Some(next) => {
                for out in [&mut at_offset, &mut elsewhere] {
                    out.push('\\');
                    out.push(next);
                }
            }
            None => {
                at_offset.push('\\');
                elsewhere.push('\\');
            }
        }
    }
    found.then_some((at_offset, elsewhere))
}

/// Winning match of a scanner search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    /// Index of the pattern that matched
    pub index: usize,
    /// Capture ranges, absolute within the searched text
    pub captures: Captures,
}

impl ScanMatch {
    /// Start offset of the whole match
    pub fn start(&self) -> usize {
        self.captures
            .first()
            .and_then(|c| c.as_ref())
            .map_or(0, |r| r.start)
    }
}

/// An ordered set of independently compiled patterns
pub struct Scanner {
    patterns: Vec<Option<Box<dyn PatternMatcher>>>,
    errors: Vec<TextMateError>,
}

impl Scanner {
    /// Compile sources with the regex backend
    ///
    /// Sources that fail to compile are recorded against their rule and
    /// never match; the rest of the scanner is unaffected.
    pub fn new<S: AsRef<str>>(sources: &[S], rules: &[RuleId]) -> Self {
        let mut patterns: Vec<Option<Box<dyn PatternMatcher>>> = Vec::with_capacity(sources.len());
        let mut errors = Vec::new();
        for (index, source) in sources.iter().enumerate() {
            match RegexPattern::new(source.as_ref()) {
                Ok(pattern) => patterns.push(Some(Box::new(pattern))),
                Err(source) => {
                    let rule_id = rules.get(index).copied().unwrap_or(RuleId::END);
                    warn!(%rule_id, index, error = %source, "pattern failed to compile");
                    errors.push(TextMateError::InvalidPattern { rule_id, index, source });
                    patterns.push(None);
                }
            }
        }
        Self { patterns, errors }
    }

    /// Build a scanner from already compiled matchers
    pub fn from_matchers(matchers: Vec<Box<dyn PatternMatcher>>) -> Self {
        Self {
            patterns: matchers.into_iter().map(Some).collect(),
            errors: Vec::new(),
        }
    }

    /// Number of patterns, including ones that failed to compile
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Compile errors, one per failed pattern
    pub fn errors(&self) -> &[TextMateError] {
        &self.errors
    }

    /// Find the earliest match at or after `offset`
    pub fn search(&self, text: &str, offset: usize) -> Option<ScanMatch> {
        let mut best: Option<(usize, ScanMatch)> = None;

        for (index, pattern) in self.patterns.iter().enumerate() {
            let Some(pattern) = pattern else { continue };
            let Some(captures) = pattern.search(text, offset) else { continue };
            let Some(location) = captures.first().and_then(|c| c.as_ref()).map(|r| r.start) else {
                continue;
            };

            if best.as_ref().map_or(true, |(best_location, _)| location < *best_location) {
                best = Some((location, ScanMatch { index, captures }));
            }

            if location == offset {
                // Nothing can start earlier
                break;
            }
        }

        best.map(|(_, m)| m)
    }
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("patterns", &self.patterns.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

/// Match attributed to the rule that owns the winning pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_id: RuleId,
    pub index: usize,
    pub captures: Captures,
}

/// A compiled scan list: a shared scanner plus its parallel rule ids
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub scanner: Arc<Scanner>,
    pub rules: Arc<[RuleId]>,
}

impl CompiledRule {
    pub fn new(scanner: Scanner, rules: Vec<RuleId>) -> Self {
        Self {
            scanner: Arc::new(scanner),
            rules: rules.into(),
        }
    }

    /// Find the next match and resolve it to its rule
    pub fn find_next_match(&self, text: &str, offset: usize) -> Option<RuleMatch> {
        let found = self.scanner.search(text, offset)?;
        let rule_id = *self.rules.get(found.index)?;
        Some(RuleMatch {
            rule_id,
            index: found.index,
            captures: found.captures,
        })
    }

    /// Whether two handles share the same compiled scanner
    pub fn ptr_eq(&self, other: &CompiledRule) -> bool {
        Arc::ptr_eq(&self.scanner, &other.scanner)
    }
}
