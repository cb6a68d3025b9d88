//! Pattern sources owned by a scan list
//!
//! A source is regex text tagged with the rule that owns it. TextMate
//! patterns may use `\A` (start of document) and `\G` (search position)
//! anchors whose meaning depends on where a search starts, so sources that
//! use them are resolved into per-anchor variants before compiling.

use crate::tokens::RuleId;

/// Replacement for a disallowed anchor; U+FFFF never occurs in line text
pub(crate) const NEVER_MATCH: &str = r"\x{FFFF}";

/// Index into a four-slot table keyed by the two anchor flags
pub(crate) fn anchor_slot(allow_a: bool, allow_g: bool) -> usize {
    ((allow_a as usize) << 1) | (allow_g as usize)
}

/// A single regex source within a scan list
#[derive(Debug, Clone)]
pub struct RegexSource {
    source: String,
    rule_id: RuleId,
    has_anchor: bool,
    /// Resolved text per anchor combination, built on first use
    anchor_cache: Option<[String; 4]>,
}

impl RegexSource {
    /// Create a source owned by `rule_id`
    pub fn new(source: &str, rule_id: RuleId) -> Self {
        Self {
            source: source.to_string(),
            rule_id,
            has_anchor: scan_anchors(source),
            anchor_cache: None,
        }
    }

    /// Regex text as written in the grammar
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rule this source belongs to
    pub fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    /// Whether the source uses `\A` or `\G`
    pub fn has_anchor(&self) -> bool {
        self.has_anchor
    }

    /// Replace the regex text
    ///
    /// Returns false if the text is unchanged, in which case nothing is reset.
    pub fn set_source(&mut self, source: &str) -> bool {
        if self.source == source {
            return false;
        }
        self.source = source.to_string();
        self.has_anchor = scan_anchors(source);
        self.anchor_cache = None;
        true
    }

    /// Regex text with disallowed anchors replaced by an impossible match
    pub fn resolve_anchors(&mut self, allow_a: bool, allow_g: bool) -> &str {
        if !self.has_anchor {
            return &self.source;
        }
        let source = &self.source;
        let cache = self.anchor_cache.get_or_insert_with(|| {
            [
                rewrite_anchors(source, false, false),
                rewrite_anchors(source, false, true),
                rewrite_anchors(source, true, false),
                rewrite_anchors(source, true, true),
            ]
        });
        &cache[anchor_slot(allow_a, allow_g)]
    }
}

/// Check for `\A` or `\G`, skipping escaped backslashes
fn scan_anchors(source: &str) -> bool {
    let mut chars = source.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some('A' | 'G') = chars.next() {
                return true;
            }
        }
    }
    false
}

fn rewrite_anchors(source: &str, allow_a: bool, allow_g: bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('A') if !allow_a => out.push_str(NEVER_MATCH),
            Some('G') if !allow_g => out.push_str(NEVER_MATCH),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
