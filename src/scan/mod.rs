//! Pattern scanning
//!
//! This module compiles ordered sets of grammar patterns into scanners and
//! searches them for the earliest match.

mod list;
mod scanner;
mod source;

pub use list::RegexSourceList;
pub use scanner::{Captures, CompiledRule, PatternMatcher, RegexPattern, RuleMatch, ScanMatch, Scanner};
pub use source::RegexSource;
