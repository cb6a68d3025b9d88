//! Theme rule types
//!
//! Themes resolve scope stacks to style rules. The matching engine itself is
//! supplied by the embedder; this module defines the rule values it returns
//! and the provider interface compiled grammars consult.

/// Font attributes of a style rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontStyle {
    /// Bold text
    pub bold: bool,
    /// Italic text
    pub italic: bool,
    /// Underlined text
    pub underline: bool,
    /// Struck-through text
    pub strikethrough: bool,
}

impl FontStyle {
    /// Builder: set bold
    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Builder: set italic
    pub fn with_italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Builder: set underline
    pub fn with_underline(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Builder: set strikethrough
    pub fn with_strikethrough(mut self) -> Self {
        self.strikethrough = true;
        self
    }

    /// Check if no attribute is set
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// A resolved theme rule
///
/// Colors are indices into the theme's color map; 0 means "not set".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleRule {
    /// Number of scope segments the selector matched
    pub scope_depth: usize,
    /// Parent scopes the selector requires, innermost first
    pub parent_scopes: Vec<String>,
    /// Font attributes, or None to inherit
    pub font_style: Option<FontStyle>,
    /// Foreground color id
    pub foreground: u32,
    /// Background color id
    pub background: u32,
}

impl StyleRule {
    /// Create a rule with just a foreground color
    pub fn fg(foreground: u32) -> Self {
        Self {
            foreground,
            ..Default::default()
        }
    }

    /// Builder: set background color
    pub fn with_bg(mut self, background: u32) -> Self {
        self.background = background;
        self
    }

    /// Builder: set font style
    pub fn with_font_style(mut self, font_style: FontStyle) -> Self {
        self.font_style = Some(font_style);
        self
    }

    /// Builder: set scope depth
    pub fn with_depth(mut self, scope_depth: usize) -> Self {
        self.scope_depth = scope_depth;
        self
    }
}

/// Theme resolution as seen by compiled grammars
pub trait ThemeProvider: Send + Sync {
    /// Style applied where no rule matches
    fn defaults(&self) -> StyleRule;

    /// Rules matching a scope stack, most specific first
    fn theme_match(&self, scopes: &[String]) -> Vec<StyleRule>;

    /// Colors referenced by rule color ids
    fn color_map(&self) -> Vec<String>;
}
