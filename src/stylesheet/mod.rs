//! Stylesheet model consumed by the orphan scan.
//!
//! A thin rule tree: selectors are kept as normalized text,
//! declarations as raw values, and anything we do not need to understand is
//! kept verbatim so it survives a rewrite.

mod parse;
mod serialize;

use std::collections::BTreeMap;
use std::fmt;

pub use parse::{ParsedStylesheet, StylesheetError, UnknownRuleWarning};

/// Prefix → namespace URI. The empty prefix is the default namespace.
pub type NamespaceMap = BTreeMap<String, String>;

/// A parsed stylesheet: its top-level rules in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

/// Every kind of rule the scan distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssRule {
    Style(StyleRule),
    Media(MediaRule),
    Namespace(NamespaceRule),
    /// Block-less at-rules we pass through (`@charset`, `@import`).
    Statement(StatementRule),
    /// At-rules holding a declaration block (`@font-face`, `@page`).
    Declarations(DeclarationRule),
    Unknown(UnknownRule),
    /// A comment between rules, `/*` and `*/` included.
    Comment(String),
}

/// `selector, selector { declarations }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleRule {
    /// Normalized selector texts in declaration order.
    pub selectors: Vec<String>,
    pub declarations: Vec<Declaration>,
}

/// `@media <query> { rules }`, nestable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRule {
    pub media: String,
    pub rules: Vec<CssRule>,
}

/// `@namespace [prefix] <uri>;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRule {
    /// Empty for the default namespace.
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRule {
    pub keyword: String,
    pub prelude: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationRule {
    pub keyword: String,
    pub prelude: String,
    pub declarations: Vec<Declaration>,
}

/// An at-rule we do not recognise, kept as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRule {
    pub keyword: String,
    pub text: String,
    /// 1-based line of the at-keyword.
    pub line: u32,
}

/// `name: value [!important]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Position of a rule in the tree: one index per nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RulePath(pub Vec<usize>);

impl RulePath {
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl Stylesheet {
    /// Parse CSS text, rejecting anything the parser cannot represent.
    pub fn parse(css: &str) -> Result<ParsedStylesheet, StylesheetError> {
        parse::parse_stylesheet(css)
    }

    /// Declared namespaces; a later declaration of a prefix wins.
    pub fn namespaces(&self) -> NamespaceMap {
        self.rules
            .iter()
            .filter_map(|rule| match rule {
                CssRule::Namespace(ns) => Some((ns.prefix.clone(), ns.uri.clone())),
                _ => None,
            })
            .collect()
    }

    /// The style rule at `path`, if the path leads to one.
    pub fn style_rule(&self, path: &RulePath) -> Option<&StyleRule> {
        let (last, parents) = path.0.split_last()?;
        let mut rules = &self.rules;
        for &index in parents {
            match rules.get(index)? {
                CssRule::Media(media) => rules = &media.rules,
                _ => return None,
            }
        }
        match rules.get(*last)? {
            CssRule::Style(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn style_rule_mut(&mut self, path: &RulePath) -> Option<&mut StyleRule> {
        let (last, parents) = path.0.split_last()?;
        let mut rules = &mut self.rules;
        for &index in parents {
            match rules.get_mut(index)? {
                CssRule::Media(media) => rules = &mut media.rules,
                _ => return None,
            }
        }
        match rules.get_mut(*last)? {
            CssRule::Style(rule) => Some(rule),
            _ => None,
        }
    }
}

/// Collapse whitespace runs to one space, leaving quoted strings alone.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut pending_space = false;

    for c in text.trim().chars() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if std::mem::take(&mut pending_space) {
            out.push(' ');
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        out.push(c);
    }
    out
}
