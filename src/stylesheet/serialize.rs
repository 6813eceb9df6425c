//! Stylesheet → CSS text, laid out according to [`Preferences`].

use super::{CssRule, Declaration, Stylesheet, collapse_whitespace};
use crate::prefs::Preferences;

impl Stylesheet {
    /// Serialize the rule tree.
    ///
    /// Style rules whose selector list became empty are dropped, as are
    /// rules without declarations unless `keep_empty_rules` is set.
    pub fn to_css(&self, prefs: &Preferences) -> String {
        let writer = CssWriter { prefs };
        let mut out = writer.rules(&self.rules, 0).join(&writer.separator());
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

struct CssWriter<'a> {
    prefs: &'a Preferences,
}

impl CssWriter<'_> {
    fn separator(&self) -> String {
        "\n".repeat(self.prefs.blank_lines_after_rules as usize + 1)
    }

    fn indent(&self, level: usize) -> String {
        self.prefs.indent.repeat(level)
    }

    fn rules(&self, rules: &[CssRule], level: usize) -> Vec<String> {
        rules.iter().filter_map(|rule| self.rule(rule, level)).collect()
    }

    fn rule(&self, rule: &CssRule, level: usize) -> Option<String> {
        let pad = self.indent(level);
        match rule {
            CssRule::Style(style) => {
                if style.selectors.is_empty() {
                    return None;
                }
                if style.declarations.is_empty() && !self.prefs.keep_empty_rules {
                    return None;
                }
                let head = format!("{pad}{}", style.selectors.join(", "));
                Some(self.block(&head, &style.declarations, level))
            }
            CssRule::Media(media) => {
                let nested = self.rules(&media.rules, level + 1);
                // comments alone do not keep a block alive
                let has_rules = media.rules.iter().any(|rule| {
                    !matches!(rule, CssRule::Comment(_)) && self.rule(rule, level + 1).is_some()
                });
                if !has_rules && !self.prefs.keep_empty_rules {
                    return None;
                }
                let mut out = format!("{pad}@media {} {{", media.media);
                for rule in &nested {
                    out.push('\n');
                    out.push_str(rule);
                }
                out.push('\n');
                out.push_str(&self.closing_indent(level));
                out.push('}');
                Some(out)
            }
            CssRule::Namespace(ns) => {
                let uri = quote(&ns.uri);
                Some(if ns.prefix.is_empty() {
                    format!("{pad}@namespace {uri};")
                } else {
                    format!("{pad}@namespace {} {uri};", ns.prefix)
                })
            }
            CssRule::Statement(statement) => Some(format!(
                "{pad}@{} {};",
                statement.keyword, statement.prelude
            )),
            CssRule::Declarations(rule) => {
                let head = if rule.prelude.is_empty() {
                    format!("{pad}@{}", rule.keyword)
                } else {
                    format!("{pad}@{} {}", rule.keyword, rule.prelude)
                };
                Some(self.block(&head, &rule.declarations, level))
            }
            CssRule::Unknown(unknown) => {
                let text = if self.prefs.format_unknown_rules {
                    collapse_whitespace(&unknown.text)
                } else {
                    unknown.text.clone()
                };
                Some(format!("{pad}{text}"))
            }
            CssRule::Comment(text) => Some(format!("{pad}{text}")),
        }
    }

    fn block(&self, head: &str, declarations: &[Declaration], level: usize) -> String {
        if declarations.is_empty() {
            return format!("{head} {{}}");
        }

        let pad = self.indent(level + 1);
        let mut out = format!("{head} {{");
        for (i, declaration) in declarations.iter().enumerate() {
            let last = i + 1 == declarations.len();
            out.push('\n');
            out.push_str(&pad);
            out.push_str(&self.declaration(declaration));
            if !(last && self.prefs.omit_last_semicolon) {
                out.push(';');
            }
        }
        out.push('\n');
        out.push_str(&self.closing_indent(level));
        out.push('}');
        out
    }

    fn closing_indent(&self, level: usize) -> String {
        if self.prefs.indent_closing_brace {
            self.indent(level + 1)
        } else {
            self.indent(level)
        }
    }

    fn declaration(&self, declaration: &Declaration) -> String {
        let value = if self.prefs.omit_leading_zero {
            omit_leading_zeros(&declaration.value)
        } else {
            declaration.value.clone()
        };
        if declaration.important {
            format!("{}: {value} !important", declaration.name)
        } else {
            format!("{}: {value}", declaration.name)
        }
    }
}

fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// `0.5em` → `.5em` for numbers that start a token, outside strings and `url()`.
pub(crate) fn omit_leading_zeros(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut quote: Option<char> = None;
    let mut in_url = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if in_url {
            out.push(c);
            in_url = c != ')';
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '(' if out.to_ascii_lowercase().ends_with("url") => in_url = true,
            '0' => {
                let starts_number = out.chars().last().is_none_or(|prev| {
                    !(prev.is_alphanumeric() || matches!(prev, '.' | '_' | '#' | '-' | '\\'))
                        || prev == '-' && !preceded_by_word(&out)
                });
                let fraction = chars.get(i + 1) == Some(&'.')
                    && chars.get(i + 2).is_some_and(|d| d.is_ascii_digit());
                if starts_number && fraction {
                    i += 1;
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Whether the `-` ending `out` belongs to an identifier (`translate-0.5`).
fn preceded_by_word(out: &str) -> bool {
    let mut chars = out.chars().rev();
    chars.next();
    chars
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
