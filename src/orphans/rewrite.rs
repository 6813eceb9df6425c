//! Textual selector rewriting ahead of matching.
//!
//! Both passes work on normalized selector text (single spaces between
//! compounds and around combinators) as produced by the stylesheet parser.

use std::ops::Range;

/// Qualify every unprefixed type selector with `prefix|`.
///
/// The text is split on whitespace; a `:not(` opening a token is split off
/// so its argument is reached too. Strings, attribute brackets and escapes
/// never split a token.
pub fn add_default_prefix(prefix: &str, selector: &str) -> String {
    let mut out = String::with_capacity(selector.len() + 4 * prefix.len());
    let mut last = 0;

    for span in token_spans(selector) {
        out.push_str(&selector[last..span.start]);
        let token = &selector[span.clone()];
        if is_unqualified_type(token) {
            out.push_str(prefix);
            out.push('|');
        }
        out.push_str(token);
        last = span.end;
    }
    out.push_str(&selector[last..]);
    out
}

/// Strip namespace markers that the matcher cannot honour.
///
/// `|name` (explicit no namespace) always loses its marker. When the
/// selector contains `*|` anywhere, every marker is stripped, named
/// prefixes included, since a partial strip would contradict the
/// any-namespace intent.
pub fn clean_generic_prefixes(selector: &str) -> String {
    let markers = namespace_markers(selector);
    let strip_all = markers.iter().any(|m| m.kind == MarkerKind::Any);

    let mut out = String::with_capacity(selector.len());
    let mut last = 0;
    for marker in markers
        .iter()
        .filter(|m| strip_all || m.kind == MarkerKind::NoNamespace)
    {
        out.push_str(&selector[last..marker.range.start]);
        last = marker.range.end;
    }
    out.push_str(&selector[last..]);
    out
}

fn token_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut brackets = 0usize;
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        let rest = &text[pos..];
        if let Some(q) = quote {
            if c == '\\' {
                pos += escape_len(rest);
                continue;
            }
            if c == q {
                quote = None;
            }
            pos += c.len_utf8();
            continue;
        }

        if start.is_none() {
            if c.is_whitespace() {
                pos += c.len_utf8();
                continue;
            }
            if rest.starts_with(":not(") {
                spans.push(pos..pos + 5);
                pos += 5;
                continue;
            }
            start = Some(pos);
        }

        match c {
            '\\' => {
                pos += escape_len(rest);
                continue;
            }
            '"' | '\'' => quote = Some(c),
            '[' => brackets += 1,
            ']' => brackets = brackets.saturating_sub(1),
            c if c.is_whitespace() && brackets == 0 => {
                if let Some(s) = start.take() {
                    spans.push(s..pos);
                }
            }
            _ => {}
        }
        pos += c.len_utf8();
    }

    if let Some(s) = start {
        spans.push(s..text.len());
    }
    spans
}

/// A type selector token with no namespace of its own.
fn is_unqualified_type(token: &str) -> bool {
    let body = token.strip_prefix('-').unwrap_or(token);
    let Some(first) = body.chars().next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '\\' || !first.is_ascii()) {
        return false;
    }
    !is_namespace_separator(&token[ident_len(token)..])
}

/// `|` followed by anything but `=` or `|`, i.e. not `|=` or `||`.
fn is_namespace_separator(text: &str) -> bool {
    text.strip_prefix('|')
        .is_some_and(|after| !after.starts_with(['=', '|']))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    /// `*|`
    Any,
    /// `|`
    NoNamespace,
    /// `prefix|`
    Named,
}

struct Marker {
    range: Range<usize>,
    kind: MarkerKind,
}

fn namespace_markers(text: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut at_boundary = true;
    let mut quote: Option<char> = None;
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        let rest = &text[pos..];
        if let Some(q) = quote {
            if c == '\\' {
                pos += escape_len(rest);
                continue;
            }
            if c == q {
                quote = None;
            }
            pos += c.len_utf8();
            continue;
        }

        if std::mem::take(&mut at_boundary)
            && let Some((len, kind)) = marker_at(rest)
        {
            markers.push(Marker {
                range: pos..pos + len,
                kind,
            });
            pos += len;
            continue;
        }

        match c {
            '\\' => {
                pos += escape_len(rest);
                continue;
            }
            '"' | '\'' => quote = Some(c),
            '(' | ',' | '>' | '+' | '~' | '[' => at_boundary = true,
            c if c.is_whitespace() => at_boundary = true,
            _ => {}
        }
        pos += c.len_utf8();
    }
    markers
}

fn marker_at(text: &str) -> Option<(usize, MarkerKind)> {
    if text.starts_with('*') {
        return is_namespace_separator(&text[1..]).then_some((2, MarkerKind::Any));
    }
    if is_namespace_separator(text) {
        return Some((1, MarkerKind::NoNamespace));
    }
    let len = ident_len(text);
    (len > 0 && is_namespace_separator(&text[len..])).then_some((len + 1, MarkerKind::Named))
}

/// Byte length of the identifier at the start of `text`.
fn ident_len(text: &str) -> usize {
    let mut pos = 0;
    while let Some(c) = text[pos..].chars().next() {
        if c == '\\' {
            pos += escape_len(&text[pos..]);
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            pos += c.len_utf8();
        } else {
            break;
        }
    }
    pos
}

/// Byte length of the escape at the start of `text` (which starts with `\`).
///
/// A hex escape swallows one whitespace character that terminates it.
fn escape_len(text: &str) -> usize {
    let mut chars = text.char_indices().skip(1).peekable();
    let Some(&(_, first)) = chars.peek() else {
        return text.len();
    };
    if !first.is_ascii_hexdigit() {
        return 1 + first.len_utf8();
    }

    let mut end = 1;
    for (i, c) in chars.by_ref().take(6) {
        if !c.is_ascii_hexdigit() {
            return if c.is_whitespace() { i + c.len_utf8() } else { i };
        }
        end = i + 1;
    }
    match text[end..].chars().next() {
        Some(c) if c.is_whitespace() => end + c.len_utf8(),
        _ => end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_default_prefix_compounds() {
        assert_eq!(
            add_default_prefix("aa", "p.ex1 + p.ex2"),
            "aa|p.ex1 + aa|p.ex2"
        );
        assert_eq!(add_default_prefix("a", "div > p a"), "a|div > a|p a|a");
    }

    #[test]
    fn test_add_default_prefix_skips_non_type_tokens() {
        assert_eq!(add_default_prefix("a", ".note #main *"), ".note #main *");
        assert_eq!(add_default_prefix("a", "[href] :root"), "[href] :root");
        assert_eq!(add_default_prefix("a", "svg|rect |p *|q"), "svg|rect |p *|q");
    }

    #[test]
    fn test_add_default_prefix_is_noop_without_type_tokens() {
        let selector = ".a > .b ~ [data-x] + #y";
        assert_eq!(add_default_prefix("aa", selector), selector);
    }

    #[test]
    fn test_add_default_prefix_reaches_into_not() {
        assert_eq!(add_default_prefix("a", "div :not(p)"), "a|div :not(a|p)");
        // Without the preceding space the argument stays part of the compound
        assert_eq!(add_default_prefix("a", "div:not(p)"), "a|div:not(p)");
    }

    #[test]
    fn test_add_default_prefix_keeps_strings_and_brackets_whole() {
        assert_eq!(
            add_default_prefix("a", "a[title=\"x y\"] b"),
            "a|a[title=\"x y\"] a|b"
        );
        assert_eq!(
            add_default_prefix("a", "p[lang|=\"en\"]"),
            "a|p[lang|=\"en\"]"
        );
    }

    #[test]
    fn test_add_default_prefix_escapes_and_hyphens() {
        assert_eq!(add_default_prefix("a", "\\31 23 p"), "a|\\31 23 a|p");
        assert_eq!(add_default_prefix("a", "-custom-el"), "a|-custom-el");
        assert_eq!(add_default_prefix("a", "é"), "a|é");
    }

    #[test]
    fn test_clean_generic_prefixes() {
        assert_eq!(clean_generic_prefixes("|div svg|a"), "div svg|a");
        assert_eq!(clean_generic_prefixes("*|text xhtml|p"), "text p");
        assert_eq!(
            clean_generic_prefixes("html|canvas svg|text"),
            "html|canvas svg|text"
        );
    }

    #[test]
    fn test_clean_generic_prefixes_after_combinators() {
        assert_eq!(clean_generic_prefixes("a > |b + |c"), "a > b + c");
        assert_eq!(clean_generic_prefixes("a:not(|b)"), "a:not(b)");
        assert_eq!(
            clean_generic_prefixes("*|a[xlink|href]"),
            "a[href]"
        );
    }

    #[test]
    fn test_clean_generic_prefixes_leaves_attribute_operators() {
        assert_eq!(
            clean_generic_prefixes("p[lang|=\"en\"]"),
            "p[lang|=\"en\"]"
        );
        assert_eq!(
            clean_generic_prefixes("*|p[lang|=\"en\"]"),
            "p[lang|=\"en\"]"
        );
        assert_eq!(clean_generic_prefixes("a[title=\"|x\"]"), "a[title=\"|x\"]");
    }

    #[test]
    fn test_escape_len() {
        assert_eq!(escape_len("\\31 23"), 4);
        assert_eq!(escape_len("\\.foo"), 2);
        assert_eq!(escape_len("\\000031x"), 7);
        assert_eq!(escape_len("\\"), 1);
    }
}
