//! Strict, namespace-aware XML parsing into an ArenaDom.
//!
//! Unlike the html5ever path this never recovers: any well-formedness or
//! namespace error fails the whole parse.

use html5ever::{LocalName, Namespace, Prefix, QualName, ns};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::arena::{ArenaDom, ArenaNodeId, Attribute};
use crate::error::{Error, Result};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// In-scope namespace declarations, innermost last.
#[derive(Default)]
struct NamespaceScopes {
    scopes: Vec<Vec<(String, String)>>,
}

impl NamespaceScopes {
    fn push(&mut self, declarations: Vec<(String, String)>) {
        self.scopes.push(declarations);
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Resolve a prefix ("" for the default namespace).
    fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

/// Parse a complete XML document.
pub fn parse_xml(content: &str) -> Result<ArenaDom> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut dom = ArenaDom::new_xml();
    let mut scopes = NamespaceScopes::default();
    let mut stack: Vec<ArenaNodeId> = Vec::new();
    let mut has_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let parent = open_parent(&dom, &stack, &mut has_root)?;
                // The element's scope stays open until its end tag
                let node = build_element(&mut dom, &e, &mut scopes)?;
                dom.append(parent, node);
                stack.push(node);
            }
            Event::Empty(e) => {
                let parent = open_parent(&dom, &stack, &mut has_root)?;
                let node = build_element(&mut dom, &e, &mut scopes)?;
                scopes.pop();
                dom.append(parent, node);
            }
            Event::End(_) => {
                // quick-xml already checked that the end name matches
                if stack.pop().is_none() {
                    return Err(Error::MalformedXml("unexpected end tag".to_string()));
                }
                scopes.pop();
            }
            Event::Text(e) => {
                let text = String::from_utf8_lossy(e.as_ref());
                append_text(&mut dom, &stack, &text)?;
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref());
                append_text(&mut dom, &stack, &text)?;
            }
            Event::GeneralRef(e) => {
                let text = format!("&{};", String::from_utf8_lossy(e.as_ref()));
                append_text(&mut dom, &stack, &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::MalformedXml(format!(
            "{} unclosed element(s) at end of document",
            stack.len()
        )));
    }
    if !has_root {
        return Err(Error::MalformedXml("no root element".to_string()));
    }
    Ok(dom)
}

/// The node a new element attaches to; only one root element is allowed.
fn open_parent(dom: &ArenaDom, stack: &[ArenaNodeId], has_root: &mut bool) -> Result<ArenaNodeId> {
    match stack.last() {
        Some(&parent) => Ok(parent),
        None if *has_root => Err(Error::MalformedXml(
            "more than one root element".to_string(),
        )),
        None => {
            *has_root = true;
            Ok(dom.document())
        }
    }
}

fn append_text(dom: &mut ArenaDom, stack: &[ArenaNodeId], text: &str) -> Result<()> {
    match stack.last() {
        Some(&parent) => {
            dom.append_text(parent, text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::MalformedXml(
            "text content outside the root element".to_string(),
        )),
    }
}

/// Create an element, resolving its namespaces.
///
/// Pushes the element's own declarations as a new scope; the caller pops it
/// at the end tag (or right away for empty tags).
fn build_element(
    dom: &mut ArenaDom,
    e: &BytesStart<'_>,
    scopes: &mut NamespaceScopes,
) -> Result<ArenaNodeId> {
    let mut declarations = Vec::new();
    let mut raw_attrs = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::MalformedXml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = unescape_basic(&String::from_utf8_lossy(&attr.value));

        if key == "xmlns" {
            declarations.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_string(), value));
        } else {
            raw_attrs.push((key, value));
        }
    }

    scopes.push(declarations);

    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let name = resolve_name(&tag, scopes, true)?;

    let mut attrs = Vec::with_capacity(raw_attrs.len());
    for (key, value) in raw_attrs {
        attrs.push(Attribute {
            name: resolve_name(&key, scopes, false)?,
            value,
        });
    }

    Ok(dom.create_element(name, attrs))
}

/// Resolve `prefix:local` against the open scopes.
///
/// Unprefixed element names take the default namespace; unprefixed
/// attributes never do.
fn resolve_name(raw: &str, scopes: &NamespaceScopes, is_element: bool) -> Result<QualName> {
    match raw.split_once(':') {
        Some((prefix, local)) => {
            let uri = scopes.resolve(prefix).ok_or_else(|| {
                Error::MalformedXml(format!("unbound namespace prefix '{prefix}' in '{raw}'"))
            })?;
            Ok(QualName::new(
                Some(Prefix::from(prefix)),
                Namespace::from(uri),
                LocalName::from(local),
            ))
        }
        None => {
            let ns = match scopes.resolve("") {
                Some(uri) if is_element && !uri.is_empty() => Namespace::from(uri),
                _ => ns!(),
            };
            Ok(QualName::new(None, ns, LocalName::from(raw)))
        }
    }
}

/// Replace the predefined XML entities and numeric character references.
fn unescape_basic(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            out.push_str(&rest[amp..]);
            return out;
        };
        let entity = &after[..semi];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match replacement {
            Some(c) => out.push(c),
            None => out.push_str(&rest[amp..amp + semi + 2]),
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    out
}
