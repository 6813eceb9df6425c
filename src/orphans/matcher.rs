//! Selector compilation and existence checks against a parsed document.

use std::collections::HashMap;

use cssparser::{
    CowRcStr, ParseError, ParseErrorKind, Parser, ParserInput, SourceLocation,
    match_ignore_ascii_case,
};
use selectors::context::{
    MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags, QuirksMode,
    SelectorCaches,
};
use selectors::matching::matches_selector;
use selectors::parser::{ParseRelative, SelectorList, SelectorParseErrorKind};
use thiserror::Error;

use crate::dom::{ArenaDom, BookSelectors, CssNamespace, ElementRef, IdentStr, NonTSPseudoClass};
use crate::stylesheet::NamespaceMap;

/// Which pseudo-classes a query may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// XHTML content documents: HTML-only pseudo-classes are available.
    Xhtml,
    /// Generic XML documents.
    Xml,
}

impl QueryMode {
    pub fn for_document(is_xhtml: bool) -> Self {
        if is_xhtml { Self::Xhtml } else { Self::Xml }
    }
}

/// Why a selector could not be turned into a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Valid CSS we cannot evaluate; callers assume it matches.
    #[error("unsupported construct in selector '{0}'")]
    Unsupported(String),
    #[error("cannot compile selector '{selector}': {reason}")]
    Invalid { selector: String, reason: String },
}

/// A compiled selector list.
#[derive(Debug, Clone)]
pub struct Query {
    selectors: SelectorList<BookSelectors>,
}

impl Query {
    pub fn compile(
        selector: &str,
        namespaces: &NamespaceMap,
        mode: QueryMode,
    ) -> Result<Self, QueryError> {
        let mut input = ParserInput::new(selector);
        let mut parser = Parser::new(&mut input);
        let query_parser = QueryParser { namespaces, mode };

        SelectorList::parse(&query_parser, &mut parser, ParseRelative::No)
            .map(|selectors| Self { selectors })
            .map_err(|err| classify(selector, err))
    }

    /// Whether any element of the document matches.
    pub fn matches_any(&self, dom: &ArenaDom) -> bool {
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );

        dom.elements().any(|id| {
            let element = ElementRef::new(dom, id);
            self.selectors
                .slice()
                .iter()
                .any(|selector| matches_selector(selector, 0, None, &element, &mut context))
        })
    }
}

fn classify(selector: &str, err: ParseError<'_, SelectorParseErrorKind<'_>>) -> QueryError {
    match err.kind {
        ParseErrorKind::Custom(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(_)) => {
            QueryError::Unsupported(selector.to_string())
        }
        kind => QueryError::Invalid {
            selector: selector.to_string(),
            reason: format!("{kind:?}"),
        },
    }
}

fn evaluate(compiled: &Result<Query, QueryError>, dom: &ArenaDom) -> Result<bool, QueryError> {
    match compiled {
        Ok(query) => Ok(query.matches_any(dom)),
        Err(QueryError::Unsupported(_)) => Ok(true),
        Err(err) => Err(err.clone()),
    }
}

/// Whether the selector matches at least one element of `dom`.
///
/// Selectors using constructs the engine cannot evaluate count as matching.
/// Other compilation failures, such as an undeclared namespace prefix, are
/// returned to the caller.
pub fn selector_exists(
    dom: &ArenaDom,
    selector: &str,
    namespaces: &NamespaceMap,
    is_xhtml: bool,
) -> Result<bool, QueryError> {
    let compiled = Query::compile(selector, namespaces, QueryMode::for_document(is_xhtml));
    evaluate(&compiled, dom)
}

/// Compiled queries for one stylesheet's namespace map.
///
/// Keyed by rewritten selector text and mode; binding the cache to a single
/// map keeps entries from leaking between namespace contexts.
pub struct QueryCache<'a> {
    namespaces: &'a NamespaceMap,
    compiled: HashMap<(String, QueryMode), Result<Query, QueryError>>,
}

impl<'a> QueryCache<'a> {
    pub fn new(namespaces: &'a NamespaceMap) -> Self {
        Self {
            namespaces,
            compiled: HashMap::new(),
        }
    }

    /// Cached equivalent of [`selector_exists`].
    pub fn selector_exists(
        &mut self,
        dom: &ArenaDom,
        selector: &str,
        is_xhtml: bool,
    ) -> Result<bool, QueryError> {
        let mode = QueryMode::for_document(is_xhtml);
        let namespaces = self.namespaces;
        let compiled = self
            .compiled
            .entry((selector.to_string(), mode))
            .or_insert_with(|| Query::compile(selector, namespaces, mode));
        evaluate(compiled, dom)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Resolves prefixes through the stylesheet's namespaces. There is no
/// default namespace; the rewriter has already made it explicit.
struct QueryParser<'a> {
    namespaces: &'a NamespaceMap,
    mode: QueryMode,
}

impl<'i> selectors::parser::Parser<'i> for QueryParser<'_> {
    type Impl = BookSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_non_ts_pseudo_class(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<NonTSPseudoClass, ParseError<'i, Self::Error>> {
        let pseudo_class = match_ignore_ascii_case! { &*name,
            "link" => NonTSPseudoClass::Link,
            "any-link" => NonTSPseudoClass::AnyLink,
            "checked" => NonTSPseudoClass::Checked,
            "disabled" => NonTSPseudoClass::Disabled,
            "enabled" => NonTSPseudoClass::Enabled,
            "visited" => NonTSPseudoClass::Visited,
            "hover" => NonTSPseudoClass::Hover,
            "active" => NonTSPseudoClass::Active,
            "focus" => NonTSPseudoClass::Focus,
            "target" => NonTSPseudoClass::Target,
            _ => return Err(location.new_custom_error(
                SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name.clone()),
            )),
        };

        // Unsupported means "assume used", so in generic XML an HTML-only
        // pseudo-class keeps its selector where an XPath translation would
        // never match it.
        if self.mode == QueryMode::Xml && pseudo_class.is_html_only() {
            return Err(location.new_custom_error(
                SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name),
            ));
        }
        Ok(pseudo_class)
    }

    fn parse_non_ts_functional_pseudo_class<'t>(
        &self,
        name: CowRcStr<'i>,
        parser: &mut Parser<'i, 't>,
        _after_part: bool,
    ) -> Result<NonTSPseudoClass, ParseError<'i, Self::Error>> {
        if name.eq_ignore_ascii_case("lang") {
            let lang = parser.expect_ident_or_string()?.as_ref().to_owned();
            return Ok(NonTSPseudoClass::Lang(lang));
        }
        Err(parser.new_custom_error(
            SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name),
        ))
    }

    fn default_namespace(&self) -> Option<CssNamespace> {
        None
    }

    fn namespace_for_prefix(&self, prefix: &IdentStr) -> Option<CssNamespace> {
        self.namespaces
            .get(&prefix.0)
            .map(|uri| CssNamespace::from(uri.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MarkupDocument, MarkupKind, parse_xml};

    const XHTML: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml">
<body>
  <p class="intro">Hello <a href="x.xhtml">link</a></p>
  <svg xmlns="http://www.w3.org/2000/svg"><rect width="1"/></svg>
  <input type="checkbox" checked="checked"/>
</body>
</html>"#;

    fn namespaces(entries: &[(&str, &str)]) -> NamespaceMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn html_dom() -> ArenaDom {
        MarkupDocument::parse("doc", XHTML.as_bytes(), MarkupKind::Xhtml)
            .unwrap()
            .html
    }

    #[test]
    fn test_simple_matches() {
        let dom = html_dom();
        let ns = NamespaceMap::new();
        assert!(selector_exists(&dom, "p.intro", &ns, true).unwrap());
        assert!(selector_exists(&dom, "p > a", &ns, true).unwrap());
        assert!(!selector_exists(&dom, ".unused-class", &ns, true).unwrap());
        assert!(!selector_exists(&dom, "div p", &ns, true).unwrap());
    }

    #[test]
    fn test_html_only_pseudo_classes() {
        let dom = html_dom();
        let ns = NamespaceMap::new();
        assert!(selector_exists(&dom, "a:link", &ns, true).unwrap());
        assert!(selector_exists(&dom, "input:checked", &ns, true).unwrap());
        assert!(!selector_exists(&dom, "p:link", &ns, true).unwrap());
    }

    #[test]
    fn test_dynamic_states_parse_but_never_match() {
        let dom = html_dom();
        assert!(!selector_exists(&dom, "a:hover", &NamespaceMap::new(), true).unwrap());
    }

    #[test]
    fn test_unsupported_constructs_count_as_matching() {
        let dom = html_dom();
        let ns = NamespaceMap::new();
        assert!(selector_exists(&dom, "p::first-line", &ns, true).unwrap());
        assert!(selector_exists(&dom, "nothing:fullscreen", &ns, true).unwrap());
        assert!(selector_exists(&dom, "nothing:dir(ltr)", &ns, true).unwrap());
        // HTML-only pseudo-classes are unavailable for generic XML
        assert!(selector_exists(&dom, "nothing:link", &ns, false).unwrap());
    }

    #[test]
    fn test_lang_is_inherited() {
        let doc = r#"<html xmlns="http://www.w3.org/1999/xhtml" lang="en-US">
<body><p class="fr" lang="fr">Bonjour</p><p class="plain">Hi</p></body>
</html>"#;
        let ns = NamespaceMap::new();
        let html = MarkupDocument::parse("doc", doc.as_bytes(), MarkupKind::Xhtml)
            .unwrap()
            .html;

        assert!(selector_exists(&html, "p.plain:lang(en)", &ns, true).unwrap());
        assert!(selector_exists(&html, "p.plain:lang(EN-us)", &ns, true).unwrap());
        assert!(selector_exists(&html, "p:lang(fr)", &ns, true).unwrap());
        assert!(!selector_exists(&html, "p.fr:lang(en)", &ns, true).unwrap());
        assert!(!selector_exists(&html, "p:lang(e)", &ns, true).unwrap());
        assert!(!selector_exists(&html, "nothing:lang(en)", &ns, true).unwrap());
    }

    #[test]
    fn test_xml_lang_attribute() {
        let doc = r#"<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="de" lang="en">
<body><p>Hallo</p></body>
</html>"#;
        let xml = parse_xml(doc).unwrap();
        let ns = NamespaceMap::new();
        assert!(selector_exists(&xml, "p:lang(de)", &ns, false).unwrap());
        assert!(!selector_exists(&xml, "p:lang(en)", &ns, false).unwrap());
        assert!(!selector_exists(&parse_xml(XHTML).unwrap(), "p:lang(en)", &ns, false).unwrap());
    }

    #[test]
    fn test_undeclared_prefix_is_invalid() {
        let dom = html_dom();
        let err = selector_exists(&dom, "foo|p", &NamespaceMap::new(), true).unwrap_err();
        assert!(matches!(err, QueryError::Invalid { ref selector, .. } if selector == "foo|p"));
    }

    #[test]
    fn test_namespaced_selectors() {
        let ns = namespaces(&[
            ("svg", "http://www.w3.org/2000/svg"),
            ("a", "http://www.w3.org/1999/xhtml"),
        ]);
        let xml = parse_xml(XHTML).unwrap();
        assert!(selector_exists(&xml, "svg|rect", &ns, true).unwrap());
        assert!(selector_exists(&xml, "a|p", &ns, true).unwrap());
        assert!(!selector_exists(&xml, "svg|p", &ns, true).unwrap());
        assert!(!selector_exists(&xml, "a|rect", &ns, true).unwrap());

        let html = html_dom();
        assert!(selector_exists(&html, "svg|rect", &ns, true).unwrap());
    }

    #[test]
    fn test_xml_surface_is_case_sensitive() {
        let xml = parse_xml(XHTML).unwrap();
        let ns = NamespaceMap::new();
        assert!(selector_exists(&xml, "p", &ns, true).unwrap());
        assert!(!selector_exists(&xml, "P", &ns, true).unwrap());
        assert!(selector_exists(&html_dom(), "P", &ns, true).unwrap());
    }

    #[test]
    fn test_cache_reuses_compiled_queries() {
        let dom = html_dom();
        let ns = NamespaceMap::new();
        let mut cache = QueryCache::new(&ns);

        assert!(cache.selector_exists(&dom, "p", true).unwrap());
        assert!(cache.selector_exists(&dom, "p", true).unwrap());
        assert_eq!(cache.len(), 1);

        assert!(cache.selector_exists(&dom, "p", false).unwrap());
        assert_eq!(cache.len(), 2);

        assert!(cache.selector_exists(&dom, "foo|p", true).is_err());
        assert!(cache.selector_exists(&dom, "foo|p", true).is_err());
        assert_eq!(cache.len(), 3);
    }
}
